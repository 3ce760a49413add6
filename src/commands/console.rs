//! Interactive console
//!
//! Reads one command per line and drives the session controller through the
//! handlers in [`super::recording`]. Session events are printed by a separate
//! task so that background failures show up while the console waits for input.

use super::recording::{
    describe_artifact, get_recording_status, pause_recording, retry_save, start_recording,
    stop_recording, toggle_audio, toggle_camera, ConsoleCommand, HELP,
};
use crate::export::FinalArtifact;
use crate::recorder::{SessionController, SessionEvent, SessionState};
use crate::status::format_status;
use crate::utils::{AppResult, ErrorResponse};
use std::future::Future;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

enum Flow {
    Continue,
    Quit,
}

pub struct Console<R, W> {
    controller: Arc<SessionController>,
    lines: Lines<R>,
    out: W,
    /// Set while waiting for an answer, so the status ticker stays quiet
    prompting: Arc<AtomicBool>,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        controller: Arc<SessionController>,
        input: R,
        out: W,
        prompting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            controller,
            lines: input.lines(),
            out,
            prompting,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run until quit, end of input or `interrupt` resolves
    ///
    /// A recording still running on the way out is stopped and saved under
    /// the next default name.
    pub async fn run<I>(&mut self, interrupt: I) -> AppResult<()>
    where
        I: Future<Output = ()>,
    {
        writeln!(self.out, "{}", HELP)?;
        tokio::pin!(interrupt);

        loop {
            let next = tokio::select! {
                line = self.lines.next_line() => Some(line?),
                _ = &mut interrupt => None,
            };

            match next {
                Some(Some(line)) => {
                    if let Flow::Quit = self.handle_line(&line).await? {
                        return Ok(());
                    }
                }
                Some(None) => {
                    tracing::debug!("Console input closed");
                    return self.finish().await;
                }
                None => {
                    writeln!(self.out, "Interrupted")?;
                    return self.finish().await;
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> AppResult<Flow> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(message) => {
                writeln!(self.out, "{}", message)?;
                return Ok(Flow::Continue);
            }
        };
        let controller = self.controller.clone();

        match command {
            ConsoleCommand::ToggleRecording => {
                if self.session_running() {
                    self.stop_and_save().await?;
                } else {
                    match start_recording(&controller) {
                        Ok(()) => writeln!(self.out, "Starting recording...")?,
                        Err(e) => writeln!(self.out, "{}", e)?,
                    }
                }
            }
            ConsoleCommand::TogglePause => match pause_recording(&controller).await {
                Ok(SessionState::Paused) => writeln!(self.out, "Paused")?,
                Ok(_) => writeln!(self.out, "Recording")?,
                Err(e) => writeln!(self.out, "{}", e)?,
            },
            ConsoleCommand::ToggleAudio => match toggle_audio(&controller).await {
                Ok(enabled) => writeln!(self.out, "Microphone {}", on_off(enabled))?,
                Err(e) => writeln!(self.out, "{}", e)?,
            },
            ConsoleCommand::ToggleCamera => match toggle_camera(&controller).await {
                Ok(enabled) => writeln!(self.out, "Webcam {}", on_off(enabled))?,
                Err(e) => writeln!(self.out, "{}", e)?,
            },
            ConsoleCommand::Status => {
                writeln!(self.out, "{}", format_status(&get_recording_status(&controller)))?
            }
            ConsoleCommand::RetrySave => {
                if controller.pending_save().await.is_none() {
                    writeln!(self.out, "Nothing to retry")?;
                } else {
                    let name = self.prompt_name().await?;
                    let result = retry_save(&controller, name).await;
                    self.report_save(result).await?;
                }
            }
            ConsoleCommand::Help => writeln!(self.out, "{}", HELP)?,
            ConsoleCommand::Quit => {
                if self.session_running() {
                    let confirmed = self
                        .confirm("A recording is in progress. Stop, save and quit? [y/N] ")
                        .await?;
                    if !confirmed {
                        return Ok(Flow::Continue);
                    }
                    self.stop_and_save().await?;
                }
                return Ok(Flow::Quit);
            }
        }

        Ok(Flow::Continue)
    }

    fn session_running(&self) -> bool {
        self.controller.state().is_active() || self.controller.is_starting()
    }

    async fn stop_and_save(&mut self) -> AppResult<()> {
        let name = self.prompt_name().await?;
        let result = stop_recording(&self.controller, name).await;
        self.report_save(result).await
    }

    async fn finish(&mut self) -> AppResult<()> {
        if self.session_running() {
            writeln!(self.out, "Saving the running recording")?;
            let result = stop_recording(&self.controller, None).await;
            self.report_save(result).await?;
        }
        Ok(())
    }

    /// Empty answer means the next default name
    async fn prompt_name(&mut self) -> AppResult<Option<String>> {
        let answer = self.ask("Save as (empty for default name): ").await?;
        Ok(answer.filter(|name| !name.is_empty()))
    }

    async fn confirm(&mut self, question: &str) -> AppResult<bool> {
        let answer = self.ask(question).await?;
        Ok(answer
            .map(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"))
            .unwrap_or(false))
    }

    async fn ask(&mut self, question: &str) -> AppResult<Option<String>> {
        self.prompting.store(true, Ordering::SeqCst);
        write!(self.out, "{}", question)?;
        self.out.flush()?;
        let line = self.lines.next_line().await;
        self.prompting.store(false, Ordering::SeqCst);

        Ok(line?.map(|answer| answer.trim().to_string()))
    }

    async fn report_save(&mut self, result: Result<FinalArtifact, ErrorResponse>) -> AppResult<()> {
        match result {
            Ok(artifact) => writeln!(self.out, "{}", describe_artifact(&artifact))?,
            Err(e) => {
                writeln!(self.out, "Save failed: {}", e)?;
                if let Some(video) = self.controller.pending_save().await {
                    writeln!(
                        self.out,
                        "Recording kept at {}; type 'retry' to save it again",
                        video.display()
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Print session events as they arrive until the controller goes away
pub fn spawn_event_printer(mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(text) = describe_event(&event) {
                        println!("{}", text);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Event printer missed {} events", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Console text for an event; `None` for events the command output already covers
pub fn describe_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Started => Some("Recording started".to_string()),
        SessionEvent::Stopped => Some("Recording stopped, saving...".to_string()),
        SessionEvent::TrackStarted { kind, path } => {
            Some(format!("{} capture writing to {}", kind, path.display()))
        }
        SessionEvent::TrackStopped { kind } => Some(format!("{} capture stopped", kind)),
        SessionEvent::Warning(message) => Some(format!("Warning: {}", message)),
        SessionEvent::Error(message) => Some(format!("Error: {}", message)),
        SessionEvent::Paused | SessionEvent::Resumed | SessionEvent::Saved(_) => None,
    }
}
