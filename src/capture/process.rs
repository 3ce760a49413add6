//! OS process backed capture
//!
//! Spawns capture programs with `tokio::process` and controls them with POSIX
//! signals: SIGSTOP / SIGCONT for suspend / resume and SIGTERM for a graceful
//! stop, which lets ffmpeg and arecord finalize their container headers.

use super::command::CommandSpec;
use super::traits::{CaptureError, CaptureProcess, CaptureResult, ProcessLauncher};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

/// Launches capture programs as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalLauncher;

impl ProcessLauncher for SignalLauncher {
    fn start(&self, spec: &CommandSpec) -> CaptureResult<Box<dyn CaptureProcess>> {
        tracing::debug!("Spawning capture process: {}", spec);

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        tracing::info!(
            "Started {} (pid {:?}) writing {:?}",
            spec.program,
            child.id(),
            spec.target
        );

        Ok(Box::new(SignalProcess {
            child,
            target: spec.target.clone(),
            suspended: false,
            exit: None,
        }))
    }
}

/// A capture process controlled through signals
pub struct SignalProcess {
    child: Child,
    target: PathBuf,
    suspended: bool,
    exit: Option<ExitStatus>,
}

impl SignalProcess {
    #[cfg(unix)]
    fn send(&mut self, signal: nix::sys::signal::Signal) -> CaptureResult<()> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        if self.has_exited() {
            return Ok(());
        }
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Ok(()),
            // Exited between the check and the signal
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(CaptureError::Signal {
                signal: signal.as_str(),
                pid,
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl CaptureProcess for SignalProcess {
    fn pid(&self) -> Option<u32> {
        if self.exit.is_some() {
            return None;
        }
        self.child.id()
    }

    fn target(&self) -> &Path {
        &self.target
    }

    #[cfg(unix)]
    fn suspend(&mut self) -> CaptureResult<()> {
        self.send(nix::sys::signal::Signal::SIGSTOP)?;
        self.suspended = true;
        Ok(())
    }

    #[cfg(not(unix))]
    fn suspend(&mut self) -> CaptureResult<()> {
        Err(CaptureError::Unsupported("process suspension"))
    }

    #[cfg(unix)]
    fn resume(&mut self) -> CaptureResult<()> {
        self.send(nix::sys::signal::Signal::SIGCONT)?;
        self.suspended = false;
        Ok(())
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> CaptureResult<()> {
        Err(CaptureError::Unsupported("process suspension"))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> CaptureResult<()> {
        use nix::sys::signal::Signal;

        self.send(Signal::SIGTERM)?;
        // A stopped process only acts on SIGTERM once continued
        if self.suspended {
            self.send(Signal::SIGCONT)?;
            self.suspended = false;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> CaptureResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.child.start_kill()?;
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        if self.exit.is_some() {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to poll capture process for {:?}: {}", self.target, e);
                false
            }
        }
    }

    async fn wait(&mut self) -> CaptureResult<Option<i32>> {
        if let Some(status) = self.exit {
            return Ok(status.code());
        }
        let status = self.child.wait().await?;
        self.exit = Some(status);
        tracing::debug!("Capture process for {:?} exited with {}", self.target, status);
        Ok(status.code())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::capture::CommandTemplate;
    use std::time::Duration;
    use tempfile::tempdir;

    fn writer_spec(target: &Path) -> CommandSpec {
        CommandTemplate::new(
            "sh",
            &["-c", "while true; do echo frame >> \"$0\"; sleep 0.02; done", "{output}"],
        )
        .render(target, &[])
    }

    #[tokio::test]
    async fn test_suspend_resume_terminate() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("capture.txt");
        let mut process = SignalLauncher.start(&writer_spec(&target)).unwrap();
        assert!(process.pid().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        process.suspend().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let paused_size = std::fs::metadata(&target).unwrap().len();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(std::fs::metadata(&target).unwrap().len(), paused_size);

        process.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(std::fs::metadata(&target).unwrap().len() > paused_size);

        process.terminate().unwrap();
        process.wait().await.unwrap();
        assert!(process.has_exited());
        assert!(process.pid().is_none());
    }

    #[tokio::test]
    async fn test_terminate_while_suspended_exits() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("capture.txt");
        let mut process = SignalLauncher.start(&writer_spec(&target)).unwrap();

        process.suspend().unwrap();
        process.terminate().unwrap();
        tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .expect("suspended process did not exit after terminate")
            .unwrap();
    }

    #[tokio::test]
    async fn test_signals_after_exit_are_noops() {
        let dir = tempdir().unwrap();
        let spec = CommandTemplate::new("sh", &["-c", "exit 3"]).render(&dir.path().join("x"), &[]);
        let mut process = SignalLauncher.start(&spec).unwrap();

        assert_eq!(process.wait().await.unwrap(), Some(3));
        process.suspend().unwrap();
        process.resume().unwrap();
        process.terminate().unwrap();
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let spec = CommandTemplate::new("/nonexistent/screen-grabber", &[])
            .render(Path::new("/tmp/never-written.mp4"), &[]);
        match SignalLauncher.start(&spec) {
            Err(CaptureError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/screen-grabber")
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("spawn should fail"),
        }
    }
}
