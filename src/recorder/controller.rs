//! Recording session controller
//!
//! Owns every capture process of a session and drives the state machine
//! `Idle -> Recording <-> Paused -> Stopped -> Idle`. The start sequence runs on
//! a background task; the other operations only signal processes that are
//! already running. All track bookkeeping sits behind one async mutex, so the
//! operations are applied one at a time in call order.

use super::settings::CaptureSettings;
use super::state::{SessionClock, SessionEvent, SessionState, SessionStatus};
use super::store::TrackStore;
use super::track::{reap, Track};
use crate::capture::{
    capture_area, CaptureError, CaptureProcess, DisplayInfo, ProcessLauncher, SignalLauncher,
    TrackKind,
};
use crate::config::Config;
use crate::export::{probe_media, FinalArtifact, Merger, SaveError};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// Errors reported by session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Screen capture unavailable: {0}")]
    DeviceUnavailable(#[source] CaptureError),

    #[error("No working audio input (tried {})", .tried.join(", "))]
    AudioSpawnFailure { tried: Vec<String> },

    #[error("Already recording")]
    AlreadyRecording,

    #[error("A recording is being saved")]
    Saving,

    #[error("Not recording")]
    NotRecording,

    #[error("No unsaved recording")]
    NothingToSave,

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording startup failed: {0}")]
    Startup(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            SessionError::AudioSpawnFailure { .. } => "AUDIO_SPAWN_FAILURE",
            SessionError::AlreadyRecording => "ALREADY_RECORDING",
            SessionError::Saving => "SAVE_IN_PROGRESS",
            SessionError::NotRecording => "NOT_RECORDING",
            SessionError::NothingToSave => "NOTHING_TO_SAVE",
            SessionError::Capture(_) => "CAPTURE_ERROR",
            SessionError::Save(e) => e.code(),
            SessionError::Io(_) => "IO_ERROR",
            SessionError::Startup(_) => "STARTUP_ERROR",
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Copy)]
struct Toggles {
    audio: bool,
    camera: bool,
}

/// Per-run details readable without the track lock
#[derive(Debug, Default)]
struct Live {
    run_id: Option<Uuid>,
    video_path: Option<PathBuf>,
    audio_device: Option<String>,
    /// Audio was switched off by a device failure, not by the user
    audio_downgraded: bool,
}

/// Takes of a finished run waiting to be saved
#[derive(Debug)]
struct PendingSave {
    video: PathBuf,
    /// Latest microphone take, muxed into the final file
    audio: Option<PathBuf>,
    /// Takes moved next to the final file
    companions: Vec<(TrackKind, PathBuf)>,
}

struct Tracks {
    store: TrackStore,
    video: Track,
    audio: Track,
    camera: Track,
    /// Exit waits for tracks stopped mid-run
    reapers: Vec<JoinHandle<()>>,
    /// Takes kept after a failed save
    pending: Option<PendingSave>,
}

impl Tracks {
    fn new(store: TrackStore) -> Self {
        Self {
            store,
            video: Track::new(TrackKind::Video),
            audio: Track::new(TrackKind::Audio),
            camera: Track::new(TrackKind::Camera),
            reapers: Vec::new(),
            pending: None,
        }
    }

    fn get_mut(&mut self, kind: TrackKind) -> &mut Track {
        match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
            TrackKind::Camera => &mut self.camera,
        }
    }

    fn all_mut(&mut self) -> [&mut Track; 3] {
        [&mut self.video, &mut self.audio, &mut self.camera]
    }

    fn take_pending_save(&mut self) -> Option<PendingSave> {
        let video = self.video.drain_takes().pop()?;
        let mut audio = self.audio.drain_takes();
        let latest_audio = audio.pop();

        let mut companions: Vec<_> = audio.into_iter().map(|p| (TrackKind::Audio, p)).collect();
        companions.extend(
            self.camera
                .drain_takes()
                .into_iter()
                .map(|p| (TrackKind::Camera, p)),
        );

        Some(PendingSave {
            video,
            audio: latest_audio,
            companions,
        })
    }
}

struct Shared {
    settings: CaptureSettings,
    launcher: Arc<dyn ProcessLauncher>,
    merger: Merger,
    state: RwLock<SessionState>,
    /// Set while a start sequence is scheduled or running
    starting: AtomicBool,
    clock: Mutex<SessionClock>,
    toggles: Mutex<Toggles>,
    live: RwLock<Live>,
    tracks: AsyncMutex<Tracks>,
    events: broadcast::Sender<SessionEvent>,
}

/// Controls one recording session
pub struct SessionController {
    shared: Arc<Shared>,
    startup: Mutex<Option<JoinHandle<SessionResult<()>>>>,
}

impl SessionController {
    pub fn new(config: &Config, screen: &DisplayInfo, launcher: Arc<dyn ProcessLauncher>) -> Self {
        let settings = CaptureSettings::new(config, screen);
        let (events, _) = broadcast::channel(100);

        tracing::info!(
            "Capturing {} ({}), saving to {:?}",
            screen.name,
            screen.size(),
            settings.output_dir
        );

        let shared = Shared {
            launcher,
            merger: Merger::new(settings.mux.clone()),
            state: RwLock::new(SessionState::Idle),
            starting: AtomicBool::new(false),
            clock: Mutex::new(SessionClock::default()),
            toggles: Mutex::new(Toggles {
                audio: settings.audio_enabled,
                camera: settings.camera_enabled,
            }),
            live: RwLock::new(Live::default()),
            tracks: AsyncMutex::new(Tracks::new(TrackStore::new(&settings.output_dir))),
            events,
            settings,
        };

        Self {
            shared: Arc::new(shared),
            startup: Mutex::new(None),
        }
    }

    /// Controller for the configured capture area, driving real capture programs
    ///
    /// A window source asks the user to click the window before returning.
    pub fn from_config(config: &Config) -> SessionResult<Self> {
        let fallback = (config.video.fallback_width, config.video.fallback_height);
        let area = capture_area(config.video.source, config.video.display.as_deref(), fallback)
            .map_err(SessionError::DeviceUnavailable)?;
        Ok(Self::new(config, &area, Arc::new(SignalLauncher)))
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// True while the background start sequence is still running
    pub fn is_starting(&self) -> bool {
        self.shared.starting.load(Ordering::SeqCst)
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        let shared = &self.shared;
        let state = shared.state();
        let toggles = *shared.toggles.lock();
        let (started_at, elapsed) = {
            let clock = shared.clock.lock();
            (clock.start_time(), clock.elapsed())
        };
        let live = shared.live.read();
        let video_bytes = live
            .video_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        SessionStatus {
            state,
            run_id: live.run_id,
            started_at,
            elapsed,
            video_path: live.video_path.clone(),
            video_bytes,
            audio_enabled: toggles.audio,
            audio_device: live.audio_device.clone(),
            camera_enabled: toggles.camera,
        }
    }

    /// Schedule the start sequence on a background task
    ///
    /// Returns as soon as the task is spawned. The outcome is reported through
    /// events and [`SessionController::wait_started`].
    pub fn start(&self) -> SessionResult<()> {
        match self.state() {
            SessionState::Idle => {}
            SessionState::Stopped => return Err(SessionError::Saving),
            _ => return Err(SessionError::AlreadyRecording),
        }
        if self.shared.starting.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyRecording);
        }

        let run_id = Uuid::new_v4();
        let shared = self.shared.clone();
        let handle = tokio::spawn(
            async move {
                let result = shared.run_start(run_id).await;
                shared.starting.store(false, Ordering::SeqCst);
                result
            }
            .instrument(tracing::info_span!("recording", run = %run_id)),
        );
        *self.startup.lock() = Some(handle);
        Ok(())
    }

    /// Wait until the background start sequence has finished
    pub async fn wait_started(&self) -> SessionResult<()> {
        let handle = self.startup.lock().take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| SessionError::Startup(e.to_string()))?,
            None => Ok(()),
        }
    }

    /// Pause toggle: suspends screen and microphone capture, or resumes them
    /// when already paused. The webcam keeps running. Returns the new state.
    pub async fn pause(&self) -> SessionResult<SessionState> {
        let mut tracks = self.shared.tracks.lock().await;
        match self.state() {
            SessionState::Recording => self.shared.suspend_all(&mut tracks)?,
            SessionState::Paused => self.shared.resume_all(&mut tracks)?,
            _ => return Err(SessionError::NotRecording),
        }
        Ok(self.state())
    }

    /// Continue a paused run; no-op while recording
    pub async fn resume(&self) -> SessionResult<()> {
        let mut tracks = self.shared.tracks.lock().await;
        match self.state() {
            SessionState::Paused => self.shared.resume_all(&mut tracks),
            SessionState::Recording => Ok(()),
            _ => Err(SessionError::NotRecording),
        }
    }

    /// Flip the microphone toggle
    ///
    /// During a run the audio process is started or stopped right away without
    /// touching the screen capture. Other operations are not held up while the
    /// device is being tried. Returns the new toggle value.
    pub async fn toggle_audio(&self) -> SessionResult<bool> {
        let shared = &self.shared;
        let run_id = {
            let mut tracks = shared.tracks.lock().await;

            if !self.state().is_active() {
                let mut toggles = shared.toggles.lock();
                toggles.audio = !toggles.audio;
                return Ok(toggles.audio);
            }

            let audio_on = shared.toggles.lock().audio;
            if audio_on {
                shared.toggles.lock().audio = false;
                shared.live.write().audio_downgraded = false;
                shared.stop_track(&mut tracks, TrackKind::Audio);
                return Ok(false);
            }

            shared.toggles.lock().audio = true;
            shared.live.read().run_id
        };

        match shared.start_audio(run_id).await {
            Ok(()) => Ok(shared.toggles.lock().audio),
            Err(e) => {
                shared.audio_failed(run_id, &e);
                Err(e)
            }
        }
    }

    /// Flip the webcam toggle, starting or stopping the camera during a run
    pub async fn toggle_camera(&self) -> SessionResult<bool> {
        let shared = &self.shared;
        let mut tracks = shared.tracks.lock().await;

        if !self.state().is_active() {
            let mut toggles = shared.toggles.lock();
            toggles.camera = !toggles.camera;
            return Ok(toggles.camera);
        }

        if tracks.camera.is_live() {
            shared.toggles.lock().camera = false;
            shared.stop_track(&mut tracks, TrackKind::Camera);
            return Ok(false);
        }

        shared.toggles.lock().camera = true;
        match shared.start_camera(&mut tracks) {
            Ok(()) => Ok(true),
            Err(e) => {
                shared.toggles.lock().camera = false;
                tracing::warn!("Camera capture failed to start: {}", e);
                shared.emit(SessionEvent::Warning(format!("Camera unavailable: {}", e)));
                Err(e)
            }
        }
    }

    /// Finish the run and save it
    ///
    /// Waits for the start sequence, terminates every capture process and
    /// waits for all of them to exit before merging. The session is back to
    /// `Idle` when this returns, whether or not the save succeeded.
    pub async fn stop(&self, requested_name: Option<String>) -> SessionResult<FinalArtifact> {
        if let Err(e) = self.wait_started().await {
            tracing::debug!("Start sequence did not complete: {}", e);
        }

        let shared = &self.shared;
        let mut tracks = shared.tracks.lock().await;
        if !self.state().is_active() {
            return Err(SessionError::NotRecording);
        }

        let elapsed = {
            let mut clock = shared.clock.lock();
            clock.stop();
            clock.elapsed()
        };
        shared.set_state(SessionState::Stopped);
        tracing::info!("Stopping recording after {:.1}s", elapsed.as_secs_f64());

        let mut exiting = Vec::new();
        for track in tracks.all_mut() {
            if let Some(process) = track.terminate() {
                exiting.push((track.kind(), process));
            }
        }
        for (kind, process) in exiting {
            reap(kind, process).await;
        }
        for reaper in std::mem::take(&mut tracks.reapers) {
            if let Err(e) = reaper.await {
                tracing::warn!("Capture exit wait failed: {}", e);
            }
        }
        shared.emit(SessionEvent::Stopped);

        let pending = tracks.take_pending_save();
        let result = match pending {
            Some(pending) => shared.save(&mut tracks, pending, requested_name.as_deref()).await,
            None => Err(SessionError::NothingToSave),
        };
        shared.finish_run();
        result
    }

    /// Save the takes kept by the last failed save
    pub async fn retry_save(&self, requested_name: Option<String>) -> SessionResult<FinalArtifact> {
        let mut tracks = self.shared.tracks.lock().await;
        if self.state() != SessionState::Idle {
            return Err(SessionError::AlreadyRecording);
        }
        let pending = tracks.pending.take().ok_or(SessionError::NothingToSave)?;
        tracing::info!("Retrying save of {:?}", pending.video);
        self.shared
            .save(&mut tracks, pending, requested_name.as_deref())
            .await
    }

    /// Screen take of an unsaved run, if a save failed
    pub async fn pending_save(&self) -> Option<PathBuf> {
        let tracks = self.shared.tracks.lock().await;
        tracks.pending.as_ref().map(|p| p.video.clone())
    }
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn run_start(&self, run_id: Uuid) -> SessionResult<()> {
        {
            let mut tracks = self.tracks.lock().await;

            let output_dir = self.settings.output_dir.clone();
            if let Err(e) = std::fs::create_dir_all(&output_dir) {
                tracing::error!("Failed to create {:?}: {}", output_dir, e);
                self.emit(SessionEvent::Error(format!(
                    "Cannot create {}: {}",
                    output_dir.display(),
                    e
                )));
                return Err(e.into());
            }

            let video_path = tracks.store.allocate_temp_path(TrackKind::Video);
            let process = match self.launcher.start(&self.settings.video_spec(&video_path)) {
                Ok(process) => process,
                Err(e) => {
                    tracing::error!("Screen capture failed to start: {}", e);
                    self.emit(SessionEvent::Error(format!("Screen capture unavailable: {}", e)));
                    return Err(SessionError::DeviceUnavailable(e));
                }
            };
            tracks.video.attach(process);

            self.clock.lock().start();
            *self.live.write() = Live {
                run_id: Some(run_id),
                video_path: Some(video_path.clone()),
                ..Live::default()
            };
            self.set_state(SessionState::Recording);
            tracing::info!("Recording started: {:?}", video_path);
            self.emit(SessionEvent::Started);
            self.emit(SessionEvent::TrackStarted {
                kind: TrackKind::Video,
                path: video_path,
            });
        }

        let toggles = *self.toggles.lock();
        if toggles.audio {
            if let Err(e) = self.start_audio(Some(run_id)).await {
                self.audio_failed(Some(run_id), &e);
            }
        }
        if toggles.camera {
            let mut tracks = self.tracks.lock().await;
            // The toggle may have been used while audio was starting
            let wanted = self.toggles.lock().camera;
            if wanted && !tracks.camera.is_live() {
                if let Err(e) = self.start_camera(&mut tracks) {
                    self.toggles.lock().camera = false;
                    tracing::warn!("Recording without camera: {}", e);
                    self.emit(SessionEvent::Warning(format!("Camera unavailable: {}", e)));
                }
            }
        }
        Ok(())
    }

    /// Start microphone capture on the first device that stays up
    ///
    /// The track lock is taken to spawn and to attach but not while waiting
    /// to see whether the device stays up. A device that comes up after the run
    /// ended, after the toggle was switched off or after another take went live
    /// is dropped.
    async fn start_audio(&self, run_id: Option<Uuid>) -> SessionResult<()> {
        for device in self.settings.audio_devices() {
            let (path, mut process) = {
                let mut tracks = self.tracks.lock().await;
                let path = tracks.store.allocate_temp_path(TrackKind::Audio);
                match self.launcher.start(&self.settings.audio_spec(&path, device)) {
                    Ok(process) => (path, process),
                    Err(e) => {
                        tracing::warn!("Audio device {} unavailable: {}", device, e);
                        continue;
                    }
                }
            };

            tokio::time::sleep(self.settings.probe_delay).await;
            if process.has_exited() {
                let code = process.wait().await.ok().flatten();
                tracing::warn!("Audio device {} stopped right away (exit {:?})", device, code);
                discard(&path);
                continue;
            }

            let mut tracks = self.tracks.lock().await;
            let current = self.live.read().run_id == run_id && self.state().is_active();
            let wanted = self.toggles.lock().audio;
            if !current || !wanted || tracks.audio.is_live() {
                drop(tracks);
                tracing::debug!("Dropping audio take from {}, no longer wanted", device);
                abandon(process, &path).await;
                return Ok(());
            }

            // Keep lockstep with a paused screen capture
            if self.state() == SessionState::Paused {
                if let Err(e) = process.suspend() {
                    drop(tracks);
                    abandon(process, &path).await;
                    return Err(e.into());
                }
            }

            tracing::info!("Audio capture from {} writing {:?}", device, path);
            tracks.audio.attach(process);
            self.live.write().audio_device = Some(device.clone());
            self.emit(SessionEvent::TrackStarted {
                kind: TrackKind::Audio,
                path,
            });
            return Ok(());
        }

        Err(SessionError::AudioSpawnFailure {
            tried: self.settings.audio_devices().to_vec(),
        })
    }

    /// Record without audio for the rest of `run_id`
    fn audio_failed(&self, run_id: Option<Uuid>, error: &SessionError) {
        tracing::warn!("Recording without audio: {}", error);
        {
            let mut live = self.live.write();
            if live.run_id == run_id && run_id.is_some() {
                self.toggles.lock().audio = false;
                live.audio_downgraded = true;
            }
        }
        self.emit(SessionEvent::Warning(error.to_string()));
    }

    fn start_camera(&self, tracks: &mut Tracks) -> SessionResult<()> {
        let path = tracks.store.allocate_temp_path(TrackKind::Camera);
        let process = self.launcher.start(&self.settings.camera_spec(&path))?;
        tracing::info!("Camera capture writing {:?}", path);
        tracks.camera.attach(process);
        self.emit(SessionEvent::TrackStarted {
            kind: TrackKind::Camera,
            path,
        });
        Ok(())
    }

    /// Terminate one track mid-run; `stop` waits for its exit
    fn stop_track(&self, tracks: &mut Tracks, kind: TrackKind) {
        let Some(process) = tracks.get_mut(kind).terminate() else {
            return;
        };
        tracks.reapers.push(tokio::spawn(reap(kind, process)));
        if kind == TrackKind::Audio {
            self.live.write().audio_device = None;
        }
        tracing::info!("{} capture stopped", kind);
        self.emit(SessionEvent::TrackStopped { kind });
    }

    fn suspend_all(&self, tracks: &mut Tracks) -> SessionResult<()> {
        tracks.video.suspend()?;
        if let Err(e) = tracks.audio.suspend() {
            if let Err(undo) = tracks.video.resume() {
                tracing::error!("Failed to resume video after audio suspend failure: {}", undo);
            }
            return Err(e.into());
        }

        self.clock.lock().pause();
        self.set_state(SessionState::Paused);
        tracing::info!("Recording paused");
        self.emit(SessionEvent::Paused);
        Ok(())
    }

    fn resume_all(&self, tracks: &mut Tracks) -> SessionResult<()> {
        tracks.video.resume()?;
        if let Err(e) = tracks.audio.resume() {
            if let Err(undo) = tracks.video.suspend() {
                tracing::error!("Failed to suspend video after audio resume failure: {}", undo);
            }
            return Err(e.into());
        }

        self.clock.lock().resume();
        self.set_state(SessionState::Recording);
        tracing::info!("Recording resumed");
        self.emit(SessionEvent::Resumed);
        Ok(())
    }

    async fn save(
        &self,
        tracks: &mut Tracks,
        pending: PendingSave,
        requested_name: Option<&str>,
    ) -> SessionResult<FinalArtifact> {
        let final_path = tracks.store.resolve_final_path(requested_name);
        tracing::info!("Saving recording as {:?}", final_path);

        let merged = self
            .merger
            .merge(&pending.video, pending.audio.as_deref(), &final_path)
            .await;
        let mut artifact = match merged {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!("Save failed, keeping {:?}: {}", pending.video, e);
                if let Some(previous) = tracks.pending.replace(pending) {
                    tracing::warn!(
                        "Unsaved takes of an earlier run remain at {:?}",
                        previous.video
                    );
                }
                self.emit(SessionEvent::Error(e.to_string()));
                return Err(e.into());
            }
        };

        for (kind, take) in pending.companions {
            if !take.exists() {
                tracing::debug!("No {} take at {:?}", kind, take);
                continue;
            }
            let dest = tracks.store.companion_path(&final_path, kind);
            match std::fs::rename(&take, &dest) {
                Ok(()) => artifact.companions.push(dest),
                Err(e) => tracing::warn!("Left {} take at {:?}: {}", kind, take, e),
            }
        }

        match probe_media(&artifact.path).await {
            Ok(info) => {
                tracing::info!(
                    "Saved {}: {:.1}s, {}x{} @ {:.0}fps, {} / {}",
                    artifact.file_name(),
                    info.duration_secs,
                    info.width,
                    info.height,
                    info.fps,
                    info.video_codec,
                    info.audio_codec.as_deref().unwrap_or("no audio")
                );
                artifact.media = Some(info);
            }
            Err(e) => tracing::warn!("Could not inspect {:?}: {}", artifact.path, e),
        }

        tracks.store.reset();
        self.emit(SessionEvent::Saved(artifact.path.clone()));
        Ok(artifact)
    }

    fn finish_run(&self) {
        *self.clock.lock() = SessionClock::default();
        let live = std::mem::take(&mut *self.live.write());
        // A device failure only disables audio for the run it happened in
        if live.audio_downgraded {
            self.toggles.lock().audio = true;
        }
        self.set_state(SessionState::Idle);
    }
}

/// Stop an audio process that was never attached and remove its file
async fn abandon(mut process: Box<dyn CaptureProcess>, path: &std::path::Path) {
    if let Err(e) = process.terminate() {
        tracing::warn!("Failed to terminate audio capture: {}", e);
    }
    reap(TrackKind::Audio, process).await;
    discard(path);
}

/// Remove the file of a take that never became part of a track
fn discard(path: &std::path::Path) {
    if let Err(e) = TrackStore::cleanup(path) {
        tracing::warn!("Failed to remove {:?}: {}", path, e);
    }
}
