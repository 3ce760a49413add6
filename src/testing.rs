//! Scripted capture processes for tests

use crate::capture::{
    CaptureError, CaptureProcess, CaptureResult, CommandSpec, CommandTemplate, DisplayInfo,
    ProcessLauncher,
};
use crate::config::Config;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeState {
    pub suspended: bool,
    pub exited: bool,
    pub signals: Vec<&'static str>,
}

pub struct FakeProcess {
    target: PathBuf,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl CaptureProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        if self.state.lock().exited {
            None
        } else {
            Some(4242)
        }
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn suspend(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        if !state.exited {
            state.suspended = true;
            state.signals.push("STOP");
        }
        Ok(())
    }

    fn resume(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        if !state.exited {
            state.suspended = false;
            state.signals.push("CONT");
        }
        Ok(())
    }

    fn terminate(&mut self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        if !state.exited {
            state.signals.push("TERM");
            state.suspended = false;
            state.exited = true;
        }
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        self.state.lock().exited
    }

    async fn wait(&mut self) -> CaptureResult<Option<i32>> {
        loop {
            let exited = self.state.lock().exited;
            if exited {
                return Ok(Some(0));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Writes `<first arg>|` to the target and records every start
#[derive(Default)]
pub struct FakeLauncher {
    /// Invocations containing one of these fail to spawn
    pub fail_spawn: Vec<String>,
    /// Invocations containing one of these exit right after spawning
    pub exit_early: Vec<String>,
    pub started: Mutex<Vec<(CommandSpec, Arc<Mutex<FakeState>>)>>,
}

impl FakeLauncher {
    pub fn failing(patterns: &[&str]) -> Self {
        Self {
            fail_spawn: patterns.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn processes(&self, program: &str) -> Vec<Arc<Mutex<FakeState>>> {
        self.started
            .lock()
            .iter()
            .filter(|(spec, _)| spec.program == program)
            .map(|(_, state)| state.clone())
            .collect()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn start(&self, spec: &CommandSpec) -> CaptureResult<Box<dyn CaptureProcess>> {
        let line = spec.to_string();
        if self.fail_spawn.iter().any(|p| line.contains(p.as_str())) {
            return Err(CaptureError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such device"),
            });
        }

        std::fs::write(&spec.target, format!("{}|", spec.args[0]))?;
        let state = Arc::new(Mutex::new(FakeState {
            exited: self.exit_early.iter().any(|p| line.contains(p.as_str())),
            ..Default::default()
        }));
        self.started.lock().push((spec.clone(), state.clone()));

        Ok(Box::new(FakeProcess {
            target: spec.target.clone(),
            state,
        }))
    }
}

/// Fake capture programs writing into `output_dir`, audio off, `sh` as muxer
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.output_dir = output_dir.to_path_buf();
    config.video.command = CommandTemplate::new("fake-video", &["video", "{output}"]);
    config.audio.command = CommandTemplate::new("fake-audio", &["{device}", "{output}"]);
    config.audio.enabled = false;
    config.audio.probe_delay_ms = 10;
    config.camera.command = CommandTemplate::new("fake-camera", &["camera", "{output}"]);
    config.mux.command = CommandTemplate::new(
        "sh",
        &["-c", "cat \"$0\" \"$1\" > \"$2\"", "{video}", "{audio}", "{output}"],
    );
    config
}

pub fn display() -> DisplayInfo {
    DisplayInfo {
        name: "eDP-1".to_string(),
        width: 1920,
        height: 1080,
        x: 0,
        y: 0,
        is_primary: true,
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
