//! Capture invocations for one controller
//!
//! Resolves the configured command templates against the chosen display so
//! the controller only deals in fully formed [`CommandSpec`]s.

use crate::capture::{x_display, CommandSpec, CommandTemplate, DisplayInfo};
use crate::config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    /// How long an audio process must survive before its device counts as working
    pub probe_delay: Duration,
    /// Initial toggle states
    pub audio_enabled: bool,
    pub camera_enabled: bool,
    pub mux: CommandTemplate,
    video: CommandTemplate,
    video_vars: Vec<(&'static str, String)>,
    audio: CommandTemplate,
    audio_devices: Vec<String>,
    sample_rate: u32,
    camera: CommandTemplate,
    camera_device: String,
}

impl CaptureSettings {
    pub fn new(config: &Config, display: &DisplayInfo) -> Self {
        let quality = config.video.quality;
        let video_vars = vec![
            ("size", display.size()),
            ("display", display.grab_target(&x_display())),
            ("framerate", config.video.framerate.to_string()),
            ("preset", quality.h264_preset().to_string()),
            ("crf", quality.crf().to_string()),
        ];

        Self {
            output_dir: config.output_dir.clone(),
            probe_delay: Duration::from_millis(config.audio.probe_delay_ms),
            audio_enabled: config.audio.enabled,
            camera_enabled: config.camera.enabled,
            mux: config.mux.command.clone(),
            video: config.video.command.clone(),
            video_vars,
            audio: config.audio.command.clone(),
            audio_devices: config.audio.devices.clone(),
            sample_rate: config.audio.sample_rate,
            camera: config.camera.command.clone(),
            camera_device: config.camera.device.clone(),
        }
    }

    /// Audio inputs in the order they are tried
    pub fn audio_devices(&self) -> &[String] {
        &self.audio_devices
    }

    pub fn video_spec(&self, target: &Path) -> CommandSpec {
        self.video.render(target, &self.video_vars)
    }

    pub fn audio_spec(&self, target: &Path, device: &str) -> CommandSpec {
        self.audio.render(
            target,
            &[
                ("device", device.to_string()),
                ("sample_rate", self.sample_rate.to_string()),
            ],
        )
    }

    pub fn camera_spec(&self, target: &Path) -> CommandSpec {
        self.camera
            .render(target, &[("device", self.camera_device.clone())])
    }
}
