//! Configuration loading
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/screenrecord/config.toml` (user)
//! 2. `./screenrecord.toml` (local override), or the `--config` path instead
//! 3. Environment variables (`SCREENRECORD_OUTPUT_DIR`, `SCREENRECORD_LOG`)
//!
//! Every field has a default, so a file only needs the keys it changes:
//!
//! ```toml
//! output_dir = "~/Videos/Screenrecords"
//!
//! [video]
//! source = "desktop"
//! quality = "high"
//!
//! [audio]
//! devices = ["hw:1,0"]
//! probe_delay_ms = 1500
//! ```

use crate::capture::{CaptureSource, CommandTemplate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "screenrecord";
const LOCAL_FILE: &str = "screenrecord.toml";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Recording quality presets for the screen encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// CRF value for libx264, lower is better
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Low => 30,
            Quality::Medium => 23,
            Quality::High => 18,
        }
    }

    /// libx264 preset
    pub fn h264_preset(&self) -> &'static str {
        match self {
            Quality::Low => "ultrafast",
            Quality::Medium => "medium",
            Quality::High => "slow",
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where temporaries and final recordings are written
    pub output_dir: PathBuf,
    /// Tracing filter directive, overridden by `RUST_LOG`
    pub log_level: Option<String>,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub camera: CameraConfig,
    pub mux: MuxConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub command: CommandTemplate,
    pub source: CaptureSource,
    /// Output name from xrandr; `None` captures the primary display
    pub display: Option<String>,
    pub framerate: u32,
    pub quality: Quality,
    /// Capture size when no display geometry can be discovered
    pub fallback_width: u32,
    pub fallback_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Initial state of the microphone toggle
    pub enabled: bool,
    pub command: CommandTemplate,
    /// Devices tried in order until one keeps running
    pub devices: Vec<String>,
    pub sample_rate: u32,
    /// How long a device must survive after spawn to count as working
    pub probe_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial state of the webcam toggle
    pub enabled: bool,
    pub command: CommandTemplate,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    pub command: CommandTemplate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            log_level: None,
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            camera: CameraConfig::default(),
            mux: MuxConfig::default(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            command: CommandTemplate::new(
                "ffmpeg",
                &[
                    "-f", "x11grab", "-video_size", "{size}", "-framerate", "{framerate}",
                    "-i", "{display}", "-c:v", "libx264", "-preset", "{preset}",
                    "-crf", "{crf}", "-r", "{framerate}", "{output}",
                ],
            ),
            source: CaptureSource::Display,
            display: None,
            framerate: 30,
            quality: Quality::Medium,
            fallback_width: 1920,
            fallback_height: 1080,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: CommandTemplate::new(
                "arecord",
                &["-D", "{device}", "-f", "cd", "-t", "wav", "-r", "{sample_rate}", "{output}"],
            ),
            devices: vec!["hw:0,7".to_string(), "hw:0,6".to_string()],
            sample_rate: 16000,
            probe_delay_ms: 3000,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: CommandTemplate::new(
                "ffmpeg",
                &["-f", "v4l2", "-i", "{device}", "-c:v", "libx264", "-preset", "ultrafast", "{output}"],
            ),
            device: "/dev/video0".to_string(),
        }
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            command: CommandTemplate::new(
                "ffmpeg",
                &["-i", "{video}", "-i", "{audio}", "-c:v", "copy", "-c:a", "aac", "{output}"],
            ),
        }
    }
}

impl Config {
    /// Load config from the standard locations plus environment overrides
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let files = discover_config_files(cli_path);
        let mut config = Self::load_files(&files)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Merge the given TOML files in order and deserialize the result
    pub fn load_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for path in files {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                path: path.clone(),
                source,
            })?;
            let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| {
                ConfigError::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?;
            tracing::debug!("Loaded config from {:?}", path);
            merge_tables(&mut merged, table);
        }

        let mut config: Config = toml::Value::Table(merged).try_into().map_err(|e: toml::de::Error| {
            ConfigError::Parse {
                path: files.last().cloned().unwrap_or_default(),
                message: e.to_string(),
            }
        })?;
        config.output_dir = expand_path(&config.output_dir.to_string_lossy());
        Ok(config)
    }

    /// Apply `SCREENRECORD_*` environment overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SCREENRECORD_OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output_dir = expand_path(&dir);
        }
        if let Some(level) = lookup("SCREENRECORD_LOG").filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
    }
}

/// Config files that exist, in load order
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Some(base) = directories::BaseDirs::new() {
        let user = base.config_dir().join(APP_DIR).join("config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // An explicit path replaces the local override and must exist
    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from(LOCAL_FILE);
    if local.exists() {
        files.push(local);
    }

    files
}

/// `~/Videos/Screenrecords`
pub fn default_output_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join("Videos").join("Screenrecords"))
        .unwrap_or_else(|| PathBuf::from("Screenrecords"))
}

/// Expand a leading `~/`
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = directories::BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
