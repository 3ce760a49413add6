//! Save types
//!
//! The final artifact of a recording run and the errors of the save flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Stream details of a saved file, as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
}

/// A saved recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalArtifact {
    /// The final container file
    pub path: PathBuf,

    /// Temp files consumed to produce `path`, video first
    pub derived_from: Vec<PathBuf>,

    /// Takes saved next to `path` instead of being muxed (camera, superseded audio)
    pub companions: Vec<PathBuf>,

    /// Probe of the final file, when ffprobe succeeded
    pub media: Option<MediaInfo>,

    pub created_at: DateTime<Utc>,
}

impl FinalArtifact {
    pub fn new(path: PathBuf, derived_from: Vec<PathBuf>) -> Self {
        Self {
            path,
            derived_from,
            companions: Vec::new(),
            media: None,
            created_at: Utc::now(),
        }
    }

    /// File name for notifications
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// Save flow errors
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Merge failed (exit status {status:?}): {diagnostics}")]
    Merge {
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("Failed to save {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Recording input missing: {0:?}")]
    MissingInput(PathBuf),

    #[error("Refusing to overwrite {0:?}")]
    DestinationExists(PathBuf),
}

impl SaveError {
    pub fn code(&self) -> &'static str {
        match self {
            SaveError::Merge { .. } => "MERGE_ERROR",
            SaveError::Io { .. } => "SAVE_IO_ERROR",
            SaveError::MissingInput(_) => "MISSING_INPUT",
            SaveError::DestinationExists(_) => "DESTINATION_EXISTS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_file_name() {
        let artifact = FinalArtifact::new(
            PathBuf::from("/home/user/Videos/Screenrecords/screenrecording4.mp4"),
            vec![PathBuf::from("/home/user/Videos/Screenrecords/temp_video.mp4")],
        );
        assert_eq!(artifact.file_name(), "screenrecording4.mp4");
        assert!(artifact.companions.is_empty());
    }

    #[test]
    fn test_artifact_serializes_camel_case() {
        let artifact = FinalArtifact::new(PathBuf::from("out.mp4"), vec![]);
        let json = serde_json::to_value(&artifact).unwrap();
        assert!(json.get("derivedFrom").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
