//! Final container assembly
//!
//! Combines a finished screen take with an optional microphone take. Without
//! audio the video temp file is moved into place; with audio the mux tool
//! copies the video stream and encodes the audio into the container's codec.

use super::types::{FinalArtifact, SaveError};
use crate::capture::CommandTemplate;
use crate::recorder::TrackStore;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Lines of tool output kept in a merge error
const DIAGNOSTIC_LINES: usize = 20;

/// Runs the mux step of the save flow
#[derive(Debug, Clone)]
pub struct Merger {
    command: CommandTemplate,
}

impl Merger {
    pub fn new(command: CommandTemplate) -> Self {
        Self { command }
    }

    /// Produce `final_path` from the given takes
    ///
    /// Inputs are deleted only after the destination is complete. On failure
    /// they are left in place and no destination file remains.
    pub async fn merge(
        &self,
        video_path: &Path,
        audio_path: Option<&Path>,
        final_path: &Path,
    ) -> Result<FinalArtifact, SaveError> {
        if !video_path.exists() {
            return Err(SaveError::MissingInput(video_path.to_path_buf()));
        }
        if final_path.exists() {
            return Err(SaveError::DestinationExists(final_path.to_path_buf()));
        }
        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SaveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match audio_path.filter(|p| p.exists()) {
            None => {
                if let Some(missing) = audio_path {
                    tracing::warn!("Audio take {:?} is missing, saving video only", missing);
                }
                move_into_place(video_path, final_path)?;
                tracing::info!("Saved {:?} (video only)", final_path);
                Ok(FinalArtifact::new(
                    final_path.to_path_buf(),
                    vec![video_path.to_path_buf()],
                ))
            }
            Some(audio) => {
                self.mux(video_path, audio, final_path).await?;

                for input in [video_path, audio] {
                    if let Err(e) = TrackStore::cleanup(input) {
                        tracing::warn!("Failed to remove {:?} after merge: {}", input, e);
                    }
                }
                tracing::info!("Saved {:?} (video + audio)", final_path);
                Ok(FinalArtifact::new(
                    final_path.to_path_buf(),
                    vec![video_path.to_path_buf(), audio.to_path_buf()],
                ))
            }
        }
    }

    async fn mux(&self, video: &Path, audio: &Path, final_path: &Path) -> Result<(), SaveError> {
        let spec = self.command.render(
            final_path,
            &[
                ("video", video.to_string_lossy().to_string()),
                ("audio", audio.to_string_lossy().to_string()),
            ],
        );
        tracing::debug!("Running mux: {}", spec);

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SaveError::Merge {
                status: None,
                diagnostics: format!("Failed to run {}: {}", spec.program, e),
            })?;

        if output.status.success() && final_path.exists() {
            return Ok(());
        }

        // Whatever the tool left behind is not a valid recording
        if final_path.exists() {
            if let Err(e) = std::fs::remove_file(final_path) {
                tracing::error!("Failed to remove partial output {:?}: {}", final_path, e);
            }
        }

        let mut diagnostics = tail_lines(&String::from_utf8_lossy(&output.stderr), DIAGNOSTIC_LINES);
        if diagnostics.is_empty() {
            diagnostics = if output.status.success() {
                format!("{} produced no output file", spec.program)
            } else {
                format!("{} exited with {}", spec.program, output.status)
            };
        }
        tracing::error!("Merge into {:?} failed: {}", final_path, diagnostics);

        Err(SaveError::Merge {
            status: output.status.code(),
            diagnostics,
        })
    }
}

fn move_into_place(from: &Path, to: &Path) -> Result<(), SaveError> {
    let io_error = |source| SaveError::Io {
        path: PathBuf::from(to),
        source,
    };

    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Different filesystem: copy, then drop the source once the copy is whole
        Err(e) if is_cross_device(&e) => copy_into_place(from, to),
        Err(e) => Err(io_error(e)),
    }
}

/// Copy `from` to `to` and remove `from`; a partial copy is removed
fn copy_into_place(from: &Path, to: &Path) -> Result<(), SaveError> {
    if let Err(source) = std::fs::copy(from, to) {
        if let Err(e) = TrackStore::cleanup(to) {
            tracing::warn!("Failed to remove partial copy {:?}: {}", to, e);
        }
        return Err(SaveError::Io {
            path: PathBuf::from(to),
            source,
        });
    }
    TrackStore::cleanup(from).map_err(|source| SaveError::Io {
        path: from.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(nix::libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_: &std::io::Error) -> bool {
    false
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn concat_merger() -> Merger {
        Merger::new(CommandTemplate::new(
            "sh",
            &["-c", "cat \"$0\" \"$1\" > \"$2\"", "{video}", "{audio}", "{output}"],
        ))
    }

    fn failing_merger() -> Merger {
        Merger::new(CommandTemplate::new(
            "sh",
            &[
                "-c",
                "echo partial > \"$2\"; echo 'Invalid data found when processing input' >&2; exit 1",
                "{video}",
                "{audio}",
                "{output}",
            ],
        ))
    }

    #[tokio::test]
    async fn test_video_only_is_moved() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("temp_video.mp4");
        let final_path = dir.path().join("screenrecording1.mp4");
        fs::write(&video, b"video").unwrap();

        let artifact = concat_merger().merge(&video, None, &final_path).await.unwrap();
        assert_eq!(artifact.path, final_path);
        assert_eq!(artifact.derived_from, vec![video.clone()]);
        assert_eq!(fs::read(&final_path).unwrap(), b"video");
        assert!(!video.exists());
    }

    #[tokio::test]
    async fn test_missing_audio_falls_back_to_move() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("temp_video.mp4");
        let audio = dir.path().join("temp_audio.wav");
        let final_path = dir.path().join("out.mp4");
        fs::write(&video, b"video").unwrap();

        let artifact = failing_merger()
            .merge(&video, Some(&audio), &final_path)
            .await
            .unwrap();
        assert_eq!(artifact.derived_from.len(), 1);
        assert!(final_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mux_success_removes_inputs() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("temp_video.mp4");
        let audio = dir.path().join("temp_audio.wav");
        let final_path = dir.path().join("out.mp4");
        fs::write(&video, b"video|").unwrap();
        fs::write(&audio, b"audio").unwrap();

        let artifact = concat_merger()
            .merge(&video, Some(&audio), &final_path)
            .await
            .unwrap();
        assert_eq!(artifact.derived_from, vec![video.clone(), audio.clone()]);
        assert_eq!(fs::read(&final_path).unwrap(), b"video|audio");
        assert!(!video.exists());
        assert!(!audio.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mux_failure_keeps_inputs() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("temp_video.mp4");
        let audio = dir.path().join("temp_audio.wav");
        let final_path = dir.path().join("out.mp4");
        fs::write(&video, b"video").unwrap();
        fs::write(&audio, b"audio").unwrap();

        match failing_merger().merge(&video, Some(&audio), &final_path).await {
            Err(SaveError::Merge { status, diagnostics }) => {
                assert_eq!(status, Some(1));
                assert!(diagnostics.contains("Invalid data found"));
            }
            other => panic!("expected merge error, got {:?}", other),
        }
        assert!(!final_path.exists());
        assert!(video.exists());
        assert!(audio.exists());
    }

    #[tokio::test]
    async fn test_missing_video_is_reported() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("temp_video.mp4");
        let final_path = dir.path().join("out.mp4");

        let result = concat_merger().merge(&video, None, &final_path).await;
        assert!(matches!(result, Err(SaveError::MissingInput(p)) if p == video));
        assert!(!final_path.exists());
    }

    #[tokio::test]
    async fn test_existing_destination_is_kept() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("temp_video.mp4");
        let final_path = dir.path().join("out.mp4");
        fs::write(&video, b"new").unwrap();
        fs::write(&final_path, b"old").unwrap();

        let result = concat_merger().merge(&video, None, &final_path).await;
        assert!(matches!(result, Err(SaveError::DestinationExists(_))));
        assert_eq!(fs::read(&final_path).unwrap(), b"old");
        assert!(video.exists());
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("", 5), "");
    }

    #[test]
    fn test_copy_into_place_moves_file() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("temp_video.mp4");
        let to = dir.path().join("copied.mp4");
        fs::write(&from, b"video").unwrap();

        copy_into_place(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"video");
        assert!(!from.exists());
    }

    #[test]
    fn test_failed_copy_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("missing.mp4");
        let to = dir.path().join("copied.mp4");

        match copy_into_place(&from, &to) {
            Err(SaveError::Io { path, .. }) => assert_eq!(path, to),
            other => panic!("expected io error, got {:?}", other),
        }
        assert!(!to.exists());
    }
}
