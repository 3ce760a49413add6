//! Temporary and final file paths
//!
//! All files live directly in the output directory:
//! - `temp_video.mp4`, `temp_audio.wav`, `temp_camera.mp4`: in-progress takes
//! - `screenrecording<N>.mp4`: default-named final recordings
//! - `<stem>-camera.mp4`, `<stem>-audio-<n>.wav`: companions of a final file

use crate::capture::TrackKind;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Prefix of default-named recordings
pub const DEFAULT_NAME_PREFIX: &str = "screenrecording";

/// Extension of the final container
pub const FINAL_EXTENSION: &str = "mp4";

/// Allocates temp paths for tracks and resolves final output paths
#[derive(Debug)]
pub struct TrackStore {
    output_dir: PathBuf,
    /// Paths handed out since the last successful save
    allocated: HashSet<PathBuf>,
}

impl TrackStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            allocated: HashSet::new(),
        }
    }

    /// Next free temp path for a track kind
    ///
    /// The first take of a kind is `temp_<kind>.<ext>`; later takes, or takes
    /// started while an earlier file is still on disk, get `-1`, `-2`, ...
    pub fn allocate_temp_path(&mut self, kind: TrackKind) -> PathBuf {
        let path = (0..)
            .map(|n| self.output_dir.join(temp_file_name(kind, n)))
            .find(|p| !p.exists() && !self.allocated.contains(p))
            .unwrap_or_else(|| self.output_dir.join(temp_file_name(kind, 0)));
        self.allocated.insert(path.clone());
        path
    }

    /// Forget allocations after a successful save
    pub fn reset(&mut self) {
        self.allocated.clear();
    }

    /// Final path for a save
    ///
    /// Without a name this is `screenrecording<N>.mp4` where `N` is one more
    /// than the number of existing default-named files, moved past any number
    /// that is already taken. A given name gets `.mp4` appended when missing;
    /// only its file name component is used.
    pub fn resolve_final_path(&self, requested_name: Option<&str>) -> PathBuf {
        let requested = requested_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .and_then(|n| Path::new(n).file_name())
            .map(|n| n.to_string_lossy().to_string());

        match requested {
            Some(name) => {
                let suffix = format!(".{}", FINAL_EXTENSION);
                if name.ends_with(&suffix) {
                    self.output_dir.join(name)
                } else {
                    self.output_dir.join(format!("{}{}", name, suffix))
                }
            }
            None => {
                let existing = self.count_default_named();
                (existing + 1..)
                    .map(|n| self.output_dir.join(default_file_name(n)))
                    .find(|p| !p.exists())
                    .unwrap_or_else(|| self.output_dir.join(default_file_name(existing + 1)))
            }
        }
    }

    /// Free path next to `final_path` for a companion take
    ///
    /// `<stem>-camera.mp4`, `<stem>-camera-2.mp4`, ... for camera takes and
    /// `<stem>-audio-1.wav`, ... for superseded audio takes.
    pub fn companion_path(&self, final_path: &Path, kind: TrackKind) -> PathBuf {
        let stem = final_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string());
        let dir = final_path.parent().unwrap_or(&self.output_dir);

        (1..)
            .map(|n| {
                let name = match (kind, n) {
                    (TrackKind::Audio, n) => format!("{}-{}-{}.{}", stem, kind, n, kind.extension()),
                    (_, 1) => format!("{}-{}.{}", stem, kind, kind.extension()),
                    (_, n) => format!("{}-{}-{}.{}", stem, kind, n, kind.extension()),
                };
                dir.join(name)
            })
            .find(|p| !p.exists())
            .unwrap_or_else(|| dir.join(format!("{}-{}.{}", stem, kind, kind.extension())))
    }

    /// Remove a temporary file if present
    ///
    /// A missing file is not an error.
    pub fn cleanup(path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Removed {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn count_default_named(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.output_dir) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| default_name_number(&e.file_name().to_string_lossy()).is_some())
            .count()
    }
}

fn temp_file_name(kind: TrackKind, ordinal: usize) -> String {
    if ordinal == 0 {
        format!("temp_{}.{}", kind, kind.extension())
    } else {
        format!("temp_{}-{}.{}", kind, ordinal, kind.extension())
    }
}

/// `N` of a `screenrecording<N>.mp4` name; companions like
/// `screenrecording1-camera.mp4` do not match
fn default_name_number(name: &str) -> Option<usize> {
    let digits = name
        .strip_prefix(DEFAULT_NAME_PREFIX)?
        .strip_suffix(FINAL_EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn default_file_name(n: usize) -> String {
    format!("{}{}.{}", DEFAULT_NAME_PREFIX, n, FINAL_EXTENSION)
}
