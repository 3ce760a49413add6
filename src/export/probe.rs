//! Final file inspection with ffprobe

use super::types::MediaInfo;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffprobe failed: {0}")]
    Failed(String),

    #[error("Failed to parse ffprobe output: {0}")]
    Parse(String),
}

/// Get stream metadata for a media file
pub async fn probe_media(path: &Path) -> Result<MediaInfo, ProbeError> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ProbeError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Extract [`MediaInfo`] from ffprobe's JSON output
pub fn parse_probe_output(json_str: &str) -> Result<MediaInfo, ProbeError> {
    let json: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| ProbeError::Parse("No streams found".to_string()))?;

    let stream_of = |codec_type: &str| {
        streams
            .iter()
            .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some(codec_type))
    };

    let video = stream_of("video").ok_or_else(|| ProbeError::Parse("No video stream found".to_string()))?;

    let width = video.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = video.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let video_codec = video
        .get("codec_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    // "30/1" or "29.97"
    let fps = video
        .get("r_frame_rate")
        .and_then(|v| v.as_str())
        .map(|s| match s.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().unwrap_or(0.0);
                let den: f64 = den.parse().unwrap_or(1.0);
                if den > 0.0 {
                    num / den
                } else {
                    0.0
                }
            }
            None => s.parse().unwrap_or(0.0),
        })
        .unwrap_or(0.0);

    let audio_codec = stream_of("audio")
        .and_then(|a| a.get("codec_name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let duration_secs = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration_secs,
        width,
        height,
        fps,
        video_codec,
        audio_codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_and_audio() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264",
                 "width": 1920, "height": 1080, "r_frame_rate": "30/1"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.video_codec, "h264");
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
        assert!((info.duration_secs - 12.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_video_only() {
        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "h264",
            "width": 1280, "height": 720, "r_frame_rate": "30000/1001"}], "format": {}}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(info.audio_codec.is_none());
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.duration_secs, 0.0);
    }

    #[test]
    fn test_parse_without_video_fails() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "pcm_s16le"}]}"#;
        assert!(matches!(parse_probe_output(json), Err(ProbeError::Parse(_))));
    }
}
