//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub has_audio: bool,
    pub has_video: bool,
    /// Width in pixels (0 without video)
    pub width: u32,
    /// Height in pixels (0 without video)
    pub height: u32,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Read stream and format details of a media file with ffprobe.
pub async fn read_media_info(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_ffprobe_json(&output.stdout)
}

fn parse_ffprobe_json(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = parsed.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = parsed.streams.iter().any(|s| s.codec_type == "audio");

    // Container duration first, then the longest stream duration
    let duration = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            parsed
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    let size = parsed
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaInfo {
        duration,
        has_audio,
        has_video: video_stream.is_some(),
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        size,
    })
}

/// Measure an audio file's duration, which must be positive.
pub async fn audio_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let info = read_media_info(path).await?;

    if !info.has_audio {
        return Err(MediaError::invalid_media(format!(
            "{} has no audio stream",
            path.display()
        )));
    }
    if !(info.duration.is_finite() && info.duration > 0.0) {
        return Err(MediaError::invalid_media(format!(
            "{} has non-positive duration {}",
            path.display(),
            info.duration
        )));
    }

    Ok(info.duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_audio_stream() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "duration": "7.200000"}],
            "format": {"duration": "7.200000", "size": "115244"}
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert!(info.has_audio);
        assert!(!info.has_video);
        assert!((info.duration - 7.2).abs() < 1e-9);
        assert_eq!(info.size, 115244);
    }

    #[test]
    fn test_parse_falls_back_to_stream_duration() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080, "duration": "3.0"},
                {"codec_type": "audio", "duration": "3.5"}
            ],
            "format": {}
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.width, 1920);
        assert!((info.duration - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = read_media_info("/nonexistent/narration.mp3").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
