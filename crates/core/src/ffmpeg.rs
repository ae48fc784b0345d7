//! ffprobe/ffmpeg subprocess helpers.
//!
//! The probe turns a downloaded clip into [`VideoInfo`]; the concat helper
//! renders a montage from already-trimmed segment files.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::media::{ClipMetadata, OutputSettings};

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub size: Option<String>,
    pub format_name: Option<String>,
    pub bit_rate: Option<String>,
}

/// What the rest of the system needs to know about a probed file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Seconds.
    pub duration: f64,
    pub metadata: ClipMetadata,
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = media_command("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// One input of a montage render: a source file and optional trim bounds.
#[derive(Debug, Clone)]
pub struct ConcatSegment {
    pub path: PathBuf,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// Cut a single segment into `output`, re-encoding to the montage's output
/// settings so every segment can be concatenated without re-encoding again.
pub async fn render_segment(
    segment: &ConcatSegment,
    output: &Path,
    settings: &OutputSettings,
) -> Result<(), FfmpegError> {
    if !segment.path.exists() {
        return Err(FfmpegError::VideoNotFound(
            segment.path.to_string_lossy().to_string(),
        ));
    }

    let mut cmd = media_command("ffmpeg");
    cmd.arg("-y");
    if let Some(start) = segment.start {
        cmd.args(["-ss", &format!("{start:.3}")]);
    }
    if let Some(end) = segment.end {
        cmd.args(["-to", &format!("{end:.3}")]);
    }
    cmd.arg("-i").arg(&segment.path);
    cmd.args(segment_encode_args(settings));
    cmd.arg(output);

    run(cmd).await
}

/// Concatenate pre-rendered segments listed in `list_file` (concat demuxer
/// format) into `output` without re-encoding.
pub async fn concat_segments(list_file: &Path, output: &Path) -> Result<(), FfmpegError> {
    let mut cmd = media_command("ffmpeg");
    cmd.args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(list_file)
        .args(["-c", "copy"])
        .arg(output);

    run(cmd).await
}

/// Body of a concat demuxer list file for the given segment paths.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

/// A command whose child is killed when the awaiting future is dropped, so a
/// timed-out render does not leave ffmpeg running.
fn media_command(program: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.kill_on_drop(true);
    cmd
}

async fn run(mut cmd: tokio::process::Command) -> Result<(), FfmpegError> {
    let output = cmd.output().await.map_err(FfmpegError::NotFound)?;
    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

fn segment_encode_args(settings: &OutputSettings) -> Vec<String> {
    let scale = settings.resolution.replace('x', ":");
    vec![
        "-vf".to_string(),
        format!("scale={scale}:force_original_aspect_ratio=decrease,pad={scale}:(ow-iw)/2:(oh-ih)/2,setsar=1"),
        "-r".to_string(),
        settings.frame_rate.to_string(),
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-b:v".to_string(),
        settings.bitrate.clone(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
        "-ar".to_string(),
        "48000".to_string(),
        "-ac".to_string(),
        "2".to_string(),
    ]
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    if let Some(secs) = probe.format.duration.as_deref().and_then(|d| d.parse().ok()) {
        return secs;
    }
    first_video_stream(probe)
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse().ok())
        .unwrap_or(0.0)
}

/// Parse the video framerate from ffprobe output.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    first_video_stream(probe)
        .and_then(|s| s.r_frame_rate.as_deref())
        .map(parse_fraction)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    if let Some((num, den)) = s.split_once('/') {
        let num = num.parse::<f64>().unwrap_or(0.0);
        let den = den.parse::<f64>().unwrap_or(1.0);
        return if den > 0.0 { num / den } else { 0.0 };
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Reduce a resolution to its aspect ratio, e.g. 1920x1080 -> "16:9".
pub fn aspect_ratio(width: i32, height: i32) -> String {
    if width <= 0 || height <= 0 {
        return "0:0".to_string();
    }
    let divisor = gcd(width as u32, height as u32);
    format!("{}:{}", width as u32 / divisor, height as u32 / divisor)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Collapse ffprobe output into [`VideoInfo`].
pub fn video_info(probe: &FfprobeOutput) -> VideoInfo {
    let stream = first_video_stream(probe);
    let width = stream.and_then(|s| s.width).unwrap_or(0);
    let height = stream.and_then(|s| s.height).unwrap_or(0);
    let bitrate = stream
        .and_then(|s| s.bit_rate.as_deref())
        .or(probe.format.bit_rate.as_deref())
        .and_then(|b| b.parse().ok())
        .unwrap_or(0);

    VideoInfo {
        duration: parse_duration(probe),
        metadata: ClipMetadata {
            width,
            height,
            fps: parse_framerate(probe),
            codec: stream.and_then(|s| s.codec_name.clone()).unwrap_or_default(),
            bitrate,
            aspect_ratio: aspect_ratio(width, height),
        },
        format: probe.format.format_name.clone(),
    }
}
