//! Embedded documents owned by clip and montage rows (stored as JSONB).

use serde::{Deserialize, Serialize};

use crate::status::StepStatus;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Clip metadata
// ---------------------------------------------------------------------------

/// Technical metadata extracted from a clip by the probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMetadata {
    pub width: i32,
    pub height: i32,
    pub fps: f64,
    pub codec: String,
    pub bitrate: i64,
    pub aspect_ratio: String,
}

// ---------------------------------------------------------------------------
// Montage settings
// ---------------------------------------------------------------------------

/// Rendering settings for a montage. Every field has a default so a partial
/// document from a client fills in the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MontageSettings {
    pub output: OutputSettings,
    pub transitions: TransitionSettings,
    pub audio: AudioSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSettings {
    pub resolution: String,
    pub aspect_ratio: String,
    pub frame_rate: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub bitrate: String,
    pub format: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            resolution: "1920x1080".to_string(),
            aspect_ratio: "16:9".to_string(),
            frame_rate: 30,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            bitrate: "8M".to_string(),
            format: "mp4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Fade,
    Slide,
    Wipe,
    Zoom,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionSettings {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    /// Seconds, 0 to 5.
    pub duration: f64,
    pub easing: String,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration: 0.5,
            easing: "ease-in-out".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_url: Option<String>,
    /// 0.0 to 1.0.
    pub volume: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            track_url: None,
            volume: 0.8,
            fade_in: 1.0,
            fade_out: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub position: WatermarkPosition,
    pub opacity: f64,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            image_url: None,
            position: WatermarkPosition::BottomRight,
            opacity: 0.7,
        }
    }
}

impl MontageSettings {
    /// Reject values outside the ranges the renderer accepts.
    pub fn check_ranges(&self) -> Result<(), String> {
        if !(0.0..=5.0).contains(&self.transitions.duration) {
            return Err("transition duration must be between 0 and 5 seconds".to_string());
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err("audio volume must be between 0 and 1".to_string());
        }
        if self.audio.fade_in < 0.0 || self.audio.fade_out < 0.0 {
            return Err("audio fades must not be negative".to_string());
        }
        if let Some(watermark) = &self.watermark {
            if !(0.0..=1.0).contains(&watermark.opacity) {
                return Err("watermark opacity must be between 0 and 1".to_string());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Montage clip references and processing steps
// ---------------------------------------------------------------------------

/// One entry of a montage's ordered clip list. Trim bounds are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MontageClip {
    pub clip_id: DbId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    pub order: u32,
}

impl MontageClip {
    /// Seconds of this clip used in the montage, given the source duration.
    pub fn trimmed_duration(&self, source_duration: f64) -> f64 {
        let start = self.start_time.unwrap_or(0.0).max(0.0);
        let end = self.end_time.unwrap_or(source_duration).min(source_duration);
        (end - start).max(0.0)
    }
}

/// A recorded montage processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds between `started_at` and `completed_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

// ---------------------------------------------------------------------------
// Duration formatting
// ---------------------------------------------------------------------------

/// `M:SS`.
pub fn format_minutes(duration_secs: f64) -> String {
    let total = duration_secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// `H:MM:SS` when at least an hour long, otherwise `M:SS`.
pub fn format_hours(duration_secs: f64) -> String {
    let total = duration_secs.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
