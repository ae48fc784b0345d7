//! Clip admission limits and per-user defaults.

use crate::error::CoreError;

/// Default per-user cap on clips in `uploading` or `processing`.
pub const DEFAULT_QUEUE_LIMIT: i32 = 10;

/// Default per-user maximum clip duration in seconds.
pub const DEFAULT_MAX_CLIP_DURATION: i32 = 300;

/// Default per-user maximum total montage duration in seconds.
pub const DEFAULT_MAX_MONTAGE_DURATION: i32 = 600;

/// 100 MiB.
pub const DEFAULT_MAX_CLIP_SIZE_BYTES: i64 = 100 * 1024 * 1024;

/// Admissible range for submitted clips.
///
/// | Env Var                  | Default     |
/// |--------------------------|-------------|
/// | `MIN_CLIP_DURATION_SECS` | `1`         |
/// | `MAX_CLIP_DURATION_SECS` | `300`       |
/// | `MAX_CLIP_SIZE_BYTES`    | `104857600` |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipLimits {
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub max_size_bytes: i64,
}

impl Default for ClipLimits {
    fn default() -> Self {
        Self {
            min_duration_secs: 1.0,
            max_duration_secs: DEFAULT_MAX_CLIP_DURATION as f64,
            max_size_bytes: DEFAULT_MAX_CLIP_SIZE_BYTES,
        }
    }
}

impl ClipLimits {
    /// Load limits from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_duration_secs: env_or("MIN_CLIP_DURATION_SECS", defaults.min_duration_secs),
            max_duration_secs: env_or("MAX_CLIP_DURATION_SECS", defaults.max_duration_secs),
            max_size_bytes: env_or("MAX_CLIP_SIZE_BYTES", defaults.max_size_bytes),
        }
    }

    /// Reject anything that is not a `video/*` upload or exceeds the size cap.
    pub fn validate_file(&self, mime_type: &str, file_size: i64) -> Result<(), CoreError> {
        if !mime_type.starts_with("video/") {
            return Err(CoreError::Validation(format!(
                "Only video files are accepted, got '{mime_type}'"
            )));
        }
        if file_size <= 0 {
            return Err(CoreError::Validation("File is empty".to_string()));
        }
        if file_size > self.max_size_bytes {
            return Err(CoreError::Validation(format!(
                "File too large: {} MB (max {} MB)",
                file_size / (1024 * 1024),
                self.max_size_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    /// Check a probed duration against the configured range and the owner's
    /// personal cap, whichever is lower.
    pub fn validate_duration(&self, duration: f64, user_max: Option<i32>) -> Result<(), CoreError> {
        let max = match user_max {
            Some(user_max) => self.max_duration_secs.min(user_max as f64),
            None => self.max_duration_secs,
        };
        if !duration.is_finite() || duration < self.min_duration_secs {
            return Err(CoreError::Validation(format!(
                "Clip is too short: {duration:.1}s (min {:.0}s)",
                self.min_duration_secs
            )));
        }
        if duration > max {
            return Err(CoreError::Validation(format!(
                "Clip is too long: {duration:.1}s (max {max:.0}s)"
            )));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
