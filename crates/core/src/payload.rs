//! Job payload schemas.
//!
//! One validation entry point, [`validate_payload`], is shared by the queue
//! service at enqueue time and by the dispatcher when a job runs, so both
//! layers always agree on what a well-formed payload is.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::media::{MontageClip, MontageSettings};
use crate::scheduling::{PRIORITY_MAX, PRIORITY_MIN};
use crate::status::JobType;
use crate::types::DbId;

/// Payload of a `queue` job: process one submitted clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClipJobPayload {
    #[validate(range(min = 1))]
    pub clip_id: DbId,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[validate(length(min = 1))]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[validate(url)]
    pub original_url: String,
    #[validate(length(min = 1))]
    pub filename: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    #[validate(range(min = 0.1))]
    pub duration: f64,
    #[serde(default)]
    #[validate(range(min = PRIORITY_MIN, max = PRIORITY_MAX))]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Payload of a `montage` job: render one montage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_montage_clips"))]
pub struct MontageJobPayload {
    #[validate(range(min = 1))]
    pub montage_id: DbId,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub clips: Vec<MontageClip>,
    #[serde(default)]
    pub settings: MontageSettings,
    #[serde(default)]
    #[validate(range(min = PRIORITY_MIN, max = PRIORITY_MAX))]
    pub priority: i32,
}

fn validate_montage_clips(payload: &MontageJobPayload) -> Result<(), ValidationError> {
    check_clip_trims(&payload.clips)?;
    if let Err(message) = payload.settings.check_ranges() {
        return Err(ValidationError::new("settings").with_message(message.into()));
    }
    Ok(())
}

/// Trim bounds must be non-negative and `startTime < endTime` when both are set.
pub fn check_clip_trims(clips: &[MontageClip]) -> Result<(), ValidationError> {
    for clip in clips {
        if clip.start_time.is_some_and(|t| t < 0.0) || clip.end_time.is_some_and(|t| t < 0.0) {
            return Err(ValidationError::new("negative_trim")
                .with_message(format!("clip {} has a negative trim bound", clip.clip_id).into()));
        }
        if let (Some(start), Some(end)) = (clip.start_time, clip.end_time) {
            if start >= end {
                return Err(ValidationError::new("trim_order").with_message(
                    format!("clip {}: startTime must be before endTime", clip.clip_id).into(),
                ));
            }
        }
    }
    Ok(())
}

/// A validated payload, tagged by job type.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    Clip(ClipJobPayload),
    Montage(MontageJobPayload),
}

impl JobPayload {
    pub fn priority(&self) -> i32 {
        match self {
            JobPayload::Clip(p) => p.priority,
            JobPayload::Montage(p) => p.priority,
        }
    }
}

/// Parse and validate `payload` against the schema registered for `job_type`.
///
/// Unknown job types are rejected with the same message the dispatcher
/// records on the job.
pub fn validate_payload(job_type: &str, payload: &serde_json::Value) -> Result<JobPayload, CoreError> {
    let job_type: JobType = job_type
        .parse()
        .map_err(|_| CoreError::Validation(format!("Unknown job type: {job_type}")))?;

    match job_type {
        JobType::Queue => {
            let parsed: ClipJobPayload = parse(payload)?;
            parsed.validate()?;
            Ok(JobPayload::Clip(parsed))
        }
        JobType::Montage => {
            let parsed: MontageJobPayload = parse(payload)?;
            parsed.validate()?;
            Ok(JobPayload::Montage(parsed))
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &serde_json::Value) -> Result<T, CoreError> {
    T::deserialize(payload).map_err(|e| CoreError::Validation(format!("Invalid payload: {e}")))
}

/// Best-effort lookup of the entity id referenced by a raw payload, used to
/// mirror failures onto the entity even when the payload does not validate.
pub fn referenced_id(payload: &serde_json::Value, key: &str) -> Option<DbId> {
    match payload.get(key)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn clip_payload() -> serde_json::Value {
        json!({
            "clipId": 7,
            "userId": "1001",
            "guildId": "g1",
            "channelId": "c1",
            "originalUrl": "https://cdn.example.com/a.mp4",
            "filename": "a.mp4",
            "fileSize": 2048,
            "duration": 12.5,
        })
    }

    fn montage_payload() -> serde_json::Value {
        json!({
            "montageId": 3,
            "userId": "1001",
            "guildId": "g1",
            "title": "Best of",
            "clips": [
                { "clipId": 1, "order": 0 },
                { "clipId": 2, "startTime": 1.0, "endTime": 4.0, "order": 1 }
            ],
        })
    }

    #[test]
    fn valid_clip_payload() {
        let parsed = validate_payload("queue", &clip_payload()).unwrap();
        assert_matches!(parsed, JobPayload::Clip(ref p) if p.clip_id == 7 && p.priority == 0);
    }

    #[test]
    fn clip_payload_missing_field_rejected() {
        let mut payload = clip_payload();
        payload.as_object_mut().unwrap().remove("filename");
        assert_matches!(validate_payload("queue", &payload), Err(CoreError::Validation(_)));
    }

    #[test]
    fn clip_payload_bad_url_rejected() {
        let mut payload = clip_payload();
        payload["originalUrl"] = json!("not a url");
        assert_matches!(validate_payload("queue", &payload), Err(CoreError::Validation(_)));
    }

    #[test]
    fn clip_payload_priority_out_of_range_rejected() {
        let mut payload = clip_payload();
        payload["priority"] = json!(11);
        assert!(validate_payload("queue", &payload).is_err());
    }

    #[test]
    fn valid_montage_payload_gets_default_settings() {
        let parsed = validate_payload("montage", &montage_payload()).unwrap();
        let JobPayload::Montage(p) = parsed else {
            panic!("expected montage payload");
        };
        assert_eq!(p.clips.len(), 2);
        assert_eq!(p.settings.output.format, "mp4");
    }

    #[test]
    fn montage_trim_bounds_must_be_ordered() {
        let mut payload = montage_payload();
        payload["clips"][1]["startTime"] = json!(5.0);
        let err = validate_payload("montage", &payload).unwrap_err();
        assert!(err.to_string().contains("startTime must be before endTime"));
    }

    #[test]
    fn montage_title_too_long_rejected() {
        let mut payload = montage_payload();
        payload["title"] = json!("x".repeat(101));
        assert!(validate_payload("montage", &payload).is_err());
    }

    #[test]
    fn montage_without_clips_rejected() {
        let mut payload = montage_payload();
        payload["clips"] = json!([]);
        assert!(validate_payload("montage", &payload).is_err());
    }

    #[test]
    fn unknown_type_rejected() {
        let err = validate_payload("render", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Unknown job type: render");
    }

    #[test]
    fn referenced_id_reads_numbers_and_strings() {
        assert_eq!(referenced_id(&json!({ "clipId": 4 }), "clipId"), Some(4));
        assert_eq!(referenced_id(&json!({ "clipId": "9" }), "clipId"), Some(9));
        assert_eq!(referenced_id(&json!({ "clipId": true }), "clipId"), None);
        assert_eq!(referenced_id(&json!({}), "clipId"), None);
    }
}
