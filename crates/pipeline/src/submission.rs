//! Clip and montage submission.
//!
//! A clip is downloaded, hashed and probed before anything is persisted, so
//! a clip outside the admissible duration never produces a row or a job.
//! The clip insert itself runs the per-user queue-limit and duplicate checks
//! as one serialized unit inside the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clipcraftr_core::audit::{
    ACTION_CLIP_DELETED, ACTION_CLIP_SUBMITTED, ACTION_MONTAGE_CANCELLED, ACTION_MONTAGE_CREATED,
    COLLECTION_CLIPS, COLLECTION_MONTAGES, SYSTEM_ACTOR,
};
use clipcraftr_core::error::CoreError;
use clipcraftr_core::events::{
    CHANNEL_CLIP, CHANNEL_MONTAGE, EVENT_CREATED, EVENT_DELETED, EVENT_STATUS,
};
use clipcraftr_core::limits::ClipLimits;
use clipcraftr_core::media::{MontageClip, MontageSettings};
use clipcraftr_core::naming::{sha256_file, stored_clip_name};
use clipcraftr_core::payload::{check_clip_trims, ClipJobPayload, MontageJobPayload};
use clipcraftr_core::scheduling::{priority_from_label, validate_priority, QueuePosition};
use clipcraftr_core::status::{ClipStatus, JobType, MontageStatus};
use clipcraftr_core::types::DbId;
use clipcraftr_db::models::clip::{normalize_tags, Clip, ClipFilter, NewClip};
use clipcraftr_db::models::job::Job;
use clipcraftr_db::models::montage::{Montage, MontageFilter, NewMontage};
use clipcraftr_db::models::user::{UpsertUser, User};
use clipcraftr_db::store::{ClipStore, MontageStore, UserStore};
use clipcraftr_events::AuditRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::context::PipelineContext;
use crate::error::PipelineResult;
use crate::probe::{MediaFetcher, VideoProbe};
use crate::processor::ProcessingError;
use crate::queue::{QueueService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Priority as sent by clients: a label (`"normal"`, `"high"`) or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PriorityInput {
    Value(i32),
    Label(String),
}

impl Default for PriorityInput {
    fn default() -> Self {
        PriorityInput::Value(0)
    }
}

impl PriorityInput {
    pub fn resolve(&self) -> Result<i32, CoreError> {
        match self {
            PriorityInput::Value(value) => validate_priority(*value).map(|()| *value),
            PriorityInput::Label(label) => priority_from_label(label),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClipSubmission {
    #[validate(length(min = 1))]
    pub discord_id: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[validate(length(min = 1))]
    pub channel_id: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[validate(url)]
    pub attachment_url: String,
    #[validate(length(min = 1, max = 255))]
    pub original_name: String,
    pub mime_type: String,
    pub file_size: i64,
    #[serde(default)]
    pub priority: PriorityInput,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MontageRequest {
    #[validate(length(min = 1))]
    pub discord_id: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub clips: Vec<MontageClip>,
    #[serde(default)]
    pub settings: MontageSettings,
    #[serde(default)]
    pub priority: PriorityInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipSubmissionOutcome {
    pub clip: Clip,
    pub job: Job,
    /// `None` when the job already left the queue.
    pub position: Option<QueuePosition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MontageSubmissionOutcome {
    pub montage: Montage,
    pub job: Job,
}

/// Query for clip and montage listings. `discordId` narrows the listing to
/// one owner; an unknown owner has nothing to list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub discord_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListingQuery {
    fn page(&self) -> (i64, i64) {
        (
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            self.offset.unwrap_or(0).max(0),
        )
    }
}

// ---------------------------------------------------------------------------
// SubmissionService
// ---------------------------------------------------------------------------

pub struct SubmissionService {
    ctx: PipelineContext,
    queue: Arc<QueueService>,
    fetcher: Arc<dyn MediaFetcher>,
    probe: Arc<dyn VideoProbe>,
    limits: ClipLimits,
    upload_dir: PathBuf,
}

impl SubmissionService {
    pub fn new(
        ctx: PipelineContext,
        queue: Arc<QueueService>,
        fetcher: Arc<dyn MediaFetcher>,
        probe: Arc<dyn VideoProbe>,
        limits: ClipLimits,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            queue,
            fetcher,
            probe,
            limits,
            upload_dir: upload_dir.into(),
        }
    }

    /// Download, probe and persist a clip, then enqueue its processing job.
    /// The downloaded file is removed on any failure.
    pub async fn submit_clip(&self, request: ClipSubmission) -> PipelineResult<ClipSubmissionOutcome> {
        request.validate()?;
        let priority = request.priority.resolve()?;
        self.limits.validate_file(&request.mime_type, request.file_size)?;

        let user = self
            .ctx
            .store
            .upsert_user(&UpsertUser {
                discord_id: request.discord_id.clone(),
                username: request.username.clone(),
                discriminator: "0".to_string(),
                avatar: request.avatar.clone(),
            })
            .await?;

        let file_name = stored_clip_name(
            &request.discord_id,
            Utc::now().timestamp_millis(),
            &request.original_name,
        );
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(ProcessingError::from)?;
        let path = self.upload_dir.join(&file_name);

        let result = self
            .store_clip(&request, &user, priority, &file_name, &path)
            .await;
        if result.is_err() {
            remove_quietly(&path).await;
        }
        result
    }

    async fn store_clip(
        &self,
        request: &ClipSubmission,
        user: &User,
        priority: i32,
        file_name: &str,
        path: &Path,
    ) -> PipelineResult<ClipSubmissionOutcome> {
        let size = self
            .fetcher
            .fetch(&request.attachment_url, path, self.limits.max_size_bytes)
            .await?;
        if size == 0 {
            return Err(CoreError::Validation("Downloaded file is empty".to_string()).into());
        }

        let content_hash = sha256_file(path).await.map_err(ProcessingError::from)?;

        let info = self.probe.probe(path).await.map_err(ProcessingError::from)?;
        self.limits
            .validate_duration(info.duration, Some(user.max_clip_duration))?;

        let file_size = i64::try_from(size).unwrap_or(i64::MAX);
        let clip = self
            .ctx
            .store
            .insert_clip_checked(
                &NewClip {
                    user_id: user.id,
                    guild_id: request.guild_id.clone(),
                    channel_id: request.channel_id.clone(),
                    message_id: request.message_id.clone(),
                    original_name: request.original_name.clone(),
                    file_name: file_name.to_string(),
                    file_url: format!("/uploads/{file_name}"),
                    file_path: path.to_string_lossy().to_string(),
                    file_size,
                    duration: info.duration,
                    mime_type: request.mime_type.clone(),
                    metadata: info.metadata.clone(),
                    priority,
                    tags: normalize_tags(&request.tags),
                    content_hash: Some(content_hash),
                },
                user.queue_limit,
            )
            .await?;

        let payload = ClipJobPayload {
            clip_id: clip.id,
            user_id: request.discord_id.clone(),
            guild_id: request.guild_id.clone(),
            channel_id: request.channel_id.clone(),
            message_id: request.message_id.clone(),
            original_url: request.attachment_url.clone(),
            filename: file_name.to_string(),
            file_size,
            duration: info.duration,
            priority,
            metadata: Some(json!(info.metadata)),
        };
        let payload =
            serde_json::to_value(&payload).map_err(|e| CoreError::Internal(e.to_string()))?;

        let job = match self
            .queue
            .enqueue(
                JobType::Queue.as_str(),
                payload,
                Some(request.discord_id.clone()),
                Some(request.guild_id.clone()),
            )
            .await
        {
            Ok(job) => job,
            Err(e) => {
                if let Err(mark) = self.ctx.store.mark_clip_error(clip.id, &e.to_string()).await {
                    tracing::error!(clip_id = clip.id, error = %mark, "Failed to mark clip as errored");
                }
                return Err(e);
            }
        };
        let position = self.queue.get_position(job.id).await.ok();

        tracing::info!(clip_id = clip.id, job_id = job.id, duration = clip.duration, "Clip submitted");
        self.ctx.record(
            AuditRecord::new(ACTION_CLIP_SUBMITTED, COLLECTION_CLIPS)
                .by(&request.discord_id)
                .document(clip.id)
                .details(json!({ "jobId": job.id, "fileName": clip.file_name })),
        );
        self.ctx.emit(CHANNEL_CLIP, EVENT_CREATED, json!({ "clip": clip }));

        Ok(ClipSubmissionOutcome {
            clip,
            job,
            position,
        })
    }

    /// Validate a montage against its source clips, persist it `queued` and
    /// enqueue its render job.
    pub async fn create_montage(&self, request: MontageRequest) -> PipelineResult<MontageSubmissionOutcome> {
        request.validate()?;
        check_clip_trims(&request.clips).map_err(|e| {
            CoreError::Validation(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            )
        })?;
        request
            .settings
            .check_ranges()
            .map_err(CoreError::Validation)?;
        let priority = request.priority.resolve()?;

        let store = &self.ctx.store;
        let user = store
            .upsert_user(&UpsertUser {
                discord_id: request.discord_id.clone(),
                username: request.username.clone(),
                discriminator: "0".to_string(),
                avatar: None,
            })
            .await?;

        let clip_ids: Vec<DbId> = request.clips.iter().map(|c| c.clip_id).collect();
        let clips = store.find_clips(&clip_ids).await?;

        let mut total = 0.0;
        for entry in &request.clips {
            let clip = clips
                .iter()
                .find(|c| c.id == entry.clip_id)
                .ok_or(CoreError::NotFound {
                    entity: "Clip",
                    id: entry.clip_id,
                })?;
            if clip.user_id != user.id {
                return Err(CoreError::Validation(format!(
                    "Clip {} does not belong to you",
                    clip.id
                ))
                .into());
            }
            if clip.status != ClipStatus::Ready {
                return Err(CoreError::Validation(format!(
                    "Clip {} is {} and cannot be used in a montage",
                    clip.id, clip.status
                ))
                .into());
            }
            if entry.start_time.is_some_and(|start| start >= clip.duration) {
                return Err(CoreError::Validation(format!(
                    "Clip {}: startTime is past the end of the clip",
                    clip.id
                ))
                .into());
            }
            total += entry.trimmed_duration(clip.duration);
        }

        let max = f64::from(user.max_montage_duration);
        if total > max {
            return Err(CoreError::Validation(format!(
                "Montage is too long: {total:.1}s (max {max:.0}s)"
            ))
            .into());
        }

        let montage = store
            .insert_montage(&NewMontage {
                user_id: user.id,
                title: request.title.clone(),
                description: request.description.clone(),
                clips: request.clips.clone(),
                settings: request.settings.clone(),
                priority,
                duration: total,
            })
            .await?;
        store.add_montage_ref(&clip_ids, montage.id).await?;

        let payload = MontageJobPayload {
            montage_id: montage.id,
            user_id: request.discord_id.clone(),
            guild_id: request.guild_id.clone(),
            channel_id: request.channel_id.clone(),
            message_id: request.message_id.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            clips: request.clips.clone(),
            settings: request.settings.clone(),
            priority,
        };
        let payload =
            serde_json::to_value(&payload).map_err(|e| CoreError::Internal(e.to_string()))?;

        let job = match self
            .queue
            .enqueue(
                JobType::Montage.as_str(),
                payload,
                Some(request.discord_id.clone()),
                Some(request.guild_id.clone()),
            )
            .await
        {
            Ok(job) => job,
            Err(e) => {
                if let Err(mark) = store.fail_montage(montage.id, &e.to_string()).await {
                    tracing::error!(montage_id = montage.id, error = %mark, "Failed to mark montage as failed");
                }
                return Err(e);
            }
        };

        tracing::info!(montage_id = montage.id, job_id = job.id, clips = clip_ids.len(), "Montage created");
        self.ctx.record(
            AuditRecord::new(ACTION_MONTAGE_CREATED, COLLECTION_MONTAGES)
                .by(&request.discord_id)
                .document(montage.id)
                .details(json!({ "jobId": job.id, "title": montage.title })),
        );
        self.ctx.emit(CHANNEL_MONTAGE, EVENT_CREATED, json!({ "montage": montage }));

        Ok(MontageSubmissionOutcome { montage, job })
    }

    pub async fn get_clip(&self, id: DbId) -> PipelineResult<Clip> {
        self.ctx
            .store
            .find_clip(id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "Clip", id }.into())
    }

    /// Clips newest first, paged like the queue listing.
    pub async fn list_clips(&self, query: &ListingQuery) -> PipelineResult<Vec<Clip>> {
        let status = query.status.as_deref().map(str::parse::<ClipStatus>).transpose()?;
        let Some(user_id) = self.owner_filter(query).await? else {
            return Ok(Vec::new());
        };
        let (limit, offset) = query.page();
        Ok(self
            .ctx
            .store
            .list_clips(&ClipFilter {
                user_id,
                status,
                limit: Some(limit),
                offset: Some(offset),
            })
            .await?)
    }

    /// Montages newest first, paged like the queue listing.
    pub async fn list_montages(&self, query: &ListingQuery) -> PipelineResult<Vec<Montage>> {
        let status = query
            .status
            .as_deref()
            .map(str::parse::<MontageStatus>)
            .transpose()?;
        let Some(user_id) = self.owner_filter(query).await? else {
            return Ok(Vec::new());
        };
        let (limit, offset) = query.page();
        Ok(self
            .ctx
            .store
            .list_montages(&MontageFilter {
                user_id,
                status,
                limit: Some(limit),
                offset: Some(offset),
            })
            .await?)
    }

    /// `Some(None)` lists every owner, `None` means the owner is unknown.
    async fn owner_filter(&self, query: &ListingQuery) -> PipelineResult<Option<Option<DbId>>> {
        match query.discord_id.as_deref() {
            None => Ok(Some(None)),
            Some(discord_id) => Ok(self
                .ctx
                .store
                .find_user_by_discord_id(discord_id)
                .await?
                .map(|user| Some(user.id))),
        }
    }

    pub async fn get_montage(&self, id: DbId) -> PipelineResult<Montage> {
        self.ctx
            .store
            .find_montage(id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "Montage", id }.into())
    }

    /// Soft delete. The stored file stays on disk.
    pub async fn delete_clip(&self, id: DbId, requestor: Option<&str>) -> PipelineResult<Clip> {
        self.get_clip(id).await?;
        let clip = self
            .ctx
            .store
            .soft_delete_clip(id)
            .await?
            .ok_or_else(|| CoreError::Conflict(format!("Clip {id} is already deleted")))?;

        self.ctx.record(
            AuditRecord::new(ACTION_CLIP_DELETED, COLLECTION_CLIPS)
                .by(requestor.unwrap_or(SYSTEM_ACTOR))
                .document(id),
        );
        self.ctx.emit(CHANNEL_CLIP, EVENT_DELETED, json!({ "id": id }));
        Ok(clip)
    }

    pub async fn cancel_montage(&self, id: DbId, requestor: Option<&str>) -> PipelineResult<Montage> {
        let current = self.get_montage(id).await?;
        let montage = self
            .ctx
            .store
            .cancel_montage(id)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "Montage {id} is {} and cannot be cancelled",
                    current.status
                ))
            })?;

        self.ctx.record(
            AuditRecord::new(ACTION_MONTAGE_CANCELLED, COLLECTION_MONTAGES)
                .by(requestor.unwrap_or(SYSTEM_ACTOR))
                .document(id),
        );
        self.ctx.emit(
            CHANNEL_MONTAGE,
            EVENT_STATUS,
            json!({ "id": id, "status": montage.status }),
        );
        Ok(montage)
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed rejected upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove rejected upload"),
    }
}
