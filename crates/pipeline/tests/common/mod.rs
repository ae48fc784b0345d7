//! Shared harness for pipeline integration tests: an in-memory store and
//! scripted media collaborators.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clipcraftr_core::ffmpeg::{FfmpegError, VideoInfo};
use clipcraftr_core::media::{ClipMetadata, MontageClip, MontageSettings};
use clipcraftr_core::types::DbId;
use clipcraftr_db::models::clip::{Clip, NewClip};
use clipcraftr_db::models::job::Job;
use clipcraftr_db::models::montage::{Montage, MontageOutput, NewMontage};
use clipcraftr_db::models::user::{UpsertUser, User};
use clipcraftr_db::store::{ClipStore, JobStore, MemoryStore, MontageStore, SharedStore, UserStore};
use clipcraftr_events::{AuditTrail, AuditWriter, EventBus};
use clipcraftr_pipeline::probe::{MediaFetcher, VideoProbe};
use clipcraftr_pipeline::processor::{MediaProcessor, ProcessingError};
use clipcraftr_pipeline::tracker::StepTracker;
use clipcraftr_pipeline::{DispatchHandle, Dispatcher, PipelineContext, QueueService, WorkerPool};
use serde_json::json;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub fn sample_metadata() -> ClipMetadata {
    ClipMetadata {
        width: 1280,
        height: 720,
        fps: 30.0,
        codec: "h264".to_string(),
        bitrate: 2_000_000,
        aspect_ratio: "16:9".to_string(),
    }
}

/// Processor whose outcome and latency are fixed per test.
#[derive(Default)]
pub struct FakeProcessor {
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeProcessor {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    async fn work(&self) -> Result<(), ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(ProcessingError::Download(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaProcessor for FakeProcessor {
    async fn process_clip(&self, _clip: &Clip) -> Result<ClipMetadata, ProcessingError> {
        self.work().await?;
        Ok(sample_metadata())
    }

    async fn render_montage(
        &self,
        montage: &Montage,
        clips: &[Clip],
        tracker: &mut StepTracker,
    ) -> Result<MontageOutput, ProcessingError> {
        tracker.begin("prepare").await;
        tracker.complete().await;
        tracker.begin("render").await;
        if let Err(e) = self.work().await {
            tracker.fail(&e.to_string()).await;
            return Err(e);
        }
        tracker.complete().await;
        Ok(MontageOutput {
            output_path: format!("/tmp/montage_{}.mp4", montage.id),
            duration: clips.iter().map(|c| c.duration).sum(),
            file_size: Some(1024),
        })
    }
}

/// Probe reporting a fixed duration for every file.
pub struct FakeProbe {
    pub duration: f64,
}

#[async_trait]
impl VideoProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, FfmpegError> {
        if !path.exists() {
            return Err(FfmpegError::VideoNotFound(path.display().to_string()));
        }
        Ok(VideoInfo {
            duration: self.duration,
            metadata: sample_metadata(),
            format: Some("mp4".to_string()),
        })
    }
}

/// Fetcher writing the URL itself as the file body, so distinct URLs give
/// distinct content hashes.
#[derive(Default)]
pub struct FakeFetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path, _max_bytes: i64) -> Result<u64, ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, url.as_bytes()).await?;
        Ok(url.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub memory: Arc<MemoryStore>,
    pub ctx: PipelineContext,
    pub bus: Arc<EventBus>,
    pub queue: Arc<QueueService>,
    pub dispatcher: Arc<Dispatcher>,
    pub handle: DispatchHandle,
    /// Not running unless a test starts it.
    pub pool: Option<WorkerPool>,
}

pub fn harness(processor: FakeProcessor) -> Harness {
    harness_with(Arc::new(processor), Duration::from_secs(5), 2)
}

pub fn harness_with(
    processor: Arc<FakeProcessor>,
    timeout: Duration,
    max_concurrent: usize,
) -> Harness {
    let memory = Arc::new(MemoryStore::new());
    let store: SharedStore = memory.clone();
    let bus = Arc::new(EventBus::default());
    let (audit, audit_rx) = AuditTrail::channel();
    tokio::spawn(AuditWriter::run(store.clone(), audit_rx));

    let ctx = PipelineContext::new(store, bus.clone(), audit);
    let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), processor, timeout));
    let (pool, handle) = WorkerPool::new(dispatcher.clone(), max_concurrent);
    let queue = Arc::new(QueueService::new(ctx.clone(), handle.clone()));

    Harness {
        memory,
        ctx,
        bus,
        queue,
        dispatcher,
        handle,
        pool: Some(pool),
    }
}

pub async fn seed_user(store: &MemoryStore, discord_id: &str) -> User {
    store
        .upsert_user(&UpsertUser {
            discord_id: discord_id.to_string(),
            username: format!("user{discord_id}"),
            discriminator: "0".to_string(),
            avatar: None,
        })
        .await
        .unwrap()
}

pub fn new_clip(user_id: DbId, name: &str, duration: f64) -> NewClip {
    NewClip {
        user_id,
        guild_id: "guild".to_string(),
        channel_id: "channel".to_string(),
        message_id: None,
        original_name: name.to_string(),
        file_name: format!("clipcraftr_{user_id}_{name}"),
        file_url: format!("/uploads/{name}"),
        file_path: format!("/tmp/{name}"),
        file_size: 4096,
        duration,
        mime_type: "video/mp4".to_string(),
        metadata: ClipMetadata::default(),
        priority: 0,
        tags: vec![],
        content_hash: Some(format!("hash-{user_id}-{name}")),
    }
}

pub async fn uploaded_clip(store: &MemoryStore, user: &User, name: &str) -> Clip {
    store
        .insert_clip_checked(&new_clip(user.id, name, 20.0), 100)
        .await
        .unwrap()
}

pub async fn ready_clip(store: &MemoryStore, user: &User, name: &str) -> Clip {
    let clip = uploaded_clip(store, user, name).await;
    store.start_clip_processing(clip.id).await.unwrap();
    store
        .mark_clip_ready(clip.id, &sample_metadata())
        .await
        .unwrap()
        .unwrap()
}

pub fn clip_payload(clip_id: DbId, owner: &str, priority: i32) -> serde_json::Value {
    json!({
        "clipId": clip_id,
        "userId": owner,
        "guildId": "guild",
        "channelId": "channel",
        "originalUrl": format!("https://cdn.example.com/{clip_id}.mp4"),
        "filename": format!("{clip_id}.mp4"),
        "fileSize": 4096,
        "duration": 20.0,
        "priority": priority,
    })
}

pub async fn job(store: &MemoryStore, id: DbId) -> Job {
    store.find_job(id).await.unwrap().unwrap()
}

/// A two-clip montage owned by user `200` with its pending render job.
pub async fn queued_montage(h: &Harness) -> (Montage, Job) {
    let user = seed_user(&h.memory, "200").await;
    let first = ready_clip(&h.memory, &user, "one.mp4").await;
    let second = ready_clip(&h.memory, &user, "two.mp4").await;
    let clips = vec![
        MontageClip {
            clip_id: first.id,
            start_time: None,
            end_time: None,
            order: 0,
        },
        MontageClip {
            clip_id: second.id,
            start_time: Some(2.0),
            end_time: Some(8.0),
            order: 1,
        },
    ];
    let montage = h
        .memory
        .insert_montage(&NewMontage {
            user_id: user.id,
            title: "Highlights".to_string(),
            description: None,
            clips: clips.clone(),
            settings: MontageSettings::default(),
            priority: 0,
            duration: 26.0,
        })
        .await
        .unwrap();
    let queued = h
        .queue
        .enqueue(
            "montage",
            json!({
                "montageId": montage.id,
                "userId": "200",
                "guildId": "guild",
                "title": "Highlights",
                "clips": clips,
            }),
            Some("200".into()),
            None,
        )
        .await
        .unwrap();
    (montage, queued)
}
