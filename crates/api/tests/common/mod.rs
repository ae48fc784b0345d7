//! Shared harness for API integration tests: the production router over an
//! in-memory store, with scripted media collaborators.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use clipcraftr_api::config::{ServerConfig, StoreBackend};
use clipcraftr_api::notifications::UpdateBridge;
use clipcraftr_api::router::build_app_router;
use clipcraftr_api::state::AppState;
use clipcraftr_api::ws::WsManager;
use clipcraftr_core::ffmpeg::{FfmpegError, VideoInfo};
use clipcraftr_core::limits::ClipLimits;
use clipcraftr_core::media::ClipMetadata;
use clipcraftr_db::models::clip::{Clip, NewClip};
use clipcraftr_db::models::montage::{Montage, MontageOutput};
use clipcraftr_db::models::user::{UpsertUser, User};
use clipcraftr_db::store::{ClipStore, MemoryStore, SharedStore, UserStore};
use clipcraftr_events::{AuditTrail, AuditWriter, EventBus};
use clipcraftr_pipeline::probe::{MediaFetcher, VideoProbe};
use clipcraftr_pipeline::processor::{MediaProcessor, ProcessingError};
use clipcraftr_pipeline::tracker::StepTracker;
use clipcraftr_pipeline::{Dispatcher, PipelineContext, QueueService, SubmissionService, WorkerPool};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub fn sample_metadata() -> ClipMetadata {
    ClipMetadata {
        width: 1920,
        height: 1080,
        fps: 60.0,
        codec: "h264".to_string(),
        bitrate: 4_000_000,
        aspect_ratio: "16:9".to_string(),
    }
}

/// Succeeds immediately for every clip and montage.
pub struct InstantProcessor;

#[async_trait]
impl MediaProcessor for InstantProcessor {
    async fn process_clip(&self, _clip: &Clip) -> Result<ClipMetadata, ProcessingError> {
        Ok(sample_metadata())
    }

    async fn render_montage(
        &self,
        montage: &Montage,
        clips: &[Clip],
        tracker: &mut StepTracker,
    ) -> Result<MontageOutput, ProcessingError> {
        tracker.begin("render").await;
        tracker.complete().await;
        Ok(MontageOutput {
            output_path: format!("/tmp/montage_{}.mp4", montage.id),
            duration: clips.iter().map(|c| c.duration).sum(),
            file_size: Some(2048),
        })
    }
}

/// Reports the same duration for every downloaded file.
pub struct FixedProbe(pub f64);

#[async_trait]
impl VideoProbe for FixedProbe {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, FfmpegError> {
        if !path.exists() {
            return Err(FfmpegError::VideoNotFound(path.display().to_string()));
        }
        Ok(VideoInfo {
            duration: self.0,
            metadata: sample_metadata(),
            format: Some("mp4".to_string()),
        })
    }
}

/// Writes the URL as the file body so each URL hashes differently.
pub struct EchoFetcher;

#[async_trait]
impl MediaFetcher for EchoFetcher {
    async fn fetch(&self, url: &str, dest: &Path, _max_bytes: i64) -> Result<u64, ProcessingError> {
        tokio::fs::write(dest, url.as_bytes()).await?;
        Ok(url.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(upload_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        store_backend: StoreBackend::Memory,
        database_url: None,
        upload_dir: upload_dir.to_path_buf(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub memory: Arc<MemoryStore>,
    /// Not running unless a test starts it, so enqueued jobs stay pending.
    pub pool: Option<WorkerPool>,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// Start dispatching queued jobs.
    pub fn start_workers(&mut self) {
        if let Some(pool) = self.pool.take() {
            tokio::spawn(pool.run(tokio_util::sync::CancellationToken::new()));
        }
    }

    /// A fresh clone of the router for one `oneshot` request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the production router over a [`MemoryStore`], with clips probed at
/// `clip_duration` seconds.
pub fn build_test_app_with(clip_duration: f64) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = test_config(upload_dir.path());

    let memory = Arc::new(MemoryStore::new());
    let store: SharedStore = memory.clone();
    let event_bus = Arc::new(EventBus::default());
    let (audit, audit_rx) = AuditTrail::channel();
    tokio::spawn(AuditWriter::run(store.clone(), audit_rx));

    let ctx = PipelineContext::new(store.clone(), event_bus.clone(), audit);
    let dispatcher = Arc::new(Dispatcher::new(
        ctx.clone(),
        Arc::new(InstantProcessor),
        std::time::Duration::from_secs(5),
    ));
    let (pool, dispatch) = WorkerPool::new(dispatcher, 2);
    let queue = Arc::new(QueueService::new(ctx.clone(), dispatch));
    let submissions = Arc::new(SubmissionService::new(
        ctx,
        queue.clone(),
        Arc::new(EchoFetcher),
        Arc::new(FixedProbe(clip_duration)),
        ClipLimits::default(),
        upload_dir.path(),
    ));

    let ws_manager = Arc::new(WsManager::new());
    tokio::spawn(UpdateBridge::new(ws_manager.clone()).run(event_bus.subscribe()));

    let state = AppState {
        store,
        queue,
        submissions,
        ws_manager,
        event_bus,
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        memory,
        pool: Some(pool),
        upload_dir,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(20.0)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

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

pub async fn ready_clip(store: &MemoryStore, user: &User, name: &str) -> Clip {
    let clip = store
        .insert_clip_checked(
            &NewClip {
                user_id: user.id,
                guild_id: "guild".to_string(),
                channel_id: "channel".to_string(),
                message_id: None,
                original_name: name.to_string(),
                file_name: format!("clipcraftr_{}_{name}", user.id),
                file_url: format!("/uploads/{name}"),
                file_path: format!("/tmp/{name}"),
                file_size: 4096,
                duration: 20.0,
                mime_type: "video/mp4".to_string(),
                metadata: ClipMetadata::default(),
                priority: 0,
                tags: vec![],
                content_hash: Some(format!("hash-{}-{name}", user.id)),
            },
            100,
        )
        .await
        .unwrap();
    store.start_clip_processing(clip.id).await.unwrap();
    store
        .mark_clip_ready(clip.id, &sample_metadata())
        .await
        .unwrap()
        .unwrap()
}

/// A valid `queue` job payload.
pub fn clip_payload(clip_id: i64, owner: &str, priority: i32) -> Value {
    serde_json::json!({
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

/// A valid clip submission body.
pub fn clip_submission(discord_id: &str, name: &str) -> Value {
    serde_json::json!({
        "discordId": discord_id,
        "username": format!("user{discord_id}"),
        "guildId": "guild",
        "channelId": "channel",
        "attachmentUrl": format!("https://cdn.example.com/{name}"),
        "originalName": name,
        "mimeType": "video/mp4",
        "fileSize": 4096,
        "tags": ["Funny"],
    })
}
