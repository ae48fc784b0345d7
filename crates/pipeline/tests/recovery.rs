//! Startup recovery and the stuck-job sweeper.

mod common;

use std::time::Duration;

use chrono::Utc;
use clipcraftr_core::status::{ClipStatus, JobStatus, MontageStatus};
use clipcraftr_db::models::job::NewJob;
use clipcraftr_db::store::{ClipStore, JobStore, MontageStore};
use clipcraftr_pipeline::recovery::{recover, RecoveryReport};
use clipcraftr_pipeline::sweeper::{SweepReport, Sweeper, DEADLINE_EXCEEDED};
use common::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;

async fn wait_for_status(h: &Harness, id: i64, status: JobStatus) {
    for _ in 0..200 {
        if job(&h.memory, id).await.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {status}");
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

// Test: a job orphaned in processing is reset and redispatched; terminal
// jobs are left alone.
#[tokio::test]
async fn recovery_resets_orphans_and_redispatches() {
    let mut h = harness(FakeProcessor::default());
    let user = seed_user(&h.memory, "100").await;
    let orphan_clip = uploaded_clip(&h.memory, &user, "orphan.mp4").await;
    let waiting_clip = uploaded_clip(&h.memory, &user, "waiting.mp4").await;

    let orphan = h
        .queue
        .enqueue("queue", clip_payload(orphan_clip.id, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    let waiting = h
        .queue
        .enqueue("queue", clip_payload(waiting_clip.id, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    let finished = h
        .queue
        .enqueue("queue", clip_payload(999, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    h.memory
        .mark_processing(orphan.id, Utc::now() + chrono::Duration::minutes(10))
        .await
        .unwrap();
    h.memory
        .mark_processing(finished.id, Utc::now())
        .await
        .unwrap();
    h.memory.fail_job(finished.id, "earlier failure").await.unwrap();

    let report = recover(&h.ctx, &h.handle).await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            reset: 1,
            redispatched: 2
        }
    );
    assert_eq!(job(&h.memory, orphan.id).await.status, JobStatus::Pending);
    assert_eq!(job(&h.memory, finished.id).await.status, JobStatus::Failed);

    let cancel = CancellationToken::new();
    let pool = h.pool.take().unwrap();
    let running = tokio::spawn(pool.run(cancel.clone()));

    wait_for_status(&h, orphan.id, JobStatus::Completed).await;
    wait_for_status(&h, waiting.id, JobStatus::Completed).await;
    let clip = h.memory.find_clip(orphan_clip.id).await.unwrap().unwrap();
    assert_eq!(clip.status, ClipStatus::Ready);

    cancel.cancel();
    running.await.unwrap();
}

// Test: a second recovery pass over a settled store changes nothing.
#[tokio::test]
async fn recovery_is_idempotent() {
    let h = harness(FakeProcessor::default());
    let user = seed_user(&h.memory, "100").await;
    let clip = uploaded_clip(&h.memory, &user, "a.mp4").await;
    let queued = h
        .queue
        .enqueue("queue", clip_payload(clip.id, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    h.dispatcher.dispatch(queued.id).await;
    let before = job(&h.memory, queued.id).await;

    let first = recover(&h.ctx, &h.handle).await.unwrap();
    let second = recover(&h.ctx, &h.handle).await.unwrap();

    assert_eq!(first, RecoveryReport::default());
    assert_eq!(second, RecoveryReport::default());
    assert_eq!(job(&h.memory, queued.id).await, before);
}

// Test: only clip-processing jobs are recovered.
#[tokio::test]
async fn recovery_skips_montage_jobs() {
    let h = harness(FakeProcessor::default());
    let montage_job = h
        .memory
        .insert_job(&NewJob {
            job_type: "montage".to_string(),
            payload: json!({ "montageId": 1 }),
            priority: 0,
            user_id: None,
            guild_id: None,
        })
        .await
        .unwrap();
    h.memory
        .mark_processing(montage_job.id, Utc::now())
        .await
        .unwrap();

    let report = recover(&h.ctx, &h.handle).await.unwrap();

    assert_eq!(report, RecoveryReport::default());
    assert_eq!(job(&h.memory, montage_job.id).await.status, JobStatus::Processing);
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

fn sweeper(h: &Harness, max_attempts: i32) -> Sweeper {
    Sweeper::new(h.ctx.clone(), h.handle.clone(), Duration::from_secs(60), max_attempts)
}

// Test: an expired job with attempts left goes back to pending.
#[tokio::test]
async fn sweeper_reclaims_expired_job() {
    let h = harness(FakeProcessor::default());
    let queued = h
        .queue
        .enqueue("queue", clip_payload(1, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    h.memory
        .mark_processing(queued.id, Utc::now() - chrono::Duration::minutes(1))
        .await
        .unwrap();

    let report = sweeper(&h, 3).sweep_once(Utc::now()).await.unwrap();

    assert_eq!(report, SweepReport { reclaimed: 1, failed: 0 });
    let reclaimed = job(&h.memory, queued.id).await;
    assert_eq!(reclaimed.status, JobStatus::Pending);
    assert!(reclaimed.deadline_at.is_none());
    assert_eq!(reclaimed.attempts, 1);
}

// Test: a job out of attempts fails and takes its clip down with it.
#[tokio::test]
async fn sweeper_fails_job_out_of_attempts() {
    let h = harness(FakeProcessor::default());
    let user = seed_user(&h.memory, "100").await;
    let clip = uploaded_clip(&h.memory, &user, "a.mp4").await;
    let queued = h
        .queue
        .enqueue("queue", clip_payload(clip.id, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    h.memory
        .mark_processing(queued.id, Utc::now() - chrono::Duration::minutes(1))
        .await
        .unwrap();

    let report = sweeper(&h, 1).sweep_once(Utc::now()).await.unwrap();

    assert_eq!(report, SweepReport { reclaimed: 0, failed: 1 });
    let failed = job(&h.memory, queued.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.result.unwrap()["error"], json!(DEADLINE_EXCEEDED));
    let clip = h.memory.find_clip(clip.id).await.unwrap().unwrap();
    assert_eq!(clip.status, ClipStatus::Error);
}

// Test: a montage whose render job got stuck is rendered again from scratch
// once the sweeper reclaims the job.
#[tokio::test]
async fn sweeper_reclaimed_montage_renders_again() {
    let h = harness(FakeProcessor::default());
    let (montage, queued) = queued_montage(&h).await;
    h.memory
        .mark_processing(queued.id, Utc::now() - chrono::Duration::minutes(1))
        .await
        .unwrap();
    h.memory.start_montage(montage.id).await.unwrap().unwrap();
    h.memory
        .record_montage_progress(montage.id, &[], Some("render"), 40)
        .await
        .unwrap()
        .unwrap();

    let report = sweeper(&h, 3).sweep_once(Utc::now()).await.unwrap();
    assert_eq!(report, SweepReport { reclaimed: 1, failed: 0 });

    h.dispatcher.dispatch(queued.id).await;

    let done = job(&h.memory, queued.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    let montage = h.memory.find_montage(montage.id).await.unwrap().unwrap();
    assert_eq!(montage.status, MontageStatus::Completed);
    assert_eq!(montage.progress, 100);
    assert!(montage.error.is_none());
}

// Test: a stuck montage job out of attempts fails its montage.
#[tokio::test]
async fn sweeper_fails_montage_out_of_attempts() {
    let h = harness(FakeProcessor::default());
    let (montage, queued) = queued_montage(&h).await;
    h.memory
        .mark_processing(queued.id, Utc::now() - chrono::Duration::minutes(1))
        .await
        .unwrap();
    h.memory.start_montage(montage.id).await.unwrap().unwrap();

    let report = sweeper(&h, 1).sweep_once(Utc::now()).await.unwrap();

    assert_eq!(report, SweepReport { reclaimed: 0, failed: 1 });
    let montage = h.memory.find_montage(montage.id).await.unwrap().unwrap();
    assert_eq!(montage.status, MontageStatus::Failed);
    assert_eq!(montage.error.as_deref(), Some(DEADLINE_EXCEEDED));
}

// Test: jobs still inside their deadline are untouched.
#[tokio::test]
async fn sweeper_ignores_live_jobs() {
    let h = harness(FakeProcessor::default());
    let queued = h
        .queue
        .enqueue("queue", clip_payload(1, "100", 0), Some("100".into()), None)
        .await
        .unwrap();
    h.memory
        .mark_processing(queued.id, Utc::now() + chrono::Duration::minutes(5))
        .await
        .unwrap();

    let report = sweeper(&h, 3).sweep_once(Utc::now()).await.unwrap();

    assert_eq!(report, SweepReport::default());
    assert_eq!(job(&h.memory, queued.id).await.status, JobStatus::Processing);
}

// Test: the sweep loop stops on cancellation.
#[tokio::test]
async fn sweeper_loop_stops_on_cancel() {
    let h = harness(FakeProcessor::default());
    let cancel = CancellationToken::new();
    let running = tokio::spawn(sweeper(&h, 3).run(cancel.clone()));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), running)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}
