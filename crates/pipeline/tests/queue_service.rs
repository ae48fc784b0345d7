//! Queue service: ordering, positions, removal and mission status.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use assert_matches::assert_matches;
use clipcraftr_core::error::CoreError;
use clipcraftr_core::events::{
    CHANNEL_QUEUE, EVENT_ADDED, EVENT_REMOVED, EVENT_STARTED, EVENT_STATUS,
};
use clipcraftr_core::status::{JobStatus, MissionStatus};
use clipcraftr_db::models::job::JobFilter;
use clipcraftr_db::store::JobStore;
use clipcraftr_pipeline::PipelineError;
use common::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Ordering and positions
// ---------------------------------------------------------------------------

// Test: higher priority runs first, ties keep submission order.
#[tokio::test]
async fn queue_orders_by_priority_then_age() {
    let h = harness(FakeProcessor::default());
    let a = h
        .queue
        .enqueue("queue", clip_payload(1, "alice", 0), Some("alice".into()), None)
        .await
        .unwrap();
    let b = h
        .queue
        .enqueue("queue", clip_payload(2, "bob", 5), Some("bob".into()), None)
        .await
        .unwrap();
    let c = h
        .queue
        .enqueue("queue", clip_payload(3, "carol", 0), Some("carol".into()), None)
        .await
        .unwrap();

    let listed = h.queue.list_queue(&JobFilter::default()).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![b.id, a.id, c.id]);

    let position = h.queue.get_position(a.id).await.unwrap();
    assert_eq!(position.position, 2);
    assert_eq!(position.total, 3);
    assert_eq!(position.ahead_count, 1);

    let position = h.queue.get_position(b.id).await.unwrap();
    assert_eq!(position.position, 1);
    assert_eq!(position.ahead_count, 0);
}

// Test: jobs ahead owned by the same user do not count as ahead.
#[tokio::test]
async fn ahead_count_skips_own_jobs() {
    let h = harness(FakeProcessor::default());
    h.queue
        .enqueue("queue", clip_payload(1, "alice", 0), Some("alice".into()), None)
        .await
        .unwrap();
    h.queue
        .enqueue("queue", clip_payload(2, "bob", 0), Some("bob".into()), None)
        .await
        .unwrap();
    let mine = h
        .queue
        .enqueue("queue", clip_payload(3, "alice", 0), Some("alice".into()), None)
        .await
        .unwrap();

    let position = h.queue.get_position(mine.id).await.unwrap();
    assert_eq!(position.position, 3);
    assert_eq!(position.ahead_count, 1);
}

// Test: a job that left the queue has no position.
#[tokio::test]
async fn finished_job_has_no_position() {
    let h = harness(FakeProcessor::default());
    let queued = h
        .queue
        .enqueue("queue", clip_payload(1, "alice", 0), Some("alice".into()), None)
        .await
        .unwrap();
    h.memory
        .mark_processing(queued.id, chrono::Utc::now())
        .await
        .unwrap();
    h.memory.complete_job(queued.id, &json!({})).await.unwrap();

    let err = h.queue.get_position(queued.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::NotFound { entity: "Job", .. }));
}

// Test: listing honors the page size and filters.
#[tokio::test]
async fn list_queue_pages_and_filters() {
    let h = harness(FakeProcessor::default());
    for (i, owner) in ["alice", "bob", "alice"].iter().enumerate() {
        h.queue
            .enqueue("queue", clip_payload(i as i64 + 1, owner, 0), Some(owner.to_string()), None)
            .await
            .unwrap();
    }

    let page = h
        .queue
        .list_queue(&JobFilter {
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    let alice = h
        .queue
        .list_queue(&JobFilter {
            user_id: Some("alice".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(alice.len(), 2);

    let clamped = h
        .queue
        .list_queue(&JobFilter {
            limit: Some(0),
            offset: Some(-5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(clamped.len(), 1);
}

// ---------------------------------------------------------------------------
// Enqueue validation
// ---------------------------------------------------------------------------

// Test: an invalid payload is rejected before anything is stored.
#[tokio::test]
async fn enqueue_rejects_invalid_payload() {
    let h = harness(FakeProcessor::default());

    let err = h
        .queue
        .enqueue("queue", json!({ "clipId": 1 }), None, None)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));

    let err = h
        .queue
        .enqueue("transcode", clip_payload(1, "alice", 0), None, None)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));

    let listed = h.queue.list_queue(&JobFilter::default()).await.unwrap();
    assert!(listed.is_empty());
}

// Test: enqueue publishes the new item with a queue snapshot.
#[tokio::test]
async fn enqueue_publishes_added_event() {
    let h = harness(FakeProcessor::default());
    let mut rx = h.bus.subscribe();

    let queued = h
        .queue
        .enqueue("queue", clip_payload(1, "alice", 3), Some("alice".into()), None)
        .await
        .unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.channel, CHANNEL_QUEUE);
    assert_eq!(event.kind, EVENT_ADDED);
    assert_eq!(event.data["item"]["id"], json!(queued.id));
    assert_eq!(event.data["item"]["priority"], json!(3));
    assert_eq!(event.data["queue"].as_array().unwrap().len(), 1);
}

// Test: with workers running, every job is announced as added, still
// pending, before its dispatch is announced as started.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn added_is_published_before_started() {
    let mut h = harness(FakeProcessor::default());
    let mut rx = h.bus.subscribe();
    let cancel = CancellationToken::new();
    let running = tokio::spawn(h.pool.take().unwrap().run(cancel.clone()));

    let mut ids = Vec::new();
    for i in 0..50 {
        let queued = h
            .queue
            .enqueue("queue", clip_payload(1000 + i, "alice", 0), Some("alice".into()), None)
            .await
            .unwrap();
        ids.push(queued.id);
    }

    let mut added = HashSet::new();
    let mut started = HashSet::new();
    while started.len() < ids.len() {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for queue events")
            .unwrap();
        if event.channel != CHANNEL_QUEUE {
            continue;
        }
        if event.kind == EVENT_ADDED {
            let id = event.data["item"]["id"].as_i64().unwrap();
            let listed = event.data["queue"]
                .as_array()
                .unwrap()
                .iter()
                .find(|item| item["id"] == json!(id))
                .expect("added job missing from its snapshot");
            assert_eq!(listed["status"], json!("pending"));
            added.insert(id);
        } else if event.kind == EVENT_STARTED {
            let id = event.data["jobId"].as_i64().unwrap();
            assert!(added.contains(&id), "job {id} started before it was added");
            started.insert(id);
        }
    }

    cancel.cancel();
    running.await.unwrap();
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

// Test: a pending job can be removed, and the removal is announced.
#[tokio::test]
async fn remove_pending_job() {
    let h = harness(FakeProcessor::default());
    let queued = h
        .queue
        .enqueue("queue", clip_payload(1, "alice", 0), Some("alice".into()), None)
        .await
        .unwrap();
    let mut rx = h.bus.subscribe();

    let removed = h.queue.remove(queued.id, Some("alice")).await.unwrap();
    assert_eq!(removed.id, queued.id);
    assert!(h.memory.find_job(queued.id).await.unwrap().is_none());

    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind, EVENT_REMOVED);
    assert_eq!(event.data["id"], json!(queued.id));
}

// Test: a running job cannot be removed.
#[tokio::test]
async fn remove_processing_job_conflicts() {
    let h = harness(FakeProcessor::default());
    let queued = h
        .queue
        .enqueue("queue", clip_payload(1, "alice", 0), Some("alice".into()), None)
        .await
        .unwrap();
    h.memory
        .mark_processing(queued.id, chrono::Utc::now())
        .await
        .unwrap();

    let err = h.queue.remove(queued.id, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));
    assert_eq!(job(&h.memory, queued.id).await.status, JobStatus::Processing);
}

// Test: removing an unknown job is a not-found error.
#[tokio::test]
async fn remove_missing_job_is_not_found() {
    let h = harness(FakeProcessor::default());
    let err = h.queue.remove(999, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::NotFound { id: 999, .. }));
}

// ---------------------------------------------------------------------------
// Mission status
// ---------------------------------------------------------------------------

// Test: mission status starts idle and changes are announced.
#[tokio::test]
async fn mission_status_round_trip() {
    let h = harness(FakeProcessor::default());
    assert_eq!(h.queue.get_mission_status().await, MissionStatus::default());

    let mut rx = h.bus.subscribe();
    h.queue
        .set_mission_status(MissionStatus::Processing, Some("admin"))
        .await;

    assert_eq!(h.queue.get_mission_status().await, MissionStatus::Processing);
    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind, EVENT_STATUS);
    assert_eq!(event.data["missionStatus"], json!(MissionStatus::Processing));
}
