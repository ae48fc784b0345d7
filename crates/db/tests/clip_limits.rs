//! Integration tests for clip submission checks and montage transitions.
//!
//! Requires `DATABASE_URL`; run with `cargo test -- --ignored`.

use assert_matches::assert_matches;
use clipcraftr_core::error::CoreError;
use clipcraftr_core::media::{ClipMetadata, MontageSettings};
use clipcraftr_core::status::{ClipStatus, MontageStatus};
use clipcraftr_db::models::clip::{ClipFilter, NewClip};
use clipcraftr_db::models::montage::{MontageOutput, NewMontage};
use clipcraftr_db::models::user::{UpsertUser, UserLimits};
use clipcraftr_db::repositories::{ClipRepo, MontageRepo, UserRepo};
use clipcraftr_db::StoreError;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, discord_id: &str) -> i64 {
    let user = UserRepo::upsert(
        pool,
        &UpsertUser {
            discord_id: discord_id.to_string(),
            username: "tester".to_string(),
            discriminator: "0".to_string(),
            avatar: None,
        },
    )
    .await
    .unwrap();
    user.id
}

fn new_clip(user_id: i64, name: &str, hash: &str) -> NewClip {
    NewClip {
        user_id,
        guild_id: "guild".to_string(),
        channel_id: "channel".to_string(),
        message_id: None,
        original_name: name.to_string(),
        file_name: format!("clipcraftr_{user_id}_{name}"),
        file_url: format!("/uploads/{name}"),
        file_path: format!("/tmp/{name}"),
        file_size: 2048,
        duration: 12.5,
        mime_type: "video/mp4".to_string(),
        metadata: ClipMetadata::default(),
        priority: 0,
        tags: vec!["gg".to_string()],
        content_hash: Some(hash.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Test: queue limit is enforced per owner
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_queue_limit_rejects_excess(pool: PgPool) {
    let owner = seed_user(&pool, "100").await;
    ClipRepo::create_checked(&pool, &new_clip(owner, "a.mp4", "h1"), 1)
        .await
        .unwrap();

    let err = ClipRepo::create_checked(&pool, &new_clip(owner, "b.mp4", "h2"), 1)
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Rejected(CoreError::Conflict(_)));
    assert_eq!(ClipRepo::count_active(&pool, owner).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: concurrent submissions at the boundary admit exactly one
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_concurrent_submissions_respect_limit(pool: PgPool) {
    let owner = seed_user(&pool, "101").await;

    let first = new_clip(owner, "a.mp4", "h1");
    let second = new_clip(owner, "b.mp4", "h2");
    let (r1, r2) = tokio::join!(
        ClipRepo::create_checked(&pool, &first, 1),
        ClipRepo::create_checked(&pool, &second, 1),
    );

    assert_eq!(u8::from(r1.is_ok()) + u8::from(r2.is_ok()), 1);
    assert_eq!(ClipRepo::count_active(&pool, owner).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: duplicate content is rejected until the original is deleted
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_duplicate_content_rejected(pool: PgPool) {
    let owner = seed_user(&pool, "102").await;
    let clip = ClipRepo::create_checked(&pool, &new_clip(owner, "a.mp4", "same"), 10)
        .await
        .unwrap();

    let err = ClipRepo::create_checked(&pool, &new_clip(owner, "b.mp4", "same"), 10)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already been submitted"));

    let deleted = ClipRepo::soft_delete(&pool, clip.id).await.unwrap().unwrap();
    assert_eq!(deleted.status, ClipStatus::Deleted);
    ClipRepo::create_checked(&pool, &new_clip(owner, "c.mp4", "same"), 10)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: custom limits are persisted
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_set_limits(pool: PgPool) {
    let owner = seed_user(&pool, "103").await;
    let limits = UserLimits {
        queue_limit: 3,
        max_clip_duration: 60,
        max_montage_duration: 120,
    };
    let user = UserRepo::set_limits(&pool, owner, &limits).await.unwrap().unwrap();
    assert_eq!(user.queue_limit, 3);
    assert_eq!(user.max_clip_duration, 60);
}

// ---------------------------------------------------------------------------
// Test: montage progress stays below 100 until completion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_montage_lifecycle(pool: PgPool) {
    let owner = seed_user(&pool, "104").await;
    let montage = MontageRepo::create(
        &pool,
        &NewMontage {
            user_id: owner,
            title: "Highlights".to_string(),
            description: None,
            clips: vec![],
            settings: MontageSettings::default(),
            priority: 0,
            duration: 30.0,
        },
    )
    .await
    .unwrap();
    assert_eq!(montage.status, MontageStatus::Queued);

    MontageRepo::start(&pool, montage.id).await.unwrap().unwrap();
    let progressed = MontageRepo::record_progress(&pool, montage.id, &[], Some("render"), 100)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progressed.progress, 99);

    let restarted = MontageRepo::start(&pool, montage.id).await.unwrap().unwrap();
    assert_eq!(restarted.status, MontageStatus::Processing);
    assert_eq!(restarted.progress, 0);
    assert_eq!(restarted.current_step, None);

    let output = MontageOutput {
        output_path: "/out/1.mp4".to_string(),
        duration: 30.0,
        file_size: Some(4096),
    };
    let done = MontageRepo::complete(&pool, montage.id, &output).await.unwrap().unwrap();
    assert_eq!(done.status, MontageStatus::Completed);
    assert_eq!(done.progress, 100);

    assert!(MontageRepo::cancel(&pool, montage.id).await.unwrap().is_none());
    assert!(MontageRepo::start(&pool, montage.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: clip listing filters by owner, hides deleted clips and pages
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_clip_listing(pool: PgPool) {
    let owner = seed_user(&pool, "105").await;
    let other = seed_user(&pool, "106").await;
    let a = ClipRepo::create_checked(&pool, &new_clip(owner, "a.mp4", "la"), 10).await.unwrap();
    let b = ClipRepo::create_checked(&pool, &new_clip(owner, "b.mp4", "lb"), 10).await.unwrap();
    ClipRepo::create_checked(&pool, &new_clip(other, "c.mp4", "lc"), 10).await.unwrap();
    ClipRepo::soft_delete(&pool, a.id).await.unwrap().unwrap();

    let owned = ClipFilter {
        user_id: Some(owner),
        limit: Some(10),
        ..Default::default()
    };
    let listed = ClipRepo::list(&pool, &owned).await.unwrap();
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id]);

    let deleted = ClipFilter {
        status: Some(ClipStatus::Deleted),
        ..owned
    };
    let listed = ClipRepo::list(&pool, &deleted).await.unwrap();
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a.id]);

    let everyone = ClipFilter {
        limit: Some(1),
        ..Default::default()
    };
    assert_eq!(ClipRepo::list(&pool, &everyone).await.unwrap().len(), 1);
}
