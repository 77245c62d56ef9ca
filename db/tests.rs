//! Gateway integration tests. Grounded on
//! `Wolftown-io-canis/server/src/db/tests.rs`'s `#[sqlx::test]` pattern: each
//! test gets a freshly migrated, throwaway database, provisioned and torn
//! down by the `sqlx::test` macro.

use crate::{Gateway, JobOutcome, PersistedEvent};
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_test_with_attempt(pool: &PgPool, questions: u32) -> Uuid {
    let test_id: Uuid = sqlx::query_scalar(r#"INSERT INTO "Test" (title) VALUES ($1) RETURNING id"#)
        .bind("seed test")
        .fetch_one(pool)
        .await
        .unwrap();
    for _ in 0..questions {
        sqlx::query(r#"INSERT INTO "Question" ("testId") VALUES ($1)"#)
            .bind(test_id)
            .execute(pool)
            .await
            .unwrap();
    }
    let attempt_id: Uuid = sqlx::query_scalar(
        r#"INSERT INTO "TestAttempt" ("testId", "startedAt", "completedAt")
           VALUES ($1, now() - interval '60 minutes', now()) RETURNING id"#,
    )
    .bind(test_id)
    .fetch_one(pool)
    .await
    .unwrap();
    attempt_id
}

#[sqlx::test]
async fn resolve_private_attempt_context(pool: PgPool) {
    let attempt_id = seed_test_with_attempt(&pool, 20).await;
    let gw = Gateway::new(pool);
    let resolved = gw.resolve_test_context(attempt_id).await.unwrap();
    assert!(!resolved.attempt.is_public());
    assert_eq!(resolved.context.total_questions, 20);
    assert!((resolved.context.duration_minutes - 60.0).abs() < 1.0);
}

#[sqlx::test]
async fn resolve_missing_attempt_is_not_found(pool: PgPool) {
    let gw = Gateway::new(pool);
    let err = gw.resolve_test_context(Uuid::now_v7()).await.unwrap_err();
    assert_eq!(err.kind(), base::ErrorKind::NotFound);
}

#[sqlx::test]
async fn claim_next_job_is_exclusive(pool: PgPool) {
    let attempt_id = seed_test_with_attempt(&pool, 10).await;
    let asset_id: Uuid = sqlx::query_scalar(
        r#"INSERT INTO "ProctorAsset" ("attemptId", kind, data) VALUES ($1, 'recording', $2) RETURNING id"#,
    )
    .bind(attempt_id)
    .bind(vec![0u8, 1, 2])
    .fetch_one(&pool)
    .await
    .unwrap();
    let payload = serde_json::json!({"assetId": asset_id, "attemptId": attempt_id});
    sqlx::query(r#"INSERT INTO "job" (name, state, data) VALUES ('proctor.analyse', 'created', $1)"#)
        .bind(&payload)
        .execute(&pool)
        .await
        .unwrap();

    let gw = Gateway::new(pool.clone());
    let (a, b) = tokio::join!(gw.claim_next_job(), gw.claim_next_job());
    let claimed: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();
    // Only one of the two concurrent claims may see the single queued row.
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].payload.attempt_id, attempt_id);
    assert_eq!(claimed[0].retry_count, 1);
}

#[sqlx::test]
async fn settle_job_sets_state(pool: PgPool) {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO "job" (name, state, data) VALUES ('proctor.analyse', 'active', '{}') RETURNING id"#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let gw = Gateway::new(pool.clone());
    gw.settle_job(id, JobOutcome::Failed).await.unwrap();
    let state: String = sqlx::query_scalar(r#"SELECT state FROM "job" WHERE id = $1"#)
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(state, "failed");
}

#[sqlx::test]
async fn insert_events_uses_attempt_start_as_base(pool: PgPool) {
    let attempt_id = seed_test_with_attempt(&pool, 10).await;
    let gw = Gateway::new(pool.clone());
    let resolved = gw.resolve_test_context(attempt_id).await.unwrap();
    let events = vec![PersistedEvent {
        kind: "LOOK_AWAY".to_string(),
        timestamp_secs: 5.0,
        extra: serde_json::json!({"yaw": 35.0}),
    }];
    gw.insert_events(&resolved.attempt, &events).await.unwrap();

    let (ts, started_at): (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) =
        sqlx::query_as(
            r#"SELECT e.ts, a."startedAt" FROM "ProctorEvent" e
               JOIN "TestAttempt" a ON a.id = e."attemptId"
               WHERE e."attemptId" = $1"#,
        )
        .bind(attempt_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let delta = (ts - started_at).num_milliseconds();
    assert_eq!(delta, 5000);
}

#[sqlx::test]
async fn write_risk_updates_private_attempt(pool: PgPool) {
    let attempt_id = seed_test_with_attempt(&pool, 10).await;
    let gw = Gateway::new(pool.clone());
    let resolved = gw.resolve_test_context(attempt_id).await.unwrap();
    let breakdown = serde_json::json!({"total_score": 42.0});
    gw.write_risk(&resolved.attempt, 42.0, &breakdown)
        .await
        .unwrap();
    let score: f64 = sqlx::query_scalar(r#"SELECT "riskScore" FROM "TestAttempt" WHERE id = $1"#)
        .bind(attempt_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(score, 42.0);
}
