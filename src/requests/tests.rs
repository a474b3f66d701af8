//! Request lifecycle tests

use crate::audit::Actor;
use crate::cache::CacheLayer;
use crate::db::DbService;
use crate::db::models::{RequestCreate, RequestStatus};
use crate::requests::RequestEngine;
use crate::utils::AppError;

use sqlx::SqlitePool;
use std::time::Duration;

async fn setup() -> (RequestEngine, SqlitePool) {
    let db = DbService::in_memory().await.expect("in-memory db");
    let engine = RequestEngine::new(db.pool.clone(), CacheLayer::with_defaults());
    (engine, db.pool)
}

fn new_request(table_number: i64, content: &str) -> RequestCreate {
    RequestCreate {
        table_number,
        session_id: "sess-1".into(),
        content: content.into(),
    }
}

async fn request_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM request")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn log_count(pool: &SqlitePool, request_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM request_log WHERE request_id = ?")
        .bind(request_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn stored_status(pool: &SqlitePool, request_id: i64) -> RequestStatus {
    sqlx::query_scalar("SELECT status FROM request WHERE id = ?")
        .bind(request_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn create_persists_request_with_exactly_one_log_row() {
    let (engine, pool) = setup().await;

    let request = engine
        .create_request(new_request(3, "more water please"), Actor::User)
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::New);
    assert_eq!(request_count(&pool).await, 1);
    assert_eq!(log_count(&pool, request.id).await, 1);

    let log = engine.list_request_log(request.id).await.unwrap();
    assert_eq!(log[0].actor, Actor::User);
    assert_eq!(log[0].action, "request created");
}

#[tokio::test]
async fn create_validates_input() {
    let (engine, pool) = setup().await;

    let too_short = engine
        .create_request(new_request(3, "hi"), Actor::User)
        .await;
    assert!(matches!(too_short, Err(AppError::Validation(_))));

    let too_long = engine
        .create_request(new_request(3, &"x".repeat(501)), Actor::User)
        .await;
    assert!(matches!(too_long, Err(AppError::Validation(_))));

    let bad_table = engine
        .create_request(new_request(0, "more water please"), Actor::User)
        .await;
    assert!(matches!(bad_table, Err(AppError::Validation(_))));

    // Nothing persisted on validation failure.
    assert_eq!(request_count(&pool).await, 0);
}

#[tokio::test]
async fn creation_rolls_back_when_the_log_write_fails() {
    let (engine, pool) = setup().await;

    // Make the audit append fail mid-transaction, after the request INSERT.
    sqlx::query("DROP TABLE request_log")
        .execute(&pool)
        .await
        .unwrap();

    let result = engine
        .create_request(new_request(3, "more water please"), Actor::User)
        .await;
    assert!(matches!(result, Err(AppError::Database(_))));

    // The request INSERT rolled back with the failed log write.
    assert_eq!(request_count(&pool).await, 0);
}

#[tokio::test]
async fn duplicate_guard_blocks_equivalent_payment_requests() {
    let (engine, pool) = setup().await;

    let first = engine
        .create_request(new_request(5, "ready to pay"), Actor::User)
        .await
        .unwrap();

    // Case-insensitive equivalence on the same table is refused...
    let dup = engine
        .create_request(new_request(5, "Ready To Pay"), Actor::User)
        .await;
    match dup {
        Err(AppError::DuplicateActiveRequest(existing)) => assert_eq!(existing, first.id),
        other => panic!("expected DuplicateActiveRequest, got {other:?}"),
    }
    assert_eq!(request_count(&pool).await, 1);

    // ...but another table may ask for its bill,
    engine
        .create_request(new_request(6, "ready to pay"), Actor::User)
        .await
        .unwrap();

    // and non-payment content repeats freely.
    engine
        .create_request(new_request(5, "more napkins please"), Actor::User)
        .await
        .unwrap();

    // Once the original reaches a terminal state the guard releases.
    engine
        .update_request_status(first.id, RequestStatus::InProgress, None, Actor::Waiter)
        .await
        .unwrap();
    engine
        .update_request_status(first.id, RequestStatus::Done, None, Actor::Waiter)
        .await
        .unwrap();
    engine
        .create_request(new_request(5, "ready to pay"), Actor::User)
        .await
        .unwrap();
}

#[tokio::test]
async fn transition_closure_covers_every_pair() {
    let (engine, pool) = setup().await;

    let request = engine
        .create_request(new_request(2, "song is too loud"), Actor::User)
        .await
        .unwrap();

    for from in RequestStatus::ALL {
        for to in RequestStatus::ALL {
            if from == to {
                continue; // idempotent no-op, covered separately
            }
            sqlx::query("UPDATE request SET status = ? WHERE id = ?")
                .bind(from)
                .bind(request.id)
                .execute(&pool)
                .await
                .unwrap();

            let result = engine
                .update_request_status(request.id, to, None, Actor::Waiter)
                .await;

            if from.can_transition_to(to) {
                assert_eq!(result.unwrap().status, to, "{from} -> {to} should succeed");
            } else {
                match result {
                    Err(AppError::InvalidTransition { .. }) => {}
                    other => panic!("{from} -> {to} should fail, got {other:?}"),
                }
                // The stored status is untouched by the refused attempt.
                assert_eq!(stored_status(&pool, request.id).await, from);
            }
        }
    }
}

#[tokio::test]
async fn idempotent_reapply_appends_no_log_row() {
    let (engine, pool) = setup().await;

    let request = engine
        .create_request(new_request(4, "could we order dessert?"), Actor::User)
        .await
        .unwrap();
    engine
        .update_request_status(request.id, RequestStatus::Acknowledged, None, Actor::Waiter)
        .await
        .unwrap();
    assert_eq!(log_count(&pool, request.id).await, 2);

    // Retry after network ambiguity: same target, no-op success.
    let retried = engine
        .update_request_status(request.id, RequestStatus::Acknowledged, None, Actor::Waiter)
        .await
        .unwrap();
    assert_eq!(retried.status, RequestStatus::Acknowledged);
    assert_eq!(log_count(&pool, request.id).await, 2);
}

#[tokio::test]
async fn content_edits_are_windowed_and_unlogged() {
    let (engine, pool) = setup().await;

    let request = engine
        .create_request(new_request(4, "two more chairs"), Actor::User)
        .await
        .unwrap();

    // Content-only edit while NEW: allowed, no audit row.
    let edited = engine
        .update_request_status(
            request.id,
            RequestStatus::New,
            Some("three more chairs".into()),
            Actor::User,
        )
        .await
        .unwrap();
    assert_eq!(edited.content, "three more chairs");
    assert_eq!(log_count(&pool, request.id).await, 1);

    // Once picked up, content is frozen.
    engine
        .update_request_status(request.id, RequestStatus::InProgress, None, Actor::Waiter)
        .await
        .unwrap();
    let frozen = engine
        .update_request_status(
            request.id,
            RequestStatus::InProgress,
            Some("four chairs actually".into()),
            Actor::User,
        )
        .await;
    assert!(matches!(frozen, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn users_may_only_cancel() {
    let (engine, _pool) = setup().await;

    let request = engine
        .create_request(new_request(7, "where is our food?"), Actor::User)
        .await
        .unwrap();

    let denied = engine
        .update_request_status(request.id, RequestStatus::Acknowledged, None, Actor::User)
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let cancelled = engine
        .update_request_status(request.id, RequestStatus::Cancelled, None, Actor::User)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
}

#[tokio::test]
async fn racing_updates_cannot_both_apply() {
    let (engine, pool) = setup().await;

    let request = engine
        .create_request(new_request(8, "ready to pay"), Actor::User)
        .await
        .unwrap();

    // One writer targets a valid next state, the other a state that is only
    // valid against stale pre-transition state.
    let (ack, done) = tokio::join!(
        engine.update_request_status(request.id, RequestStatus::Acknowledged, None, Actor::Waiter),
        engine.update_request_status(request.id, RequestStatus::Done, None, Actor::Waiter),
    );

    assert!(ack.is_ok());
    match done {
        Err(AppError::InvalidTransition { .. }) | Err(AppError::ConcurrentUpdate(_)) => {}
        other => panic!("second writer must not apply, got {other:?}"),
    }
    assert_eq!(stored_status(&pool, request.id).await, RequestStatus::Acknowledged);
}

#[tokio::test]
async fn cache_never_serves_pre_mutation_state() {
    let (engine, _pool) = setup().await;

    let request = engine
        .create_request(new_request(9, "extra plates please"), Actor::User)
        .await
        .unwrap();

    // Prime both the entity cache and the list caches.
    assert_eq!(
        engine.get_request(request.id).await.unwrap().status,
        RequestStatus::New
    );
    assert_eq!(engine.list_active_requests(9).await.unwrap().len(), 1);
    assert_eq!(engine.list_all_active_requests().await.unwrap().len(), 1);

    engine
        .update_request_status(request.id, RequestStatus::Cancelled, None, Actor::Waiter)
        .await
        .unwrap();

    // Post-commit reads see post-mutation state.
    assert_eq!(
        engine.get_request(request.id).await.unwrap().status,
        RequestStatus::Cancelled
    );
    assert!(engine.list_active_requests(9).await.unwrap().is_empty());
    assert!(engine.list_all_active_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_requests_surface_not_found() {
    let (engine, _pool) = setup().await;

    assert!(matches!(
        engine.get_request(42).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine
            .update_request_status(42, RequestStatus::Cancelled, None, Actor::Waiter)
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn admin_delete_cascades_to_log_rows() {
    let (engine, pool) = setup().await;

    let request = engine
        .create_request(new_request(2, "wobbly table"), Actor::User)
        .await
        .unwrap();

    let denied = engine.delete_request(request.id, Actor::Waiter).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    engine.delete_request(request.id, Actor::Admin).await.unwrap();
    assert_eq!(request_count(&pool).await, 0);
    assert_eq!(log_count(&pool, request.id).await, 0);

    // A second delete of the same id (the losing side of a race) reports
    // NotFound instead of silently succeeding.
    assert!(matches!(
        engine.delete_request(request.id, Actor::Admin).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn log_carries_actor_sequence_for_analytics() {
    let (engine, _pool) = setup().await;

    let request = engine
        .create_request(new_request(1, "ready to pay"), Actor::User)
        .await
        .unwrap();
    // Keep timestamps distinct so ordering is deterministic.
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine
        .update_request_status(request.id, RequestStatus::Acknowledged, None, Actor::Waiter)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine
        .update_request_status(request.id, RequestStatus::InProgress, None, Actor::Waiter)
        .await
        .unwrap();

    let log = engine.list_request_log(request.id).await.unwrap();
    let actors: Vec<Actor> = log.iter().map(|e| e.actor).collect();
    assert_eq!(actors, vec![Actor::User, Actor::Waiter, Actor::Waiter]);
    // First USER row to first WAITER row is the time-to-first-response.
    assert!(log[1].created_at > log[0].created_at);
    assert_eq!(log[1].action, "NEW -> ACKNOWLEDGED");
}
