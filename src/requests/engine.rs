//! Request lifecycle engine
//!
//! Owns the request state machine. Every mutation is one transaction:
//! validate against the row read inside that transaction, apply the
//! change with a conditional update, append the audit row, commit. The
//! affected-row count of the conditional update is what closes the
//! check-then-act race — see [`update_request_status`](RequestEngine::update_request_status).

use crate::audit::{self, Actor, RequestLogEntry};
use crate::cache::{CacheClass, CacheLayer, keys};
use crate::db::models::{Request, RequestCreate, RequestStatus};
use crate::utils::{AppError, AppResult, now_millis, snowflake_id, validation};

use super::duplicate_guard;

use sqlx::SqlitePool;
use std::time::Instant;

const REQUEST_SELECT: &str =
    "SELECT id, table_number, session_id, content, status, created_at, updated_at FROM request";

/// Statuses a request can hold while still needing attention.
const ACTIVE_STATUSES: &str = "('NEW', 'ACKNOWLEDGED', 'IN_PROGRESS', 'ON_HOLD')";

#[derive(Clone)]
pub struct RequestEngine {
    pool: SqlitePool,
    cache: CacheLayer,
}

impl RequestEngine {
    pub fn new(pool: SqlitePool, cache: CacheLayer) -> Self {
        Self { pool, cache }
    }

    /// Create a new request in status NEW.
    ///
    /// The duplicate guard, the insert and the audit row share one
    /// transaction; a [`AppError::DuplicateActiveRequest`] means the caller
    /// should re-signal the existing request instead.
    pub async fn create_request(&self, data: RequestCreate, actor: Actor) -> AppResult<Request> {
        validation::validate_table_number(data.table_number)?;
        validation::validate_content(&data.content)?;

        let mut tx = self.pool.begin().await?;

        if let Some(existing_id) =
            duplicate_guard::find_active_duplicate(&mut tx, data.table_number, &data.content)
                .await?
        {
            tracing::debug!(
                table = data.table_number,
                existing_id,
                "duplicate active request refused"
            );
            return Err(AppError::DuplicateActiveRequest(existing_id));
        }

        let id = snowflake_id();
        let now = now_millis();
        sqlx::query(
            "INSERT INTO request (id, table_number, session_id, content, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(id)
        .bind(data.table_number)
        .bind(&data.session_id)
        .bind(&data.content)
        .bind(RequestStatus::New)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        audit::append_request_log(&mut tx, id, actor, "request created").await?;
        tx.commit().await?;

        self.invalidate_lists(data.table_number).await;
        tracing::info!(request_id = id, table = data.table_number, %actor, "request created");

        Ok(Request {
            id,
            table_number: data.table_number,
            session_id: data.session_id,
            content: data.content,
            status: RequestStatus::New,
            created_at: now,
            updated_at: now,
        })
    }

    /// Transition a request, optionally editing its content.
    ///
    /// Re-applying the current status is an idempotent no-op success (safe
    /// client retries after network ambiguity). A content-only edit writes
    /// no audit row and is permitted only while the request is NEW or
    /// ON_HOLD.
    pub async fn update_request_status(
        &self,
        id: i64,
        new_status: RequestStatus,
        content: Option<String>,
        actor: Actor,
    ) -> AppResult<Request> {
        let mut tx = self.pool.begin().await?;

        // The row is read inside the transaction that writes it; validating
        // against state read earlier would leave a race window.
        let current: Request = sqlx::query_as(&format!("{REQUEST_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Request {id} not found")))?;

        let status_changed = current.status != new_status;
        if !status_changed && content.is_none() {
            return Ok(current);
        }

        if status_changed {
            if !actor.is_staff() && new_status != RequestStatus::Cancelled {
                return Err(AppError::forbidden(format!(
                    "{actor} may not move a request to {new_status}"
                )));
            }
            if !current.status.can_transition_to(new_status) {
                return Err(AppError::invalid_transition(current.status, new_status));
            }
        }

        if let Some(new_content) = &content {
            if !current.status.allows_content_edit() {
                return Err(AppError::validation(format!(
                    "content can only be edited while NEW or ON_HOLD, request is {}",
                    current.status
                )));
            }
            validation::validate_content(new_content)?;
        }

        let now = now_millis();
        let result = sqlx::query(
            "UPDATE request SET status = ?1, content = COALESCE(?2, content), updated_at = ?3 WHERE id = ?4 AND status = ?5",
        )
        .bind(new_status)
        .bind(content.as_deref())
        .bind(now)
        .bind(id)
        .bind(current.status)
        .execute(&mut *tx)
        .await?;

        // Zero rows here means another writer committed between our read and
        // this write; surface it as a distinct retryable condition.
        if result.rows_affected() == 0 {
            return Err(AppError::concurrent_update(format!(
                "request {id} changed concurrently"
            )));
        }

        if status_changed {
            let action = format!("{} -> {}", current.status, new_status);
            audit::append_request_log(&mut tx, id, actor, &action).await?;
        }

        tx.commit().await?;

        self.invalidate_request(id, current.table_number).await;
        if status_changed {
            tracing::info!(
                request_id = id,
                from = %current.status,
                to = %new_status,
                %actor,
                "request status updated"
            );
        }

        let mut updated = current;
        updated.status = new_status;
        if let Some(new_content) = content {
            updated.content = new_content;
        }
        updated.updated_at = now;
        Ok(updated)
    }

    /// Administrative escape hatch: hard-delete a request. Cascades to its
    /// log rows. Admin only.
    pub async fn delete_request(&self, id: i64, actor: Actor) -> AppResult<()> {
        if actor != Actor::Admin {
            return Err(AppError::forbidden(format!(
                "{actor} may not delete requests"
            )));
        }

        // Single statement so a concurrent delete cannot slip between an
        // existence check and the delete itself.
        let row: Option<(i64,)> =
            sqlx::query_as("DELETE FROM request WHERE id = ? RETURNING table_number")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let (table_number,) =
            row.ok_or_else(|| AppError::not_found(format!("Request {id} not found")))?;

        self.invalidate_request(id, table_number).await;
        tracing::warn!(request_id = id, %actor, "request hard-deleted");
        Ok(())
    }

    // ── Read paths (cache-aside) ─────────────────────────────────────

    pub async fn get_request(&self, id: i64) -> AppResult<Request> {
        let key = keys::request(id);
        if let Some(cached) = self.cache.get_json::<Request>(CacheClass::Entity, &key).await {
            return Ok(cached);
        }

        let started = Instant::now();
        let request: Request = sqlx::query_as(&format!("{REQUEST_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Request {id} not found")))?;
        self.observe_query(started);

        self.cache.set_json(CacheClass::Entity, &key, &request).await;
        Ok(request)
    }

    /// Active (non-terminal) requests for one table.
    pub async fn list_active_requests(&self, table_number: i64) -> AppResult<Vec<Request>> {
        let key = keys::active_requests(table_number);
        if let Some(cached) = self
            .cache
            .get_json::<Vec<Request>>(CacheClass::ActiveList, &key)
            .await
        {
            return Ok(cached);
        }

        let started = Instant::now();
        let requests: Vec<Request> = sqlx::query_as(&format!(
            "{REQUEST_SELECT} WHERE table_number = ? AND status IN {ACTIVE_STATUSES} ORDER BY created_at"
        ))
        .bind(table_number)
        .fetch_all(&self.pool)
        .await?;
        self.observe_query(started);

        self.cache
            .set_json(CacheClass::ActiveList, &key, &requests)
            .await;
        Ok(requests)
    }

    /// Active requests across all tables.
    pub async fn list_all_active_requests(&self) -> AppResult<Vec<Request>> {
        if let Some(cached) = self
            .cache
            .get_json::<Vec<Request>>(CacheClass::AllActive, keys::ALL_ACTIVE_REQUESTS)
            .await
        {
            return Ok(cached);
        }

        let started = Instant::now();
        let requests: Vec<Request> = sqlx::query_as(&format!(
            "{REQUEST_SELECT} WHERE status IN {ACTIVE_STATUSES} ORDER BY table_number, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.observe_query(started);

        self.cache
            .set_json(CacheClass::AllActive, keys::ALL_ACTIVE_REQUESTS, &requests)
            .await;
        Ok(requests)
    }

    /// Ordered audit trail for one request (read-only, for analytics).
    pub async fn list_request_log(&self, request_id: i64) -> AppResult<Vec<RequestLogEntry>> {
        audit::list_request_log(&self.pool, request_id).await
    }

    // ── Cache invalidation ───────────────────────────────────────────

    async fn invalidate_request(&self, id: i64, table_number: i64) {
        self.cache.delete(&keys::request(id)).await;
        self.invalidate_lists(table_number).await;
    }

    async fn invalidate_lists(&self, table_number: i64) {
        self.cache.delete(&keys::active_requests(table_number)).await;
        self.cache.delete(keys::ALL_ACTIVE_REQUESTS).await;
    }

    fn observe_query(&self, started: Instant) {
        self.cache
            .metrics()
            .observe_query_time_ms(started.elapsed().as_millis() as u64);
    }
}
