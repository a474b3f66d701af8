//! Audit log persistence
//!
//! Appends take `&mut SqliteConnection` so the log row always joins the
//! caller's transaction: either the state change and its row both commit,
//! or neither does. There is deliberately no update or delete API.

use super::types::{Actor, OrderLogEntry, RequestLogEntry};
use crate::utils::{AppResult, now_millis, snowflake_id};
use sqlx::{SqliteConnection, SqlitePool};

/// Append one request log row on the caller's transaction.
pub async fn append_request_log(
    conn: &mut SqliteConnection,
    request_id: i64,
    actor: Actor,
    action: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO request_log (id, request_id, actor, action, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(snowflake_id())
    .bind(request_id)
    .bind(actor)
    .bind(action)
    .bind(now_millis())
    .execute(conn)
    .await?;
    Ok(())
}

/// Append one order log row on the caller's transaction.
pub async fn append_order_log(
    conn: &mut SqliteConnection,
    order_id: i64,
    actor: Actor,
    action: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO order_log (id, order_id, actor, action, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(snowflake_id())
    .bind(order_id)
    .bind(actor)
    .bind(action)
    .bind(now_millis())
    .execute(conn)
    .await?;
    Ok(())
}

/// Ordered, append-only sequence of log rows for one request.
pub async fn list_request_log(
    pool: &SqlitePool,
    request_id: i64,
) -> AppResult<Vec<RequestLogEntry>> {
    let rows = sqlx::query_as::<_, RequestLogEntry>(
        "SELECT id, request_id, actor, action, created_at FROM request_log WHERE request_id = ? ORDER BY created_at, id",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Ordered, append-only sequence of log rows for one order.
pub async fn list_order_log(pool: &SqlitePool, order_id: i64) -> AppResult<Vec<OrderLogEntry>> {
    let rows = sqlx::query_as::<_, OrderLogEntry>(
        "SELECT id, order_id, actor, action, created_at FROM order_log WHERE order_id = ? ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
