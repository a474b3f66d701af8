//! Order lifecycle engine
//!
//! Owns the order/order-item state machine. Order-level status changes
//! cascade down to every item; item-level changes cascade back up when all
//! items settle in the same terminal status. Rejecting a delivered order is
//! a saga: the order flips to REJECTED and a fresh table-service request is
//! spawned, both inside one transaction.

use crate::audit::{self, Actor, OrderLogEntry};
use crate::cache::{CacheClass, CacheLayer, keys};
use crate::db::models::{
    Order, OrderCreate, OrderDetail, OrderItem, OrderStatus, Request, RequestStatus,
};
use crate::utils::{AppError, AppResult, now_millis, snowflake_id, validation};

use sqlx::{SqliteConnection, SqlitePool};
use std::time::Instant;

const ORDER_SELECT: &str =
    "SELECT id, table_number, session_id, user_id, status, created_at, updated_at FROM orders";

const ITEM_SELECT: &str = "SELECT id, order_id, menu_item_id, name, quantity, unit_price, status, selected_options, instructions, created_at, updated_at FROM order_item";

/// Outcome of the rejection saga: the rejected order plus the request it
/// spawned, committed together.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderRejection {
    pub order: Order,
    pub request: Request,
}

#[derive(Clone)]
pub struct OrderEngine {
    pool: SqlitePool,
    cache: CacheLayer,
}

impl OrderEngine {
    pub fn new(pool: SqlitePool, cache: CacheLayer) -> Self {
        Self { pool, cache }
    }

    /// Create an order with at least one item. Item prices are snapshots of
    /// what the caller resolved at order time; they are never re-resolved.
    pub async fn create_order(&self, data: OrderCreate, actor: Actor) -> AppResult<OrderDetail> {
        validation::validate_table_number(data.table_number)?;
        if data.items.is_empty() {
            return Err(AppError::validation("order must contain at least one item"));
        }
        for item in &data.items {
            validation::validate_required_text(&item.name, "item name", validation::MAX_NAME_LEN)?;
            validation::validate_optional_text(
                item.instructions.as_deref(),
                "instructions",
                validation::MAX_NOTE_LEN,
            )?;
            if item.quantity < 1 {
                return Err(AppError::validation(format!(
                    "invalid quantity {} for {}",
                    item.quantity, item.name
                )));
            }
            if item.unit_price < 0.0 {
                return Err(AppError::validation(format!(
                    "invalid price {} for {}",
                    item.unit_price, item.name
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let order_id = snowflake_id();
        let now = now_millis();
        sqlx::query(
            "INSERT INTO orders (id, table_number, session_id, user_id, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(order_id)
        .bind(data.table_number)
        .bind(&data.session_id)
        .bind(&data.user_id)
        .bind(OrderStatus::New)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(data.items.len());
        for item in &data.items {
            let selected_options = match &item.selected_options {
                Some(options) => Some(serde_json::to_string(options).map_err(|e| {
                    AppError::validation(format!("invalid selected options: {e}"))
                })?),
                None => None,
            };
            let item_id = snowflake_id();
            sqlx::query(
                "INSERT INTO order_item (id, order_id, menu_item_id, name, quantity, unit_price, status, selected_options, instructions, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            )
            .bind(item_id)
            .bind(order_id)
            .bind(item.menu_item_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(OrderStatus::New)
            .bind(&selected_options)
            .bind(&item.instructions)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: item_id,
                order_id,
                menu_item_id: item.menu_item_id,
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                status: OrderStatus::New,
                selected_options,
                instructions: item.instructions.clone(),
                created_at: now,
                updated_at: now,
            });
        }

        let summary = data
            .items
            .iter()
            .map(|i| format!("{}x {}", i.quantity, i.name))
            .collect::<Vec<_>>()
            .join(", ");
        audit::append_order_log(
            &mut tx,
            order_id,
            actor,
            &format!("order created: {summary}"),
        )
        .await?;

        tx.commit().await?;
        tracing::info!(order_id, table = data.table_number, %actor, "order created");

        Ok(OrderDetail {
            order: Order {
                id: order_id,
                table_number: data.table_number,
                session_id: data.session_id,
                user_id: data.user_id,
                status: OrderStatus::New,
                created_at: now,
                updated_at: now,
            },
            items,
        })
    }

    /// Transition an order. The new status cascades to every item in the
    /// same transaction; items track order-level state by default.
    pub async fn update_order_status(
        &self,
        id: i64,
        new_status: OrderStatus,
        actor: Actor,
    ) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let current = Self::fetch_order(&mut tx, id).await?;

        if current.status == OrderStatus::Paid {
            return Err(AppError::OrderFinalized(id));
        }
        if current.status == new_status {
            // Idempotent re-apply for safe client retries.
            return Ok(current);
        }
        if !actor.is_staff() && new_status != OrderStatus::Cancelled {
            return Err(AppError::forbidden(format!(
                "{actor} may not move an order to {new_status}"
            )));
        }
        if !current.status.can_transition_to(new_status) {
            return Err(AppError::invalid_transition(current.status, new_status));
        }

        let now = now_millis();
        self.apply_order_status(&mut tx, &current, new_status, now)
            .await?;
        audit::append_order_log(
            &mut tx,
            id,
            actor,
            &format!("{} -> {}", current.status, new_status),
        )
        .await?;

        tx.commit().await?;

        self.cache.delete(&keys::order(id)).await;
        tracing::info!(order_id = id, from = %current.status, to = %new_status, %actor, "order status updated");

        let mut updated = current;
        updated.status = new_status;
        updated.updated_at = now;
        Ok(updated)
    }

    /// Set one item's status independently of its siblings. If that leaves
    /// every item of the order sharing the same settled status, the order
    /// auto-advances to match in the same transaction.
    pub async fn update_item_status(
        &self,
        order_id: i64,
        item_id: i64,
        new_status: OrderStatus,
        actor: Actor,
    ) -> AppResult<OrderItem> {
        let mut tx = self.pool.begin().await?;
        let order = Self::fetch_order(&mut tx, order_id).await?;

        if order.status == OrderStatus::Paid {
            return Err(AppError::OrderFinalized(order_id));
        }

        let item: OrderItem =
            sqlx::query_as(&format!("{ITEM_SELECT} WHERE id = ? AND order_id = ?"))
                .bind(item_id)
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("Item {item_id} not found on order {order_id}"))
                })?;

        if item.status == new_status {
            return Ok(item);
        }
        if !actor.is_staff() && new_status != OrderStatus::Cancelled {
            return Err(AppError::forbidden(format!(
                "{actor} may not move an item to {new_status}"
            )));
        }
        if !item.status.can_transition_to(new_status) {
            return Err(AppError::invalid_transition(item.status, new_status));
        }

        let now = now_millis();
        let result = sqlx::query(
            "UPDATE order_item SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(new_status)
        .bind(now)
        .bind(item_id)
        .bind(item.status)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::concurrent_update(format!(
                "item {item_id} changed concurrently"
            )));
        }

        // Cascade up: the order follows once all items settle alike.
        let statuses: Vec<(OrderStatus,)> =
            sqlx::query_as("SELECT status FROM order_item WHERE order_id = ?")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;
        let all_settled = new_status.is_item_terminal()
            && statuses.iter().all(|(s,)| *s == new_status);
        if all_settled && order.status != new_status {
            self.apply_order_status(&mut tx, &order, new_status, now)
                .await?;
            audit::append_order_log(
                &mut tx,
                order_id,
                Actor::System,
                &format!(
                    "{} -> {} (all items {})",
                    order.status, new_status, new_status
                ),
            )
            .await?;
        }

        tx.commit().await?;
        self.cache.delete(&keys::order(order_id)).await;

        let mut updated = item;
        updated.status = new_status;
        updated.updated_at = now;
        Ok(updated)
    }

    /// Edit an item's quantity or kitchen instructions. Only allowed while
    /// the order hasn't reached the kitchen (NEW / ACKNOWLEDGED).
    pub async fn update_item_details(
        &self,
        order_id: i64,
        item_id: i64,
        quantity: Option<i64>,
        instructions: Option<String>,
        actor: Actor,
    ) -> AppResult<OrderItem> {
        if let Some(q) = quantity
            && q < 1
        {
            return Err(AppError::validation(format!("invalid quantity {q}")));
        }
        validation::validate_optional_text(
            instructions.as_deref(),
            "instructions",
            validation::MAX_NOTE_LEN,
        )?;

        let mut tx = self.pool.begin().await?;
        let order = Self::fetch_order(&mut tx, order_id).await?;

        if order.status == OrderStatus::Paid {
            return Err(AppError::OrderFinalized(order_id));
        }
        if !order.status.allows_item_edits() {
            return Err(AppError::OrderLocked(order_id));
        }

        let item: OrderItem =
            sqlx::query_as(&format!("{ITEM_SELECT} WHERE id = ? AND order_id = ?"))
                .bind(item_id)
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("Item {item_id} not found on order {order_id}"))
                })?;

        let now = now_millis();
        sqlx::query(
            "UPDATE order_item SET quantity = COALESCE(?1, quantity), instructions = COALESCE(?2, instructions), updated_at = ?3 WHERE id = ?4",
        )
        .bind(quantity)
        .bind(instructions.as_deref())
        .bind(now)
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        // Quantity changes matter for the kitchen; instruction tweaks don't
        // get their own audit row.
        if let Some(q) = quantity
            && q != item.quantity
        {
            audit::append_order_log(
                &mut tx,
                order_id,
                actor,
                &format!("item {}: quantity {} -> {}", item.name, item.quantity, q),
            )
            .await?;
        }

        tx.commit().await?;
        self.cache.delete(&keys::order(order_id)).await;

        let mut updated = item;
        if let Some(q) = quantity {
            updated.quantity = q;
        }
        if let Some(i) = instructions {
            updated.instructions = Some(i);
        }
        updated.updated_at = now;
        Ok(updated)
    }

    /// Reject a delivered order. One transaction: spawn a new request for
    /// the table (content synthesized from the reason), flip the order to
    /// REJECTED and every item with it. The request must never exist
    /// without the order being rejected, and vice versa.
    pub async fn reject_order(
        &self,
        order_id: i64,
        reason: &str,
        caller_id: &str,
        actor: Actor,
    ) -> AppResult<OrderRejection> {
        validation::validate_required_text(reason, "reason", validation::MAX_NOTE_LEN - 20)?;

        let mut tx = self.pool.begin().await?;
        let order = Self::fetch_order(&mut tx, order_id).await?;

        if order.status == OrderStatus::Paid {
            return Err(AppError::OrderFinalized(order_id));
        }
        if order.status != OrderStatus::Delivered {
            return Err(AppError::invalid_transition(
                order.status,
                OrderStatus::Rejected,
            ));
        }

        let now = now_millis();

        // (a) spawn the follow-up request for the waiter
        let request_id = snowflake_id();
        let content = format!("Order rejected: {reason}");
        sqlx::query(
            "INSERT INTO request (id, table_number, session_id, content, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(request_id)
        .bind(order.table_number)
        .bind(caller_id)
        .bind(&content)
        .bind(RequestStatus::New)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        audit::append_request_log(
            &mut tx,
            request_id,
            actor,
            &format!("request created (order {order_id} rejected)"),
        )
        .await?;

        // (b) + (c) the order and all its items flip to REJECTED
        self.apply_order_status(&mut tx, &order, OrderStatus::Rejected, now)
            .await?;
        audit::append_order_log(
            &mut tx,
            order_id,
            actor,
            &format!(
                "{} -> {} (spawned request {request_id})",
                order.status,
                OrderStatus::Rejected
            ),
        )
        .await?;

        tx.commit().await?;

        self.cache.delete(&keys::order(order_id)).await;
        self.cache
            .delete(&keys::active_requests(order.table_number))
            .await;
        self.cache.delete(keys::ALL_ACTIVE_REQUESTS).await;
        tracing::info!(order_id, request_id, table = order.table_number, %actor, "order rejected");

        let table_number = order.table_number;
        let mut rejected = order;
        rejected.status = OrderStatus::Rejected;
        rejected.updated_at = now;

        Ok(OrderRejection {
            order: rejected,
            request: Request {
                id: request_id,
                table_number,
                session_id: caller_id.to_string(),
                content,
                status: RequestStatus::New,
                created_at: now,
                updated_at: now,
            },
        })
    }

    /// Administrative escape hatch: hard-delete an order. Cascades to items
    /// and log rows. Admin only.
    pub async fn delete_order(&self, id: i64, actor: Actor) -> AppResult<()> {
        if actor != Actor::Admin {
            return Err(AppError::forbidden(format!("{actor} may not delete orders")));
        }

        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Order {id} not found")));
        }

        self.cache.delete(&keys::order(id)).await;
        tracing::warn!(order_id = id, %actor, "order hard-deleted");
        Ok(())
    }

    // ── Read paths (cache-aside) ─────────────────────────────────────

    pub async fn get_order(&self, id: i64) -> AppResult<OrderDetail> {
        let key = keys::order(id);
        if let Some(cached) = self
            .cache
            .get_json::<OrderDetail>(CacheClass::Entity, &key)
            .await
        {
            return Ok(cached);
        }

        let started = Instant::now();
        let order: Order = sqlx::query_as(&format!("{ORDER_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
        let items: Vec<OrderItem> = sqlx::query_as(&format!(
            "{ITEM_SELECT} WHERE order_id = ? ORDER BY created_at, id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        self.cache
            .metrics()
            .observe_query_time_ms(started.elapsed().as_millis() as u64);

        let detail = OrderDetail { order, items };
        self.cache.set_json(CacheClass::Entity, &key, &detail).await;
        Ok(detail)
    }

    /// Ordered audit trail for one order (read-only, for analytics).
    pub async fn list_order_log(&self, order_id: i64) -> AppResult<Vec<OrderLogEntry>> {
        audit::list_order_log(&self.pool, order_id).await
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn fetch_order(conn: &mut SqliteConnection, id: i64) -> AppResult<Order> {
        sqlx::query_as(&format!("{ORDER_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))
    }

    /// Conditional order update plus the item cascade, on the caller's
    /// transaction. Zero affected rows means a concurrent writer won.
    async fn apply_order_status(
        &self,
        tx: &mut SqliteConnection,
        current: &Order,
        new_status: OrderStatus,
        now: i64,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(new_status)
        .bind(now)
        .bind(current.id)
        .bind(current.status)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::concurrent_update(format!(
                "order {} changed concurrently",
                current.id
            )));
        }

        sqlx::query("UPDATE order_item SET status = ?1, updated_at = ?2 WHERE order_id = ?3")
            .bind(new_status)
            .bind(now)
            .bind(current.id)
            .execute(&mut *tx)
            .await?;
        Ok(())
    }
}
