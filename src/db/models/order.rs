//! Order and order-item entities and their state machine

use serde::{Deserialize, Serialize};

/// Order lifecycle states, shared by order rows and item rows.
///
/// Progression is forward-only: NEW < ACKNOWLEDGED < IN_PROGRESS <
/// COMPLETED < DELIVERED < PAID. CANCELLED is reachable from any
/// non-terminal state; REJECTED is reachable only through the rejection
/// saga on a DELIVERED order. PAID, CANCELLED and REJECTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Acknowledged,
    InProgress,
    Completed,
    Delivered,
    Paid,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::New,
        OrderStatus::Acknowledged,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
    ];

    /// Position in the forward progression. Terminal side-exits carry no rank.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::New => Some(0),
            OrderStatus::Acknowledged => Some(1),
            OrderStatus::InProgress => Some(2),
            OrderStatus::Completed => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Paid => Some(5),
            OrderStatus::Cancelled | OrderStatus::Rejected => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            // Only the rejection saga may reject an order.
            OrderStatus::Rejected => false,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    /// Item detail edits are allowed only before the kitchen has the
    /// order; everything from IN_PROGRESS on (terminal states included)
    /// freezes item rows.
    pub fn allows_item_edits(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Acknowledged)
    }

    /// Statuses items can settle in on their own. When every item of an
    /// order shares one of these, the order is auto-advanced to match.
    pub fn is_item_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Acknowledged => "ACKNOWLEDGED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub table_number: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order item entity. `unit_price` is a snapshot of the price supplied at
/// order time, never re-resolved.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub menu_item_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub status: OrderStatus,
    /// Opaque serialized options/extras chosen at order time.
    pub selected_options: Option<String>,
    pub instructions: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order with its items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub table_number: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub items: Vec<OrderItemCreate>,
}

/// Create order item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemCreate {
    pub menu_item_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub selected_options: Option<serde_json::Value>,
    pub instructions: Option<String>,
}
