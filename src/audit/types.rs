//! Audit log entry types

use serde::{Deserialize, Serialize};

/// Who performed a state change. Supplied by the authentication boundary;
/// the engine only tags audit rows with it and gates a few transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    User,
    Waiter,
    Admin,
    System,
}

impl Actor {
    /// Staff actors may request any legal transition; plain users may only
    /// cancel.
    pub fn is_staff(self) -> bool {
        !matches!(self, Actor::User)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Actor::User => "USER",
            Actor::Waiter => "WAITER",
            Actor::Admin => "ADMIN",
            Actor::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record for a request state change
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestLogEntry {
    pub id: i64,
    pub request_id: i64,
    pub actor: Actor,
    pub action: String,
    pub created_at: i64,
}

/// Immutable audit record for an order-level or creation event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLogEntry {
    pub id: i64,
    pub order_id: i64,
    pub actor: Actor,
    pub action: String,
    pub created_at: i64,
}
