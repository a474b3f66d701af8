//! Unified error handling
//!
//! Every failure an engine call can surface is one of the variants below.
//! Mutating paths open a single transaction; returning an error before the
//! commit rolls the whole unit of work back, so callers never observe a
//! half-applied state.

use std::fmt::Display;

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Caller Errors ==========
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // ========== Idempotency / Lifecycle Guards ==========
    /// An equivalent active request already exists. Recoverable: the caller
    /// should re-signal the existing request instead of creating a new one.
    #[error("Duplicate active request: {0}")]
    DuplicateActiveRequest(i64),

    /// The order reached PAID; no further status or item mutation is allowed.
    #[error("Order {0} is finalized")]
    OrderFinalized(i64),

    /// The order is past the point where item details may change.
    #[error("Order {0} is locked for item edits")]
    OrderLocked(i64),

    // ========== Concurrency ==========
    /// The row changed between the in-transaction read and the conditional
    /// write. Retryable: re-submit against the new state.
    #[error("Concurrent update: {0}")]
    ConcurrentUpdate(String),

    // ========== System Errors ==========
    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn concurrent_update(msg: impl Into<String>) -> Self {
        Self::ConcurrentUpdate(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn invalid_transition(from: impl Display, to: impl Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether re-submitting the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentUpdate(_) | Self::Database(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}
