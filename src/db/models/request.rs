//! Table-service request entity and its state machine

use serde::{Deserialize, Serialize};

/// Request lifecycle states
///
/// COMPLETED, DONE and CANCELLED are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    New,
    Acknowledged,
    InProgress,
    OnHold,
    Completed,
    Done,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 7] = [
        RequestStatus::New,
        RequestStatus::Acknowledged,
        RequestStatus::InProgress,
        RequestStatus::OnHold,
        RequestStatus::Completed,
        RequestStatus::Done,
        RequestStatus::Cancelled,
    ];

    /// States a request may move to from `self`. Re-applying the current
    /// state is handled upstream as an idempotent no-op, so it is never
    /// listed here.
    pub fn allowed_next(self) -> &'static [RequestStatus] {
        match self {
            RequestStatus::New => &[
                RequestStatus::Acknowledged,
                RequestStatus::InProgress,
                RequestStatus::OnHold,
                RequestStatus::Cancelled,
            ],
            // Same outbound set as New, minus Acknowledged itself.
            RequestStatus::Acknowledged => &[
                RequestStatus::InProgress,
                RequestStatus::OnHold,
                RequestStatus::Cancelled,
            ],
            RequestStatus::OnHold => &[RequestStatus::New, RequestStatus::Cancelled],
            RequestStatus::InProgress => &[
                RequestStatus::Completed,
                RequestStatus::Cancelled,
                RequestStatus::Done,
            ],
            RequestStatus::Completed | RequestStatus::Done | RequestStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Content may only be edited while the request is still waiting to be
    /// picked up.
    pub fn allows_content_edit(self) -> bool {
        matches!(self, RequestStatus::New | RequestStatus::OnHold)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::New => "NEW",
            RequestStatus::Acknowledged => "ACKNOWLEDGED",
            RequestStatus::InProgress => "IN_PROGRESS",
            RequestStatus::OnHold => "ON_HOLD",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Done => "DONE",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table-service request entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Request {
    pub id: i64,
    pub table_number: i64,
    pub session_id: String,
    pub content: String,
    pub status: RequestStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCreate {
    pub table_number: i64,
    pub session_id: String,
    pub content: String,
}
