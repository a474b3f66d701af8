//! 审计日志模块 — append-only 状态变更记录
//!
//! Every meaningful state change commits exactly one log row, written on
//! the same transaction as the state write (content-only edits write no
//! row). Rows are never updated or reordered; they go away only when an
//! administrative delete cascades from the parent entity.
//!
//! The `actor` tag is what lets downstream analytics compute derived
//! metrics (time-to-first-response = first USER row to first WAITER row)
//! without wall-clock heuristics.

pub mod storage;
pub mod types;

pub use storage::{
    append_order_log, append_request_log, list_order_log, list_request_log,
};
pub use types::{Actor, OrderLogEntry, RequestLogEntry};
