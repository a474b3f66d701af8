//! Tableside — 桌边服务生命周期引擎
//!
//! Lifecycle engine for table-service requests and customer orders, with an
//! append-only audit trail written atomically alongside every state change
//! and a TTL cache shielding the store from repeated lookups.
//!
//! # 模块结构
//!
//! ```text
//! src/
//! ├── core/      # 配置
//! ├── db/        # SQLite 连接池、实体模型、状态机
//! ├── audit/     # append-only 审计日志
//! ├── cache/     # TTL 缓存层 + 指标
//! ├── requests/  # 请求生命周期引擎 + 去重守卫
//! ├── orders/    # 订单生命周期引擎 + 拒单 saga
//! └── utils/     # 错误、校验、ID、日志
//! ```
//!
//! # Guarantees
//!
//! - Every mutation validates, writes and appends its audit row inside one
//!   transaction; callers never observe a half-applied state.
//! - The validation read and the conditional write share that transaction;
//!   a concurrent writer surfaces as a distinct retryable error instead of
//!   silently clobbering state.
//! - Re-applying an entity's current status is an idempotent no-op, so
//!   clients can retry safely after network ambiguity.
//! - The cache is a read-side accelerator, never authoritative; mutations
//!   invalidate dependent keys, TTLs bound staleness for everything else.

pub mod audit;
pub mod cache;
pub mod core;
pub mod db;
pub mod orders;
pub mod requests;
pub mod utils;

// Re-export public types
pub use audit::{Actor, OrderLogEntry, RequestLogEntry};
pub use cache::{AtomicMetrics, CacheClass, CacheConfig, CacheLayer, CacheStats, MetricsSink};
pub use core::Config;
pub use db::DbService;
pub use db::models::{
    Order, OrderCreate, OrderDetail, OrderItem, OrderItemCreate, OrderStatus, Request,
    RequestCreate, RequestStatus,
};
pub use orders::{OrderEngine, OrderRejection};
pub use requests::RequestEngine;
pub use utils::{AppError, AppResult, init_logger};
