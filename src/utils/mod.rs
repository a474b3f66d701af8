//! 工具模块 - 通用工具函数和类型
//!
//! - [`AppError`] / [`AppResult`] - 应用错误类型
//! - [`validation`] - 输入校验
//! - [`id`] - snowflake ID 和时间戳
//! - [`logger`] - 日志初始化

pub mod error;
pub mod id;
pub mod logger;
pub mod result;
pub mod validation;

pub use error::AppError;
pub use id::{now_millis, snowflake_id};
pub use logger::{init_logger, init_logger_with_level};
pub use result::AppResult;
