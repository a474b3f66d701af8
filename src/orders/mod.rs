//! Order lifecycle

pub mod engine;

pub use engine::{OrderEngine, OrderRejection};
