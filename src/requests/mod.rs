//! Table-service request lifecycle

pub mod duplicate_guard;
pub mod engine;

pub use engine::RequestEngine;

#[cfg(test)]
mod tests;
