//! Entity models and status state machines

pub mod order;
pub mod request;

pub use order::{Order, OrderCreate, OrderDetail, OrderItem, OrderItemCreate, OrderStatus};
pub use request::{Request, RequestCreate, RequestStatus};
