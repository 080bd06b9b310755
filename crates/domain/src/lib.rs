//! Domain model for the order processing saga.
//!
//! This crate provides the plain data the saga moves around:
//! - `OrderRequest`, the immutable saga input
//! - `Product` and `Order` rows with the order status state machine
//! - `InventoryResult` and `PaymentResult`, the forward-step outputs that are
//!   also the exact inputs of their compensations

pub mod error;
pub mod order;
pub mod results;

pub use common::{Money, OrderId, ProductId, UserId};
pub use error::DomainError;
pub use order::{LineItems, Order, OrderRequest, OrderStatus, Product};
pub use results::{InventoryResult, PaymentResult};
