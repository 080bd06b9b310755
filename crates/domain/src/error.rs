//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by domain validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Requested quantity is not a positive integer.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i32 },

    /// A status string did not match any known order status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// The order status machine does not allow this transition.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
