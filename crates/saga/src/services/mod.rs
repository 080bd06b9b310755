//! External collaborators driven by the saga activities.

pub mod payment;
pub mod shipping;

use thiserror::Error;

pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentReceipt};
pub use shipping::{InMemoryShippingCarrier, ShipmentResult, ShippingCarrier};

/// Errors returned by an external gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the request; retrying will not help.
    #[error("{0}")]
    Declined(String),

    /// The gateway could not be reached or answered with a temporary error.
    #[error("{0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}
