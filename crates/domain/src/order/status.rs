//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The externally visible progress marker of an order.
///
/// State transitions:
/// ```text
/// ADDED_TO_CART ──► SHIPPING_INITIATED ──┬──► ORDER_DELIVERED
///       │                                ├──► PAYMENT_FAILED
///       │                                └──► PAYMENT_REFUNDED
///       └──────────────────────────────────────► PAYMENT_FAILED
/// ```
///
/// `ADDED_TO_CART → PAYMENT_FAILED` covers a payment step that gave up
/// before its move to `SHIPPING_INITIATED` committed.
///
/// Every status may also be written onto itself; that write is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Stock reserved and the order row created.
    #[serde(rename = "ADDED_TO_CART")]
    AddedToCart,

    /// Payment is being taken and shipping will follow.
    #[serde(rename = "SHIPPING_INITIATED")]
    ShippingInitiated,

    /// Shipment completed (terminal state).
    #[serde(rename = "ORDER_DELIVERED")]
    OrderDelivered,

    /// The charge was attempted and did not go through (terminal state).
    #[serde(rename = "PAYMENT_FAILED")]
    PaymentFailed,

    /// Payment succeeded but was compensated after a later step failed (terminal state).
    #[serde(rename = "PAYMENT_REFUNDED")]
    PaymentRefunded,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::AddedToCart,
        OrderStatus::ShippingInitiated,
        OrderStatus::OrderDelivered,
        OrderStatus::PaymentFailed,
        OrderStatus::PaymentRefunded,
    ];

    /// Returns true if an order in this status may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (
                OrderStatus::AddedToCart,
                OrderStatus::ShippingInitiated | OrderStatus::PaymentFailed
            ) | (
                    OrderStatus::ShippingInitiated,
                    OrderStatus::OrderDelivered
                        | OrderStatus::PaymentFailed
                        | OrderStatus::PaymentRefunded
                )
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but returns a typed error.
    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Statuses from which `self` can be reached, including `self`.
    pub fn predecessors(&self) -> Vec<OrderStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(*self))
            .collect()
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::OrderDelivered | OrderStatus::PaymentFailed | OrderStatus::PaymentRefunded
        )
    }

    /// Returns the exact string stored in the `orders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AddedToCart => "ADDED_TO_CART",
            OrderStatus::ShippingInitiated => "SHIPPING_INITIATED",
            OrderStatus::OrderDelivered => "ORDER_DELIVERED",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::PaymentRefunded => "PAYMENT_REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(OrderStatus::AddedToCart.can_transition_to(OrderStatus::ShippingInitiated));
        assert!(OrderStatus::ShippingInitiated.can_transition_to(OrderStatus::OrderDelivered));
    }

    #[test]
    fn test_failure_transitions() {
        assert!(OrderStatus::ShippingInitiated.can_transition_to(OrderStatus::PaymentFailed));
        assert!(OrderStatus::ShippingInitiated.can_transition_to(OrderStatus::PaymentRefunded));
        assert!(OrderStatus::AddedToCart.can_transition_to(OrderStatus::PaymentFailed));
        assert!(!OrderStatus::AddedToCart.can_transition_to(OrderStatus::PaymentRefunded));
        assert!(!OrderStatus::AddedToCart.can_transition_to(OrderStatus::OrderDelivered));
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        for terminal in [
            OrderStatus::OrderDelivered,
            OrderStatus::PaymentFailed,
            OrderStatus::PaymentRefunded,
        ] {
            assert!(terminal.is_terminal());
            for next in OrderStatus::ALL {
                assert_eq!(terminal.can_transition_to(next), terminal == next);
            }
        }
    }

    #[test]
    fn test_self_transition_is_allowed() {
        for status in OrderStatus::ALL {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn test_ensure_transition_error() {
        let err = OrderStatus::OrderDelivered
            .ensure_transition(OrderStatus::PaymentRefunded)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition: ORDER_DELIVERED -> PAYMENT_REFUNDED"
        );
    }

    #[test]
    fn test_predecessors() {
        assert_eq!(
            OrderStatus::PaymentRefunded.predecessors(),
            vec![OrderStatus::ShippingInitiated, OrderStatus::PaymentRefunded]
        );
        assert_eq!(
            OrderStatus::PaymentFailed.predecessors(),
            vec![
                OrderStatus::AddedToCart,
                OrderStatus::ShippingInitiated,
                OrderStatus::PaymentFailed,
            ]
        );
        assert_eq!(
            OrderStatus::ShippingInitiated.predecessors(),
            vec![OrderStatus::AddedToCart, OrderStatus::ShippingInitiated]
        );
    }

    #[test]
    fn test_wire_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!(matches!(
            "SHIPPED".parse::<OrderStatus>(),
            Err(DomainError::UnknownStatus(_))
        ));
    }
}
