//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{Money, OrderId};
use tokio::sync::RwLock;

use super::GatewayError;

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The payment ID assigned by the gateway.
    pub payment_id: String,
    pub amount: Money,
}

/// Trait for payment processing operations.
///
/// Calls are keyed by order ID: charging an already charged order returns the
/// original receipt and refunding an already refunded order succeeds.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the order total.
    async fn charge(&self, order_id: OrderId, amount: Money) -> Result<PaymentReceipt, GatewayError>;

    /// Refunds a previous charge.
    async fn refund(&self, order_id: OrderId, amount: Money) -> Result<(), GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<OrderId, PaymentReceipt>,
    refunded: HashMap<OrderId, Money>,
    next_id: u32,
    fail_on_charge: bool,
    fail_on_refund: bool,
    unavailable_charges: u32,
    latency: Duration,
}

/// In-memory payment gateway used for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every charge wait `latency` before answering.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    /// Configures the gateway to decline charges.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Configures the gateway to reject refunds.
    pub async fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().await.fail_on_refund = fail;
    }

    /// Makes the next `times` charges fail as unavailable.
    pub async fn set_unavailable_charges(&self, times: u32) {
        self.state.write().await.unavailable_charges = times;
    }

    /// Returns the number of charges that have not been refunded.
    pub async fn payment_count(&self) -> usize {
        let state = self.state.read().await;
        state
            .payments
            .keys()
            .filter(|id| !state.refunded.contains_key(id))
            .count()
    }

    /// Returns the amount refunded for an order, if any.
    pub async fn refunded_amount(&self, order_id: OrderId) -> Option<Money> {
        self.state.read().await.refunded.get(&order_id).copied()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, order_id: OrderId, amount: Money) -> Result<PaymentReceipt, GatewayError> {
        let latency = self.state.read().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().await;

        if state.unavailable_charges > 0 {
            state.unavailable_charges -= 1;
            return Err(GatewayError::Unavailable(
                "payment gateway unavailable".to_string(),
            ));
        }

        if state.fail_on_charge {
            return Err(GatewayError::Declined("payment declined".to_string()));
        }

        if let Some(receipt) = state.payments.get(&order_id) {
            return Ok(receipt.clone());
        }

        state.next_id += 1;
        let receipt = PaymentReceipt {
            payment_id: format!("PAY-{:04}", state.next_id),
            amount,
        };
        state.payments.insert(order_id, receipt.clone());

        Ok(receipt)
    }

    async fn refund(&self, order_id: OrderId, amount: Money) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;

        if state.fail_on_refund {
            return Err(GatewayError::Unavailable("refund rejected".to_string()));
        }

        if !state.payments.contains_key(&order_id) {
            return Err(GatewayError::Declined(format!(
                "no payment recorded for order {order_id}"
            )));
        }

        state.refunded.insert(order_id, amount);
        Ok(())
    }
}
