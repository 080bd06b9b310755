//! Shipping carrier trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::OrderId;
use tokio::sync::RwLock;

use super::GatewayError;

/// Result of a successful shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentResult {
    /// The tracking number assigned by the carrier.
    pub tracking_number: String,
}

/// Trait for shipping operations.
///
/// Shipping an order twice returns the first shipment.
#[async_trait]
pub trait ShippingCarrier: Send + Sync {
    /// Ships an order.
    async fn ship(&self, order_id: OrderId) -> Result<ShipmentResult, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryShippingState {
    shipments: HashMap<OrderId, ShipmentResult>,
    next_id: u32,
    fail_on_ship: bool,
    latency: Duration,
}

/// In-memory shipping carrier used for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingCarrier {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl InMemoryShippingCarrier {
    /// Creates a new in-memory shipping carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every shipment wait `latency` before answering.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    /// Configures the carrier to refuse shipments.
    pub async fn set_fail_on_ship(&self, fail: bool) {
        self.state.write().await.fail_on_ship = fail;
    }

    /// Returns the number of shipments made.
    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.shipments.len()
    }
}

#[async_trait]
impl ShippingCarrier for InMemoryShippingCarrier {
    async fn ship(&self, order_id: OrderId) -> Result<ShipmentResult, GatewayError> {
        let latency = self.state.read().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().await;

        if state.fail_on_ship {
            return Err(GatewayError::Declined("shipping unavailable".to_string()));
        }

        if let Some(existing) = state.shipments.get(&order_id) {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let shipment = ShipmentResult {
            tracking_number: format!("TRACK-{:04}", state.next_id),
        };
        state.shipments.insert(order_id, shipment.clone());

        Ok(shipment)
    }
}
