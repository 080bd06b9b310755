//! Forward-step results.
//!
//! Each result is both the output of its forward step and the complete input
//! of the matching compensation, so compensating never re-reads step internals.

use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// Output of inventory reservation; input of inventory release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResult {
    pub product_id: ProductId,
    pub quantity_deducted: i32,
    pub order_id: OrderId,
}

/// Output of payment deduction; input of payment refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub order_id: OrderId,
    pub amount_paid: Money,
}
