//! Compensation records and the LIFO stack that holds them.

use domain::{InventoryResult, PaymentResult};
use serde::{Deserialize, Serialize};

use crate::order_fulfillment;

/// A compensation registered by a completed forward step.
///
/// Carries only the plain result of that step, which is everything the
/// compensating activity needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "input")]
pub enum CompensationStep {
    ReleaseInventory(InventoryResult),
    RefundPayment(PaymentResult),
}

impl CompensationStep {
    /// Activity name of the compensation.
    pub fn name(&self) -> &'static str {
        match self {
            CompensationStep::ReleaseInventory(_) => order_fulfillment::RELEASE_INVENTORY,
            CompensationStep::RefundPayment(_) => order_fulfillment::REFUND_PAYMENT,
        }
    }
}

/// Compensations for completed, not yet compensated forward steps.
///
/// Entries are pushed once per successful forward step, never modified, and
/// popped in reverse registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompensationStack {
    steps: Vec<CompensationStep>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the compensation of a step that just completed.
    pub fn push(&mut self, step: CompensationStep) {
        self.steps.push(step);
    }

    /// Removes the most recently registered compensation.
    pub fn pop(&mut self) -> Option<CompensationStep> {
        self.steps.pop()
    }

    /// Number of registered compensations.
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registered compensations, oldest first.
    pub fn steps(&self) -> &[CompensationStep] {
        &self.steps
    }
}
