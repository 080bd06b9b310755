//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of one saga execution.
///
/// State transitions:
/// ```text
/// Init ──► Reserved ──► Paid ──► Shipped
///  │          │          │
///  │          └────┬─────┘
///  │               ▼
///  │         Compensating ──┬──► Compensated
///  │                        └──► PartiallyCompensated
///  └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// No forward step has completed.
    #[default]
    Init,

    /// Inventory reserved; one compensation registered.
    Reserved,

    /// Payment taken; two compensations registered.
    Paid,

    /// All steps completed (terminal success).
    Shipped,

    /// Registered compensations are being unwound.
    Compensating,

    /// Every compensation succeeded (terminal failure).
    Compensated,

    /// At least one compensation failed; needs manual reconciliation (terminal failure).
    PartiallyCompensated,

    /// Failed before anything was mutated; nothing to undo (terminal failure).
    Failed,
}

impl SagaState {
    /// Returns true if a failure in this state must unwind compensations.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Reserved | SagaState::Paid)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Shipped
                | SagaState::Compensated
                | SagaState::PartiallyCompensated
                | SagaState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Init => "Init",
            SagaState::Reserved => "Reserved",
            SagaState::Paid => "Paid",
            SagaState::Shipped => "Shipped",
            SagaState::Compensating => "Compensating",
            SagaState::Compensated => "Compensated",
            SagaState::PartiallyCompensated => "PartiallyCompensated",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
