//! Activity and saga error types.

use std::time::Duration;

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

use crate::services::GatewayError;
use crate::state::SagaState;

/// Definitive or transient failure of a single activity.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActivityError {
    /// The store could not be reached.
    #[error("{0}")]
    Connection(String),

    /// A transaction could not be started or committed.
    #[error("{0}")]
    Transaction(String),

    /// A referenced row does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A business rule rejected the operation, e.g. insufficient stock.
    #[error("{0}")]
    BusinessRule(String),

    /// One attempt exceeded its start-to-close timeout.
    #[error("activity timed out after {0:?}")]
    Timeout(Duration),

    /// An external gateway failed.
    #[error("{message}")]
    ExternalService { message: String, retryable: bool },

    /// Any other failure; never retried.
    #[error("{0}")]
    Internal(String),
}

impl ActivityError {
    /// Returns true if the runner may try the activity again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivityError::Connection(_)
            | ActivityError::Transaction(_)
            | ActivityError::Timeout(_) => true,
            ActivityError::ExternalService { retryable, .. } => *retryable,
            ActivityError::NotFound(_)
            | ActivityError::BusinessRule(_)
            | ActivityError::Internal(_) => false,
        }
    }
}

impl From<StoreError> for ActivityError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Connection(_) => ActivityError::Connection(message),
            StoreError::Transaction { .. } => ActivityError::Transaction(message),
            StoreError::NotFound { .. } => ActivityError::NotFound(message),
            StoreError::InsufficientStock { .. }
            | StoreError::TotalOutOfRange { .. }
            | StoreError::InvalidTransition { .. } => ActivityError::BusinessRule(message),
            StoreError::CorruptRow(_) | StoreError::Database(_) | StoreError::Serialization(_) => {
                ActivityError::Internal(message)
            }
        }
    }
}

impl From<GatewayError> for ActivityError {
    fn from(err: GatewayError) -> Self {
        ActivityError::ExternalService {
            retryable: err.is_transient(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one compensation executed during unwind.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationRecord {
    /// Activity name of the compensation.
    pub step: &'static str,
    /// The error, if the compensation did not succeed.
    pub error: Option<ActivityError>,
}

impl CompensationRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Errors returned by a saga execution.
///
/// Exactly one value per failed execution. Compensation outcomes travel with
/// the error as diagnostics but never replace the triggering failure.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was rejected before any activity ran.
    #[error("Invalid order request: {0}")]
    InvalidRequest(#[from] DomainError),

    /// A forward step failed definitively.
    #[error("{step} failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: ActivityError,
        final_state: SagaState,
        compensations: Vec<CompensationRecord>,
    },

    /// The saga was cancelled; completed steps were unwound.
    #[error("Saga cancelled in state {cancelled_in}")]
    Cancelled {
        cancelled_in: SagaState,
        final_state: SagaState,
        compensations: Vec<CompensationRecord>,
    },
}

impl SagaError {
    /// The terminal state the saga ended in.
    pub fn final_state(&self) -> SagaState {
        match self {
            SagaError::InvalidRequest(_) => SagaState::Failed,
            SagaError::StepFailed { final_state, .. } | SagaError::Cancelled { final_state, .. } => {
                *final_state
            }
        }
    }

    /// Compensations that ran, in execution order.
    pub fn compensations(&self) -> &[CompensationRecord] {
        match self {
            SagaError::InvalidRequest(_) => &[],
            SagaError::StepFailed { compensations, .. }
            | SagaError::Cancelled { compensations, .. } => compensations,
        }
    }

    /// Compensations that did not succeed and need manual reconciliation.
    pub fn compensation_failures(&self) -> impl Iterator<Item = &CompensationRecord> {
        self.compensations().iter().filter(|c| !c.succeeded())
    }

    /// The activity error that triggered the failure, if any.
    pub fn activity_error(&self) -> Option<&ActivityError> {
        match self {
            SagaError::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
