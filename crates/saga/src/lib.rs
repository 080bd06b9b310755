//! Order-processing saga.
//!
//! The saga drives three dependent steps:
//! 1. Reserve inventory (creates the order)
//! 2. Deduct payment
//! 3. Ship the order
//!
//! Every completed step registers a compensation. If a later step fails, or
//! the saga is cancelled, compensations run in reverse order and the original
//! error is returned. Each step runs through an [`ActivityRunner`] that applies
//! a start-to-close timeout and a bounded retry policy.

pub mod activities;
pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod order_fulfillment;
pub mod runner;
pub mod services;
pub mod state;

pub use activities::OrderActivities;
pub use compensation::{CompensationStack, CompensationStep};
pub use coordinator::{OrderSaga, SagaOutcome};
pub use error::{ActivityError, CompensationRecord, SagaError};
pub use runner::{
    ActivityContext, ActivityOptions, ActivityRunner, RetryPolicy, RetryingActivityRunner,
};
pub use services::{
    GatewayError, InMemoryPaymentGateway, InMemoryShippingCarrier, PaymentGateway, PaymentReceipt,
    ShipmentResult, ShippingCarrier,
};
pub use state::SagaState;
