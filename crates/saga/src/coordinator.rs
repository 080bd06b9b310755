//! Saga coordinator for the order-processing saga.

use std::time::{Duration, Instant};

use domain::{Money, OrderId, OrderRequest};
use store::OrderStore;
use tokio_util::sync::CancellationToken;

use crate::activities::OrderActivities;
use crate::compensation::{CompensationStack, CompensationStep};
use crate::error::{ActivityError, CompensationRecord, SagaError};
use crate::order_fulfillment;
use crate::runner::ActivityRunner;
use crate::services::{PaymentGateway, ShippingCarrier};
use crate::state::SagaState;

/// Result of a saga that ran to `Shipped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaOutcome {
    pub order_id: OrderId,
    pub amount_paid: Money,
    pub tracking_number: String,
}

/// Tracks one execution: its state and the compensations registered so far.
#[derive(Debug, Default)]
struct Execution {
    state: SagaState,
    stack: CompensationStack,
}

impl Execution {
    fn transition(&mut self, to: SagaState) {
        tracing::debug!(from = %self.state, %to, "saga state transition");
        self.state = to;
    }

    /// Records a completed forward step and its compensation.
    fn completed(&mut self, compensation: CompensationStep, to: SagaState) {
        self.stack.push(compensation);
        self.transition(to);
    }
}

/// Orchestrates ReserveInventory → DeductPayment → ShipOrder.
///
/// Every completed forward step registers its compensation. When a later
/// step fails, or the saga is cancelled, registered compensations are run in
/// reverse order and the triggering error is returned. Executions are
/// independent of each other; they share only the underlying store.
pub struct OrderSaga<R, S, P, C>
where
    R: ActivityRunner,
    S: OrderStore,
    P: PaymentGateway,
    C: ShippingCarrier,
{
    runner: R,
    activities: OrderActivities<S, P, C>,
}

impl<R, S, P, C> OrderSaga<R, S, P, C>
where
    R: ActivityRunner,
    S: OrderStore,
    P: PaymentGateway,
    C: ShippingCarrier,
{
    pub fn new(runner: R, activities: OrderActivities<S, P, C>) -> Self {
        Self { runner, activities }
    }

    pub fn activities(&self) -> &OrderActivities<S, P, C> {
        &self.activities
    }

    /// Runs the saga to completion for one order request.
    pub async fn execute(&self, request: OrderRequest) -> Result<SagaOutcome, SagaError> {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Runs the saga, cancelling it once `deadline` has elapsed.
    ///
    /// The deadline is only observed between steps. A step already in flight
    /// runs to completion first, so the call can overrun `deadline` by up to
    /// that step's full retry budget (timeout times attempts, plus backoff)
    /// and then the time taken by the compensations.
    pub async fn execute_with_deadline(
        &self,
        request: OrderRequest,
        deadline: Duration,
    ) -> Result<SagaOutcome, SagaError> {
        let token = CancellationToken::new();
        let timer = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                token.cancel();
            })
        };

        let result = self.execute_with_cancellation(request, token).await;
        timer.abort();
        result
    }

    /// Runs the saga until it finishes or `cancel` fires.
    ///
    /// Cancellation is observed between steps: a step already in flight is
    /// allowed to resolve so that its effects are known, then everything
    /// registered so far is unwound.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(
            saga_type = order_fulfillment::SAGA_TYPE,
            user_id = %request.user_id,
            product_id = %request.product_id,
        )
    )]
    pub async fn execute_with_cancellation(
        &self,
        request: OrderRequest,
        cancel: CancellationToken,
    ) -> Result<SagaOutcome, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let result = self.run_steps(request, &cancel).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        match &result {
            Ok(outcome) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(order_id = %outcome.order_id, duration, "saga completed successfully");
            }
            Err(err) => {
                metrics::counter!("saga_failed").increment(1);
                tracing::warn!(
                    error = %err,
                    final_state = %err.final_state(),
                    duration,
                    "saga failed"
                );
            }
        }
        result
    }

    async fn run_steps(
        &self,
        request: OrderRequest,
        cancel: &CancellationToken,
    ) -> Result<SagaOutcome, SagaError> {
        request.validate()?;

        let activities = &self.activities;
        let mut execution = Execution::default();

        // 1. Reserve inventory
        if cancel.is_cancelled() {
            return Err(self.cancelled(execution).await);
        }
        let reservation = match self
            .runner
            .run(order_fulfillment::RESERVE_INVENTORY, move |ctx| {
                activities.reserve_inventory(ctx, request)
            })
            .await
        {
            Ok(reservation) => reservation,
            Err(err) => {
                return Err(self
                    .failed(order_fulfillment::RESERVE_INVENTORY, err, execution)
                    .await);
            }
        };
        execution.completed(
            CompensationStep::ReleaseInventory(reservation),
            SagaState::Reserved,
        );
        tracing::info!(order_id = %reservation.order_id, "inventory reserved");

        // 2. Deduct payment
        if cancel.is_cancelled() {
            return Err(self.cancelled(execution).await);
        }
        let payment = match self
            .runner
            .run(order_fulfillment::DEDUCT_PAYMENT, move |ctx| {
                activities.deduct_payment(ctx, request, reservation)
            })
            .await
        {
            Ok(payment) => payment,
            Err(err) => {
                self.mark_payment_failed(reservation.order_id).await;
                return Err(self
                    .failed(order_fulfillment::DEDUCT_PAYMENT, err, execution)
                    .await);
            }
        };
        execution.completed(CompensationStep::RefundPayment(payment), SagaState::Paid);
        tracing::info!(amount = %payment.amount_paid, "payment deducted");

        // 3. Ship order
        if cancel.is_cancelled() {
            return Err(self.cancelled(execution).await);
        }
        let shipment = match self
            .runner
            .run(order_fulfillment::SHIP_ORDER, move |ctx| {
                activities.ship_order(ctx, request, payment)
            })
            .await
        {
            Ok(shipment) => shipment,
            Err(err) => {
                return Err(self
                    .failed(order_fulfillment::SHIP_ORDER, err, execution)
                    .await);
            }
        };
        execution.transition(SagaState::Shipped);

        Ok(SagaOutcome {
            order_id: payment.order_id,
            amount_paid: payment.amount_paid,
            tracking_number: shipment.tracking_number,
        })
    }

    /// Writes `PAYMENT_FAILED` once DeductPayment is out of attempts.
    ///
    /// Runs whether the charge was declined or the last attempt timed out,
    /// so a status moved to `SHIPPING_INITIATED` by an abandoned attempt is
    /// not left behind. A failure here is logged and does not replace the
    /// step error.
    async fn mark_payment_failed(&self, order_id: OrderId) {
        let activities = &self.activities;
        let result = self
            .runner
            .run(order_fulfillment::MARK_PAYMENT_FAILED, move |ctx| {
                activities.mark_payment_failed(ctx, order_id)
            })
            .await;
        if let Err(err) = result {
            tracing::error!(%order_id, error = %err, "failed to mark payment as failed");
        }
    }

    async fn failed(
        &self,
        step: &'static str,
        source: ActivityError,
        mut execution: Execution,
    ) -> SagaError {
        tracing::warn!(step, state = %execution.state, error = %source, "saga step failed");
        let compensations = self.unwind(&mut execution).await;
        SagaError::StepFailed {
            step,
            source,
            final_state: execution.state,
            compensations,
        }
    }

    async fn cancelled(&self, mut execution: Execution) -> SagaError {
        let cancelled_in = execution.state;
        tracing::warn!(state = %cancelled_in, "saga cancelled");
        let compensations = self.unwind(&mut execution).await;
        SagaError::Cancelled {
            cancelled_in,
            final_state: execution.state,
            compensations,
        }
    }

    /// Pops and runs every registered compensation, most recent first.
    ///
    /// A failed compensation is recorded and the unwind continues with the
    /// remaining entries. Leaves the execution in a terminal state.
    async fn unwind(&self, execution: &mut Execution) -> Vec<CompensationRecord> {
        if !execution.state.can_compensate() {
            execution.transition(SagaState::Failed);
            return Vec::new();
        }

        execution.transition(SagaState::Compensating);
        let activities = &self.activities;
        let mut records = Vec::with_capacity(execution.stack.depth());

        while let Some(step) = execution.stack.pop() {
            let name = step.name();
            tracing::info!(step = name, "running compensation");

            let result = match step {
                CompensationStep::ReleaseInventory(reservation) => {
                    self.runner
                        .run(name, move |ctx| {
                            activities.release_inventory(ctx, reservation)
                        })
                        .await
                }
                CompensationStep::RefundPayment(payment) => {
                    self.runner
                        .run(name, move |ctx| activities.refund_payment(ctx, payment))
                        .await
                }
            };

            if let Err(err) = &result {
                metrics::counter!("saga_compensation_failures_total", "step" => name)
                    .increment(1);
                tracing::error!(
                    step = name,
                    error = %err,
                    "compensation failed, manual reconciliation required"
                );
            }
            records.push(CompensationRecord {
                step: name,
                error: result.err(),
            });
        }

        if records.iter().all(CompensationRecord::succeeded) {
            execution.transition(SagaState::Compensated);
        } else {
            execution.transition(SagaState::PartiallyCompensated);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ActivityOptions, RetryPolicy, RetryingActivityRunner};
    use crate::services::{InMemoryPaymentGateway, InMemoryShippingCarrier};
    use domain::{OrderStatus, Product, ProductId, UserId};
    use store::InMemoryOrderStore;

    type TestSaga = OrderSaga<
        RetryingActivityRunner,
        InMemoryOrderStore,
        InMemoryPaymentGateway,
        InMemoryShippingCarrier,
    >;

    async fn saga_with_stock(stock: i32) -> (TestSaga, InMemoryOrderStore, ProductId) {
        let store = InMemoryOrderStore::new();
        let product_id = ProductId::new();
        store
            .insert_product(Product::new(product_id, stock, Money::from_dollars(100)))
            .await;
        let runner = RetryingActivityRunner::new(ActivityOptions {
            start_to_close_timeout: Duration::from_secs(1),
            retry_policy: RetryPolicy {
                initial_interval: Duration::from_millis(1),
                ..RetryPolicy::default()
            },
        });
        let activities = OrderActivities::new(
            store.clone(),
            InMemoryPaymentGateway::new(),
            InMemoryShippingCarrier::new(),
        );
        (OrderSaga::new(runner, activities), store, product_id)
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_before_any_step() {
        let (saga, store, product_id) = saga_with_stock(10).await;

        let err = saga
            .execute(OrderRequest::new(UserId::new(), product_id, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::InvalidRequest(_)));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn happy_path_returns_outcome() {
        let (saga, store, product_id) = saga_with_stock(10).await;

        let outcome = saga
            .execute(OrderRequest::new(UserId::new(), product_id, 2))
            .await
            .unwrap();

        assert_eq!(outcome.amount_paid, Money::from_cents(20_000));
        let order = store.get_order(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::OrderDelivered);
    }

    #[tokio::test]
    async fn cancelled_before_start_does_nothing() {
        let (saga, store, product_id) = saga_with_stock(10).await;
        let token = CancellationToken::new();
        token.cancel();

        let err = saga
            .execute_with_cancellation(OrderRequest::new(UserId::new(), product_id, 2), token)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SagaError::Cancelled {
                cancelled_in: SagaState::Init,
                final_state: SagaState::Failed,
                ..
            }
        ));
        assert!(err.compensations().is_empty());
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unwind_without_registered_steps_ends_failed() {
        let (saga, _, _) = saga_with_stock(10).await;
        let mut execution = Execution::default();

        let records = saga.unwind(&mut execution).await;

        assert!(records.is_empty());
        assert_eq!(execution.state, SagaState::Failed);
    }
}
