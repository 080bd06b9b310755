//! The five order activities: three forward steps and two compensations.

use domain::{InventoryResult, OrderId, OrderRequest, OrderStatus, PaymentResult};
use store::OrderStore;

use crate::error::ActivityError;
use crate::runner::ActivityContext;
use crate::services::{PaymentGateway, ShipmentResult, ShippingCarrier};

/// Activities over an order store and the payment/shipping collaborators.
///
/// Each activity is one unit of work the runner may attempt up to its retry
/// budget, so every one of them tolerates being repeated after a failure.
pub struct OrderActivities<S, P, C>
where
    S: OrderStore,
    P: PaymentGateway,
    C: ShippingCarrier,
{
    store: S,
    payment: P,
    shipping: C,
}

impl<S, P, C> OrderActivities<S, P, C>
where
    S: OrderStore,
    P: PaymentGateway,
    C: ShippingCarrier,
{
    pub fn new(store: S, payment: P, shipping: C) -> Self {
        Self {
            store,
            payment,
            shipping,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserves stock and creates the order in `ADDED_TO_CART`.
    #[tracing::instrument(skip(self, ctx), fields(attempt = ctx.attempt))]
    pub async fn reserve_inventory(
        &self,
        ctx: ActivityContext,
        request: OrderRequest,
    ) -> Result<InventoryResult, ActivityError> {
        tracing::info!(
            product_id = %request.product_id,
            quantity = request.product_quantity,
            "updating inventory"
        );

        let result = self.store.reserve_inventory(&request).await?;

        tracing::info!(order_id = %result.order_id, "inventory updated");
        Ok(result)
    }

    /// Compensation of [`reserve_inventory`](Self::reserve_inventory).
    #[tracing::instrument(skip(self, ctx), fields(attempt = ctx.attempt))]
    pub async fn release_inventory(
        &self,
        ctx: ActivityContext,
        reservation: InventoryResult,
    ) -> Result<(), ActivityError> {
        tracing::info!(
            product_id = %reservation.product_id,
            quantity = reservation.quantity_deducted,
            "releasing inventory"
        );

        if let Err(err) = self.store.release_inventory(&reservation).await {
            tracing::error!(error = %err, "failed to release inventory");
            return Err(err.into());
        }

        tracing::info!("inventory released");
        Ok(())
    }

    /// Moves the order to `SHIPPING_INITIATED` and charges its total.
    ///
    /// A failed charge leaves the order in `SHIPPING_INITIATED`; the
    /// coordinator marks it once the runner has given up on the step.
    #[tracing::instrument(skip(self, ctx, request), fields(attempt = ctx.attempt, order_id = %reservation.order_id))]
    pub async fn deduct_payment(
        &self,
        ctx: ActivityContext,
        request: OrderRequest,
        reservation: InventoryResult,
    ) -> Result<PaymentResult, ActivityError> {
        tracing::info!(user_id = %request.user_id, "processing payment");

        let order_id = reservation.order_id;
        let total_price = self.store.initiate_shipping(order_id).await?;

        match self.payment.charge(order_id, total_price).await {
            Ok(receipt) => {
                tracing::info!(
                    amount = %total_price,
                    payment_id = %receipt.payment_id,
                    "payment processed"
                );
                Ok(PaymentResult {
                    order_id,
                    amount_paid: total_price,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "payment failed");
                Err(err.into())
            }
        }
    }

    /// Marks the order `PAYMENT_FAILED` after DeductPayment has failed for good.
    #[tracing::instrument(skip(self, ctx), fields(attempt = ctx.attempt))]
    pub async fn mark_payment_failed(
        &self,
        ctx: ActivityContext,
        order_id: OrderId,
    ) -> Result<(), ActivityError> {
        self.store
            .update_status(order_id, OrderStatus::PaymentFailed)
            .await?;
        tracing::info!("order marked payment failed");
        Ok(())
    }

    /// Compensation of [`deduct_payment`](Self::deduct_payment).
    #[tracing::instrument(skip(self, ctx), fields(attempt = ctx.attempt))]
    pub async fn refund_payment(
        &self,
        ctx: ActivityContext,
        payment: PaymentResult,
    ) -> Result<(), ActivityError> {
        tracing::info!(
            order_id = %payment.order_id,
            amount = %payment.amount_paid,
            "refunding payment"
        );

        if let Err(err) = self
            .payment
            .refund(payment.order_id, payment.amount_paid)
            .await
        {
            tracing::error!(error = %err, "payment gateway refund failed");
            return Err(err.into());
        }

        if let Err(err) = self
            .store
            .update_status(payment.order_id, OrderStatus::PaymentRefunded)
            .await
        {
            tracing::error!(error = %err, "failed to update order status for refund");
            return Err(err.into());
        }

        tracing::info!("payment refunded");
        Ok(())
    }

    /// Ships the order and marks it `ORDER_DELIVERED`.
    #[tracing::instrument(skip(self, ctx, request), fields(attempt = ctx.attempt, order_id = %payment.order_id))]
    pub async fn ship_order(
        &self,
        ctx: ActivityContext,
        request: OrderRequest,
        payment: PaymentResult,
    ) -> Result<ShipmentResult, ActivityError> {
        tracing::info!(product_id = %request.product_id, "processing shipping");

        let shipment = self.shipping.ship(payment.order_id).await?;
        self.store
            .update_status(payment.order_id, OrderStatus::OrderDelivered)
            .await?;

        tracing::info!(tracking_number = %shipment.tracking_number, "shipping completed");
        Ok(shipment)
    }
}
