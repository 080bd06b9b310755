//! Order endpoints: run the order saga and read back the order row.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Order, OrderId, OrderRequest, OrderStatus};
use saga::{InMemoryPaymentGateway, InMemoryShippingCarrier, OrderSaga, RetryingActivityRunner};
use serde::Serialize;
use store::OrderStore;

use crate::error::ApiError;

/// The saga as wired by this server: local retrying runner, simulated
/// payment gateway and shipping carrier.
pub type OrderProcessingSaga<S> =
    OrderSaga<RetryingActivityRunner, S, InMemoryPaymentGateway, InMemoryShippingCarrier>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub saga: OrderProcessingSaga<S>,
    pub payment: InMemoryPaymentGateway,
    pub shipping: InMemoryShippingCarrier,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderProcessedResponse {
    pub order_id: String,
    pub status: &'static str,
    pub amount_paid_cents: i64,
    pub tracking_number: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub total_cents: i64,
    pub status: &'static str,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            product_id: order.products.product_id.to_string(),
            quantity: order.products.quantity,
            total_cents: order.total_price.cents(),
            status: order.status.as_str(),
        }
    }
}

// -- Handlers --

/// POST /orders: runs one order saga to completion.
#[tracing::instrument(skip(state, request))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderProcessedResponse>), ApiError> {
    let outcome = state.saga.execute(request).await?;

    let response = OrderProcessedResponse {
        order_id: outcome.order_id.to_string(),
        status: OrderStatus::OrderDelivered.as_str(),
        amount_paid_cents: outcome.amount_paid.cents(),
        tracking_number: outcome.tracking_number,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .saga
        .activities()
        .store()
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
