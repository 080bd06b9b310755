//! HTTP entry point for the order-processing saga.
//!
//! Exposes the saga as `POST /orders`, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    ActivityOptions, InMemoryPaymentGateway, InMemoryShippingCarrier, OrderActivities, OrderSaga,
    RetryingActivityRunner,
};
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over `store` with simulated payment and shipping.
pub fn create_default_state<S: OrderStore + 'static>(
    store: S,
    options: ActivityOptions,
) -> Arc<AppState<S>> {
    let payment = InMemoryPaymentGateway::new();
    let shipping = InMemoryShippingCarrier::new();
    let activities = OrderActivities::new(store, payment.clone(), shipping.clone());
    let saga = OrderSaga::new(RetryingActivityRunner::new(options), activities);

    Arc::new(AppState {
        saga,
        payment,
        shipping,
    })
}
