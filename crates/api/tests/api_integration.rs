//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::routes::orders::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{Money, Product, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{ActivityOptions, RetryPolicy};
use store::{InMemoryOrderStore, OrderStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    state: Arc<AppState<InMemoryOrderStore>>,
    store: InMemoryOrderStore,
    product_id: ProductId,
}

async fn setup(items_available: i32) -> TestApp {
    let store = InMemoryOrderStore::new();
    let product_id = ProductId::new();
    store
        .insert_product(Product::new(
            product_id,
            items_available,
            Money::from_dollars(100),
        ))
        .await;

    let options = ActivityOptions {
        start_to_close_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
    };
    let state = api::create_default_state(store.clone(), options);
    let app = api::create_app(state.clone(), get_metrics_handle());

    TestApp {
        app,
        state,
        store,
        product_id,
    }
}

fn order_request(product_id: ProductId, quantity: i32) -> Request<Body> {
    let body = serde_json::json!({
        "userID": uuid::Uuid::new_v4().to_string(),
        "productID": product_id.to_string(),
        "productQuantity": quantity,
    });
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let t = setup(10).await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order_runs_saga() {
    let t = setup(10).await;

    let response = t
        .app
        .clone()
        .oneshot(order_request(t.product_id, 2))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ORDER_DELIVERED");
    assert_eq!(json["amount_paid_cents"], 20_000);
    assert!(json["tracking_number"].as_str().is_some());

    let order_id = json["order_id"].as_str().unwrap().to_string();
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], order_id);
    assert_eq!(json["quantity"], 2);
    assert_eq!(json["total_cents"], 20_000);
    assert_eq!(json["status"], "ORDER_DELIVERED");

    let product = t.store.get_product(t.product_id).await.unwrap().unwrap();
    assert_eq!(product.items_available, 8);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let t = setup(1).await;

    let response = t
        .app
        .oneshot(order_request(t.product_id, 5))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("available 1, requested 5"), "{error}");
    assert_eq!(json["saga_state"], "Failed");
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let t = setup(10).await;

    let response = t
        .app
        .oneshot(order_request(ProductId::new(), 1))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_quantity_is_bad_request() {
    let t = setup(10).await;

    let response = t
        .app
        .oneshot(order_request(t.product_id, 0))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_shipping_failure_reports_compensated_saga() {
    let t = setup(10).await;
    t.state.shipping.set_fail_on_ship(true).await;

    let response = t
        .app
        .oneshot(order_request(t.product_id, 3))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["error"], "ShipOrder failed: shipping unavailable");
    assert_eq!(json["saga_state"], "Compensated");
    assert_eq!(json["failed_compensations"], serde_json::json!([]));

    let product = t.store.get_product(t.product_id).await.unwrap().unwrap();
    assert_eq!(product.items_available, 10);
}

#[tokio::test]
async fn test_partial_compensation_is_reported() {
    let t = setup(10).await;
    t.state.shipping.set_fail_on_ship(true).await;
    t.state.payment.set_fail_on_refund(true).await;

    let response = t
        .app
        .oneshot(order_request(t.product_id, 1))
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["saga_state"], "PartiallyCompensated");
    assert_eq!(json["failed_compensations"], serde_json::json!(["RefundPayment"]));
}

#[tokio::test]
async fn test_get_order_invalid_id() {
    let t = setup(10).await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/orders/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_order_not_found() {
    let t = setup(10).await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup(10).await;

    let response = t
        .app
        .clone()
        .oneshot(order_request(t.product_id, 1))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_executions_total"), "{text}");
}
