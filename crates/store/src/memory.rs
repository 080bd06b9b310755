use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{InventoryResult, Money, Order, OrderId, OrderRequest, OrderStatus, Product, ProductId};
use tokio::sync::RwLock;

use crate::{OrderStore, Result, StoreError, StoreOperation};

/// A failure the in-memory store can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with a connection error before touching any data.
    Connection,
    /// Fail with a commit error before touching any data.
    Transaction,
    /// Apply the change, then report a connection error as if the
    /// acknowledgement was lost.
    LostAck,
}

impl Fault {
    fn into_error(self) -> StoreError {
        match self {
            Fault::Connection | Fault::LostAck => {
                StoreError::Connection("injected connection failure".to_string())
            }
            Fault::Transaction => StoreError::Transaction {
                phase: "commit",
                message: "injected commit failure".to_string(),
            },
        }
    }
}

/// A successfully applied mutation, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalEntry {
    pub operation: StoreOperation,
    pub order_id: OrderId,
    /// Status written by `UpdateStatus` / `InitiateShipping`.
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    order: Order,
    stock_released: bool,
}

#[derive(Debug, Default)]
struct InMemoryState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, StoredOrder>,
    faults: HashMap<StoreOperation, VecDeque<Fault>>,
    latency: HashMap<StoreOperation, Duration>,
    journal: Vec<JournalEntry>,
}

impl InMemoryState {
    fn take_fault(&mut self, operation: StoreOperation) -> Option<Fault> {
        self.faults.get_mut(&operation)?.pop_front()
    }

    fn record(&mut self, operation: StoreOperation, order_id: OrderId, status: Option<OrderStatus>) {
        self.journal.push(JournalEntry {
            operation,
            order_id,
            status,
        });
    }

    fn order_mut(&mut self, order_id: OrderId) -> Result<&mut StoredOrder> {
        self.orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::order_not_found(order_id))
    }
}

/// In-memory product/order store for testing.
///
/// Mirrors the PostgreSQL store's semantics; every mutating call holds the
/// write lock for its whole check-then-write sequence, standing in for the
/// row lock the database takes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product.
    pub async fn insert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    /// Makes the next `times` calls of `operation` fail with `fault`.
    pub async fn inject_fault(&self, operation: StoreOperation, fault: Fault, times: usize) {
        let mut state = self.state.write().await;
        let queue = state.faults.entry(operation).or_default();
        queue.extend(std::iter::repeat_n(fault, times));
    }

    /// Delays every call of `operation` by `latency` before it takes the lock.
    pub async fn set_latency(&self, operation: StoreOperation, latency: Duration) {
        self.state.write().await.latency.insert(operation, latency);
    }

    async fn simulate_latency(&self, operation: StoreOperation) {
        let latency = self.state.read().await.latency.get(&operation).copied();
        if let Some(latency) = latency.filter(|l| !l.is_zero()) {
            tokio::time::sleep(latency).await;
        }
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns all applied mutations in order.
    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.state.read().await.journal.clone()
    }

    /// Returns the operations applied to one order, in order.
    pub async fn operations_for(&self, order_id: OrderId) -> Vec<StoreOperation> {
        self.state
            .read()
            .await
            .journal
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| entry.operation)
            .collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn reserve_inventory(&self, request: &OrderRequest) -> Result<InventoryResult> {
        self.simulate_latency(StoreOperation::ReserveInventory).await;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let fault = state.take_fault(StoreOperation::ReserveInventory);
        if let Some(fault @ (Fault::Connection | Fault::Transaction)) = fault {
            return Err(fault.into_error());
        }

        let product = state
            .products
            .get_mut(&request.product_id)
            .ok_or_else(|| StoreError::product_not_found(request.product_id))?;

        if product.items_available < request.product_quantity {
            return Err(StoreError::InsufficientStock {
                available: product.items_available,
                requested: request.product_quantity,
            });
        }

        let total_price = request
            .total_for(product.price)
            .ok_or(StoreError::TotalOutOfRange {
                unit_price: product.price,
                quantity: request.product_quantity,
            })?;
        product.items_available -= request.product_quantity;

        let order_id = OrderId::new();
        let order = Order {
            id: order_id,
            user_id: request.user_id,
            products: request.line_items(),
            total_price,
            status: OrderStatus::AddedToCart,
        };
        state.orders.insert(
            order_id,
            StoredOrder {
                order,
                stock_released: false,
            },
        );
        state.record(
            StoreOperation::ReserveInventory,
            order_id,
            Some(OrderStatus::AddedToCart),
        );

        match fault {
            Some(fault) => Err(fault.into_error()),
            None => Ok(InventoryResult {
                product_id: request.product_id,
                quantity_deducted: request.product_quantity,
                order_id,
            }),
        }
    }

    async fn release_inventory(&self, reservation: &InventoryResult) -> Result<()> {
        self.simulate_latency(StoreOperation::ReleaseInventory).await;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let fault = state.take_fault(StoreOperation::ReleaseInventory);
        if let Some(fault @ (Fault::Connection | Fault::Transaction)) = fault {
            return Err(fault.into_error());
        }

        if !state.products.contains_key(&reservation.product_id) {
            return Err(StoreError::product_not_found(reservation.product_id));
        }

        let stored = state
            .orders
            .get_mut(&reservation.order_id)
            .ok_or_else(|| StoreError::order_not_found(reservation.order_id))?;
        if !stored.stock_released {
            stored.stock_released = true;
            if let Some(product) = state.products.get_mut(&reservation.product_id) {
                product.items_available += reservation.quantity_deducted;
            }
            state.record(StoreOperation::ReleaseInventory, reservation.order_id, None);
        }

        match fault {
            Some(fault) => Err(fault.into_error()),
            None => Ok(()),
        }
    }

    async fn initiate_shipping(&self, order_id: OrderId) -> Result<Money> {
        self.simulate_latency(StoreOperation::InitiateShipping).await;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let fault = state.take_fault(StoreOperation::InitiateShipping);
        if let Some(fault @ (Fault::Connection | Fault::Transaction)) = fault {
            return Err(fault.into_error());
        }

        let stored = state.order_mut(order_id)?;
        let from = stored.order.status;
        let to = OrderStatus::ShippingInitiated;
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { order_id, from, to });
        }
        stored.order.status = to;
        let total_price = stored.order.total_price;
        state.record(StoreOperation::InitiateShipping, order_id, Some(to));

        match fault {
            Some(fault) => Err(fault.into_error()),
            None => Ok(total_price),
        }
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        self.simulate_latency(StoreOperation::UpdateStatus).await;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let fault = state.take_fault(StoreOperation::UpdateStatus);
        if let Some(fault @ (Fault::Connection | Fault::Transaction)) = fault {
            return Err(fault.into_error());
        }

        let stored = state.order_mut(order_id)?;
        let from = stored.order.status;
        if !from.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                order_id,
                from,
                to: status,
            });
        }
        stored.order.status = status;
        state.record(StoreOperation::UpdateStatus, order_id, Some(status));

        match fault {
            Some(fault) => Err(fault.into_error()),
            None => Ok(()),
        }
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).map(|stored| stored.order.clone()))
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&product_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::UserId;

    async fn store_with_product(items_available: i32, price: Money) -> (InMemoryOrderStore, ProductId) {
        let store = InMemoryOrderStore::new();
        let product_id = ProductId::new();
        store
            .insert_product(Product::new(product_id, items_available, price))
            .await;
        (store, product_id)
    }

    #[tokio::test]
    async fn reserve_decrements_stock_and_creates_order() {
        let (store, product_id) = store_with_product(10, Money::from_dollars(100)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 2);

        let result = store.reserve_inventory(&request).await.unwrap();
        assert_eq!(result.product_id, product_id);
        assert_eq!(result.quantity_deducted, 2);

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.items_available, 8);

        let order = store.get_order(result.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::AddedToCart);
        assert_eq!(order.total_price, Money::from_cents(20_000));
        assert_eq!(order.user_id, request.user_id);
        assert_eq!(order.products, request.line_items());
    }

    #[tokio::test]
    async fn reserve_with_insufficient_stock_changes_nothing() {
        let (store, product_id) = store_with_product(1, Money::from_dollars(100)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 5);

        let err = store.reserve_inventory(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "insufficient stock: available 1, requested 5");

        assert_eq!(store.order_count().await, 0);
        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.items_available, 1);
    }

    #[tokio::test]
    async fn reserve_with_out_of_range_total_changes_nothing() {
        let price = Money::from_cents(999_999_999_999);
        let (store, product_id) = store_with_product(i32::MAX, price).await;
        let request = OrderRequest::new(UserId::new(), product_id, 100_000_000);

        let err = store.reserve_inventory(&request).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::TotalOutOfRange {
                quantity: 100_000_000,
                ..
            }
        ));
        assert!(!err.is_transient());

        assert_eq!(store.order_count().await, 0);
        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.items_available, i32::MAX);
    }

    #[tokio::test]
    async fn reserve_unknown_product_is_not_found() {
        let store = InMemoryOrderStore::new();
        let request = OrderRequest::new(UserId::new(), ProductId::new(), 1);

        let err = store.reserve_inventory(&request).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn same_request_twice_creates_two_orders() {
        let (store, product_id) = store_with_product(10, Money::from_dollars(1)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 3);

        let first = store.reserve_inventory(&request).await.unwrap();
        let second = store.reserve_inventory(&request).await.unwrap();

        assert_ne!(first.order_id, second.order_id);
        assert_eq!(store.order_count().await, 2);
        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.items_available, 4);
    }

    #[tokio::test]
    async fn release_is_applied_once() {
        let (store, product_id) = store_with_product(5, Money::from_dollars(1)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 5);
        let reservation = store.reserve_inventory(&request).await.unwrap();

        store.release_inventory(&reservation).await.unwrap();
        store.release_inventory(&reservation).await.unwrap();

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.items_available, 5);
        assert_eq!(
            store.operations_for(reservation.order_id).await,
            vec![
                StoreOperation::ReserveInventory,
                StoreOperation::ReleaseInventory
            ]
        );
    }

    #[tokio::test]
    async fn initiate_shipping_returns_total() {
        let (store, product_id) = store_with_product(5, Money::from_cents(250)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 4);
        let reservation = store.reserve_inventory(&request).await.unwrap();

        let total = store.initiate_shipping(reservation.order_id).await.unwrap();
        assert_eq!(total, Money::from_cents(1_000));

        let order = store.get_order(reservation.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::ShippingInitiated);
    }

    #[tokio::test]
    async fn initiate_shipping_for_missing_order() {
        let store = InMemoryOrderStore::new();
        let err = store.initiate_shipping(OrderId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "order", .. }));
    }

    #[tokio::test]
    async fn update_status_enforces_transitions() {
        let (store, product_id) = store_with_product(5, Money::from_cents(250)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 1);
        let reservation = store.reserve_inventory(&request).await.unwrap();

        let err = store
            .update_status(reservation.order_id, OrderStatus::OrderDelivered)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store.initiate_shipping(reservation.order_id).await.unwrap();
        store
            .update_status(reservation.order_id, OrderStatus::PaymentRefunded)
            .await
            .unwrap();
        store
            .update_status(reservation.order_id, OrderStatus::PaymentRefunded)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn injected_faults_fire_in_order() {
        let (store, product_id) = store_with_product(5, Money::from_cents(250)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 1);
        store
            .inject_fault(StoreOperation::ReserveInventory, Fault::Connection, 1)
            .await;

        let err = store.reserve_inventory(&request).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.order_count().await, 0);

        store.reserve_inventory(&request).await.unwrap();
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn lost_ack_applies_the_change() {
        let (store, product_id) = store_with_product(5, Money::from_cents(250)).await;
        let request = OrderRequest::new(UserId::new(), product_id, 2);
        let reservation = store.reserve_inventory(&request).await.unwrap();
        store
            .inject_fault(StoreOperation::ReleaseInventory, Fault::LostAck, 1)
            .await;

        assert!(store.release_inventory(&reservation).await.is_err());
        store.release_inventory(&reservation).await.unwrap();

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.items_available, 5);
    }

    #[tokio::test]
    async fn latency_delays_only_its_operation() {
        let (store, product_id) = store_with_product(5, Money::from_cents(250)).await;
        store
            .set_latency(StoreOperation::ReserveInventory, Duration::from_millis(100))
            .await;

        let request = OrderRequest::new(UserId::new(), product_id, 1);
        let started = tokio::time::Instant::now();
        let reservation = store.reserve_inventory(&request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));

        let started = tokio::time::Instant::now();
        store.release_inventory(&reservation).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
