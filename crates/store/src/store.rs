use async_trait::async_trait;
use domain::{InventoryResult, Money, Order, OrderId, OrderRequest, OrderStatus, Product, ProductId};

use crate::Result;

/// Persistence operations the saga activities depend on.
///
/// Every call scopes its own connection (and transaction where it mutates
/// more than one row) and releases it before returning, on success and on
/// error alike.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Checks stock, decrements it and creates an `ADDED_TO_CART` order.
    ///
    /// Runs as one transaction: on any error no stock is mutated and no
    /// order is created. Fails with `InsufficientStock` when the product has
    /// fewer items than requested.
    async fn reserve_inventory(&self, request: &OrderRequest) -> Result<InventoryResult>;

    /// Gives the reserved quantity back to the product.
    ///
    /// Applied at most once per order; repeated calls are no-ops.
    async fn release_inventory(&self, reservation: &InventoryResult) -> Result<()>;

    /// Moves the order to `SHIPPING_INITIATED` and returns its total price.
    async fn initiate_shipping(&self, order_id: OrderId) -> Result<Money>;

    /// Writes a new status, enforcing the order status machine.
    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()>;

    /// Loads an order by ID.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads a product by ID.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;
}

/// Names of the mutating store operations, used for logging and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    ReserveInventory,
    ReleaseInventory,
    InitiateShipping,
    UpdateStatus,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::ReserveInventory => "reserve_inventory",
            StoreOperation::ReleaseInventory => "release_inventory",
            StoreOperation::InitiateShipping => "initiate_shipping",
            StoreOperation::UpdateStatus => "update_status",
        }
    }
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
