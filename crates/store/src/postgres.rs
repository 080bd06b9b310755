use async_trait::async_trait;
use domain::{
    InventoryResult, LineItems, Money, Order, OrderId, OrderRequest, OrderStatus, Product,
    ProductId, UserId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderStore, Result, StoreError};

/// PostgreSQL-backed product/order store.
///
/// The pool is the only shared handle; each call checks out one connection
/// (or one transaction) for its own duration. Dropping an uncommitted
/// `sqlx::Transaction` rolls it back, so every early return leaves the
/// database untouched.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let products: serde_json::Value = row.try_get("products")?;
        let products: LineItems = serde_json::from_value(products)?;
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("userid")?),
            products,
            total_price: Money::from_cents(row.try_get("total_cents")?),
            status: status.parse()?,
        })
    }

    /// Reads the current status of an order, or `NotFound`.
    async fn current_status(&self, order_id: OrderId) -> Result<OrderStatus> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match status {
            Some(status) => Ok(status.parse()?),
            None => Err(StoreError::order_not_found(order_id)),
        }
    }

    /// Explains why a guarded status update touched no row.
    async fn rejected_transition(&self, order_id: OrderId, to: OrderStatus) -> StoreError {
        match self.current_status(order_id).await {
            Ok(from) => StoreError::InvalidTransition { order_id, from, to },
            Err(err) => err,
        }
    }
}

fn status_strings(statuses: &[OrderStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self), fields(product_id = %request.product_id))]
    async fn reserve_inventory(&self, request: &OrderRequest) -> Result<InventoryResult> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::transaction("begin"))?;

        let row = sqlx::query(
            r#"
            SELECT items_available, (price * 100)::BIGINT AS price_cents
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(request.product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::product_not_found(request.product_id))?;

        let current_stock: i32 = row.try_get("items_available")?;
        let price = Money::from_cents(row.try_get("price_cents")?);

        if current_stock < request.product_quantity {
            return Err(StoreError::InsufficientStock {
                available: current_stock,
                requested: request.product_quantity,
            });
        }

        let total_price = request
            .total_for(price)
            .ok_or(StoreError::TotalOutOfRange {
                unit_price: price,
                quantity: request.product_quantity,
            })?;

        sqlx::query("UPDATE products SET items_available = $1 WHERE id = $2")
            .bind(current_stock - request.product_quantity)
            .bind(request.product_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let order_id = OrderId::new();
        let products = serde_json::to_value(request.line_items())?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, userID, products, total_price, status)
            VALUES ($1, $2, $3, $4::BIGINT::NUMERIC / 100, $5)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(request.user_id.as_uuid())
        .bind(products)
        .bind(total_price.cents())
        .bind(OrderStatus::AddedToCart.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(StoreError::transaction("commit"))?;

        Ok(InventoryResult {
            product_id: request.product_id,
            quantity_deducted: request.product_quantity,
            order_id,
        })
    }

    #[tracing::instrument(skip(self), fields(order_id = %reservation.order_id))]
    async fn release_inventory(&self, reservation: &InventoryResult) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::transaction("begin"))?;

        // The flag flip and the stock credit commit together, so a retried
        // release finds the flag set and credits nothing.
        let flipped = sqlx::query(
            "UPDATE orders SET stock_released = TRUE WHERE id = $1 AND NOT stock_released",
        )
        .bind(reservation.order_id.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if flipped == 0 {
            let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1")
                .bind(reservation.order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(StoreError::order_not_found(reservation.order_id));
            }
            tracing::debug!("stock already released");
            return Ok(());
        }

        let updated = sqlx::query(
            "UPDATE products SET items_available = items_available + $1 WHERE id = $2",
        )
        .bind(reservation.quantity_deducted)
        .bind(reservation.product_id.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::product_not_found(reservation.product_id));
        }

        tx.commit().await.map_err(StoreError::transaction("commit"))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn initiate_shipping(&self, order_id: OrderId) -> Result<Money> {
        let to = OrderStatus::ShippingInitiated;
        let total_cents: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $1
            WHERE id = $2 AND status = ANY($3)
            RETURNING (total_price * 100)::BIGINT
            "#,
        )
        .bind(to.as_str())
        .bind(order_id.as_uuid())
        .bind(status_strings(&to.predecessors()))
        .fetch_optional(&self.pool)
        .await?;

        match total_cents {
            Some(cents) => Ok(Money::from_cents(cents)),
            None => Err(self.rejected_transition(order_id, to).await),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::transaction("begin"))?;

        let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = ANY($3)")
            .bind(status.as_str())
            .bind(order_id.as_uuid())
            .bind(status_strings(&status.predecessors()))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            drop(tx);
            return Err(self.rejected_transition(order_id, status).await);
        }

        tx.commit().await.map_err(StoreError::transaction("commit"))?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, userID, products, (total_price * 100)::BIGINT AS total_cents, status
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, items_available, (price * 100)::BIGINT AS price_cents FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<Product> {
            Ok(Product {
                id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
                items_available: row.try_get("items_available")?,
                price: Money::from_cents(row.try_get("price_cents")?),
            })
        })
        .transpose()
    }
}
