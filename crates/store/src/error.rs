use domain::{DomainError, Money, OrderId, OrderStatus};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when reading or writing products and orders.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be reached or a pooled connection broke.
    #[error("failed to connect to database: {0}")]
    Connection(String),

    /// Beginning, committing or rolling back a transaction failed.
    #[error("failed to {phase} transaction: {message}")]
    Transaction { phase: &'static str, message: String },

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Not enough stock to satisfy a reservation.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    /// The order total does not fit the stored price range.
    #[error("order total out of range: {quantity} x {unit_price}")]
    TotalOutOfRange { unit_price: Money, quantity: i32 },

    /// The order status machine rejected an update.
    #[error("order {order_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Stored data could not be decoded into the domain model.
    #[error("Corrupt row: {0}")]
    CorruptRow(#[from] DomainError),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Shorthand for a missing product row.
    pub fn product_not_found(id: impl Into<Uuid>) -> Self {
        StoreError::NotFound {
            entity: "product",
            id: id.into(),
        }
    }

    /// Shorthand for a missing order row.
    pub fn order_not_found(id: impl Into<Uuid>) -> Self {
        StoreError::NotFound {
            entity: "order",
            id: id.into(),
        }
    }

    /// Returns a mapper for errors raised while managing a transaction.
    ///
    /// Broken connections stay [`StoreError::Connection`].
    pub fn transaction(phase: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
        move |err| match StoreError::from(err) {
            StoreError::Database(err) => StoreError::Transaction {
                phase,
                message: err.to_string(),
            },
            other => other,
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_) | StoreError::Transaction { .. }
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
