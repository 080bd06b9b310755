use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::OrderStatus;

/// Input to one saga execution.
///
/// Two identical requests are two independent orders; nothing is deduplicated
/// by request contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(rename = "productID", alias = "productid")]
    pub product_id: ProductId,
    #[serde(rename = "productQuantity")]
    pub product_quantity: i32,
}

impl OrderRequest {
    /// Creates a new request.
    pub fn new(user_id: UserId, product_id: ProductId, product_quantity: i32) -> Self {
        Self {
            user_id,
            product_id,
            product_quantity,
        }
    }

    /// Checks that the requested quantity is a positive integer.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.product_quantity <= 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: self.product_quantity,
            });
        }
        Ok(())
    }

    /// Total price of this request at the given unit price.
    ///
    /// `None` if the total does not fit the order's `NUMERIC(12,2)` column.
    pub fn total_for(&self, unit_price: Money) -> Option<Money> {
        unit_price
            .checked_multiply(self.product_quantity.unsigned_abs())
            .filter(|total| total.cents() <= Order::MAX_TOTAL_CENTS)
    }

    /// The line-item description stored on the order row.
    pub fn line_items(&self) -> LineItems {
        LineItems {
            product_id: self.product_id,
            quantity: self.product_quantity,
        }
    }
}

/// A row of the `products` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub items_available: i32,
    pub price: Money,
}

impl Product {
    pub fn new(id: ProductId, items_available: i32, price: Money) -> Self {
        Self {
            id,
            items_available,
            price,
        }
    }
}

/// Serialized line-item description kept in `orders.products`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItems {
    #[serde(rename = "productID")]
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A row of the `orders` table. Never deleted; its id correlates the saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub products: LineItems,
    pub total_price: Money,
    pub status: OrderStatus,
}

impl Order {
    /// Largest total, in cents, the `orders.total_price` column can hold.
    pub const MAX_TOTAL_CENTS: i64 = 999_999_999_999;
}
