//! Order, product and status types.

mod model;
mod status;

pub use model::{LineItems, Order, OrderRequest, Product};
pub use status::OrderStatus;
