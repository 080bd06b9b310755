//! Shared types for the order saga workspace.

pub mod ids;
pub mod money;

pub use ids::{OrderId, ProductId, UserId};
pub use money::Money;
