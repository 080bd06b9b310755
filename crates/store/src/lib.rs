//! Product and order persistence for the order saga.
//!
//! [`OrderStore`] is the data-access contract the saga activities rely on.
//! [`PostgresOrderStore`] is the production implementation and
//! [`InMemoryOrderStore`] mirrors it for tests, with fault injection.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{Fault, InMemoryOrderStore, JournalEntry};
pub use postgres::PostgresOrderStore;
pub use store::{OrderStore, StoreOperation};
