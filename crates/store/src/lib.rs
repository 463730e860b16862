//! Persistence layer for the inventory count system.
//!
//! The [`InventoryStore`] trait exposes transactional get/put/delete by id and
//! predicate-filtered listing over three record families (users, catalog
//! items, counts with their lines). Two implementations are provided:
//! [`InMemoryStore`] for tests and single-process runs, and
//! [`PostgresStore`] backed by `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{CountOrder, CountQuery, ItemQuery, Page, UserQuery};
pub use record::{CountLineRecord, CountRecord, ItemRecord, UserRecord, Version};
pub use store::{InventoryStore, SaveOptions, StockChange};
