//! Catalog of stocked items.

mod item;
mod service;

pub use item::{CatalogError, ItemChanges, NewItem};
pub use service::CatalogService;
