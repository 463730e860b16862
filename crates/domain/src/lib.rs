//! Domain layer for the inventory-count backend.
//!
//! This crate provides:
//! - The [`Caller`] passed to every operation and the role gate around it
//! - Catalog item management
//! - The count aggregate, its lifecycle service and stock write-back on approval
//! - User accounts and credential checks

pub mod access;
pub mod catalog;
pub mod count;
pub mod error;
pub mod paging;
pub mod users;

pub use access::Caller;
pub use catalog::{CatalogError, CatalogService, ItemChanges, NewItem};
pub use count::{
    Count, CountError, CountHandler, CountLine, CountService, LineInput, LineUpdate, NewCount,
    NewLine, Review, Tally,
};
pub use error::{DomainError, ErrorKind};
pub use paging::PageRequest;
pub use users::{NewUser, UserChanges, UserService};
