//! Shared identifiers and vocabulary used by every layer of the inventory
//! count system.

mod category;
mod role;
mod status;
mod types;

pub use category::ItemCategory;
pub use role::Role;
pub use status::CountStatus;
pub use types::{CountId, CountLineId, ItemId, UserId};

use thiserror::Error;

/// Error returned when parsing one of the shared enums from its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
