use chrono::NaiveDate;
use common::{CountId, ItemId, UserId};
use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A count was written with a stale version.
    #[error(
        "Concurrency conflict for count {count_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        count_id: CountId,
        expected: Version,
        actual: Version,
    },

    /// The creator already holds a draft count for that date.
    #[error("User {created_by} already has a draft count for {count_date}")]
    DuplicateDraft {
        created_by: UserId,
        count_date: NaiveDate,
    },

    /// A unique field (user email, item name) is already taken.
    #[error("Duplicate {field}: {value}")]
    UniqueViolation { field: &'static str, value: String },

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Count not found: {0}")]
    CountNotFound(CountId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A stock write would leave an item below zero or above `i32::MAX`.
    #[error("Quantity {quantity} for item {item_id} is out of range")]
    QuantityOutOfRange { item_id: ItemId, quantity: i64 },

    /// A row cannot be deleted while other rows refer to it.
    #[error("{entity} {id} is still referenced")]
    StillReferenced { entity: &'static str, id: String },

    /// A stored value could not be decoded into its domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<common::ParseEnumError> for StoreError {
    fn from(err: common::ParseEnumError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
