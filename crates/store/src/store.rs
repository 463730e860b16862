use async_trait::async_trait;
use common::{CountId, ItemId, UserId};

use crate::{
    CountQuery, CountRecord, ItemQuery, ItemRecord, Result, StoreError, UserQuery, UserRecord,
    Version,
};

/// Options for writing a count back to the store.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Expected stored version for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl SaveOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the count to be stored at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    pub(crate) fn check(&self, count_id: CountId, actual: Version) -> Result<()> {
        match self.expected_version {
            Some(expected) if expected != actual => Err(StoreError::ConcurrencyConflict {
                count_id,
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

/// A write to an item's current quantity.
///
/// Every path that changes stock (direct edits, relative adjustments, count
/// approval) is expressed as a `StockChange` and resolved through
/// [`StockChange::resolve`], so no backend can store a negative quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// Overwrite the quantity.
    Set { item_id: ItemId, quantity: i32 },
    /// Add a signed delta to the quantity.
    Adjust { item_id: ItemId, delta: i32 },
}

impl StockChange {
    pub fn item_id(&self) -> ItemId {
        match self {
            StockChange::Set { item_id, .. } | StockChange::Adjust { item_id, .. } => *item_id,
        }
    }

    /// Computes the new quantity from the current one.
    pub fn resolve(&self, current: i32) -> Result<i32> {
        let next = match *self {
            StockChange::Set { quantity, .. } => i64::from(quantity),
            StockChange::Adjust { delta, .. } => i64::from(current) + i64::from(delta),
        };
        if next < 0 || next > i64::from(i32::MAX) {
            return Err(StoreError::QuantityOutOfRange {
                item_id: self.item_id(),
                quantity: next,
            });
        }
        Ok(next as i32)
    }
}

/// Core trait for store implementations.
///
/// Every method is one unit of work: it either applies completely or leaves
/// the store untouched. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Inserts a user. Fails with `UniqueViolation` if the email is taken.
    async fn insert_user(&self, user: UserRecord) -> Result<()>;

    /// Replaces a stored user. Fails with `UserNotFound` or `UniqueViolation`.
    async fn update_user(&self, user: UserRecord) -> Result<()>;

    /// Deletes a user. Returns false if it did not exist.
    ///
    /// Fails with `StillReferenced` while items or counts point at the user.
    async fn delete_user(&self, id: UserId) -> Result<bool>;

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn list_users(&self, query: UserQuery) -> Result<Vec<UserRecord>>;

    /// Inserts an item. Fails with `UniqueViolation` if the name is taken and
    /// with `QuantityOutOfRange` if the quantity is below zero.
    async fn insert_item(&self, item: ItemRecord) -> Result<()>;

    /// Replaces an item's descriptive fields and returns the stored item.
    ///
    /// `item.current_quantity` is ignored. The quantity changes only through
    /// `stock`, which is resolved against the stored quantity inside the same
    /// unit of work, so a concurrent stock write is never overwritten.
    async fn update_item(
        &self,
        item: ItemRecord,
        stock: Option<StockChange>,
    ) -> Result<ItemRecord>;

    /// Applies stock changes atomically and returns the updated items.
    async fn apply_stock(&self, changes: Vec<StockChange>) -> Result<Vec<ItemRecord>>;

    /// Deletes an item. Returns false if it did not exist.
    ///
    /// Count lines keep their reference to the deleted item.
    async fn delete_item(&self, id: ItemId) -> Result<bool>;

    async fn get_item(&self, id: ItemId) -> Result<Option<ItemRecord>>;

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<ItemRecord>>;

    /// Inserts a new count with its lines.
    ///
    /// A draft count fails with `DuplicateDraft` when its creator already
    /// holds a draft for the same date; the check and the insert happen in
    /// the same unit of work.
    async fn insert_count(&self, count: CountRecord) -> Result<Version>;

    /// Loads a count with all of its lines.
    async fn get_count(&self, id: CountId) -> Result<Option<CountRecord>>;

    async fn list_counts(&self, query: CountQuery) -> Result<Vec<CountRecord>>;

    /// Writes a count header and its full set of lines, together with any
    /// stock changes, as a single unit of work.
    ///
    /// If `options.expected_version` is set and differs from the stored
    /// version, fails with `ConcurrencyConflict`. A stock change targeting a
    /// missing item fails with `ItemNotFound`. In both cases nothing is
    /// written. Returns the new version.
    async fn save_count(
        &self,
        count: CountRecord,
        options: SaveOptions,
        stock: Vec<StockChange>,
    ) -> Result<Version>;

    /// Deletes a count and its lines. Returns false if it did not exist.
    async fn delete_count(&self, id: CountId, options: SaveOptions) -> Result<bool>;
}
