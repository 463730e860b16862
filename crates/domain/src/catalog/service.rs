//! Catalog service: item CRUD, low-stock listing and stock adjustments.

use common::{ItemCategory, ItemId, Role};
use store::{InventoryStore, ItemQuery, ItemRecord, StockChange};

use crate::access::Caller;
use crate::error::DomainError;
use crate::paging::PageRequest;

use super::{ItemChanges, NewItem};

/// Service for managing catalog items.
///
/// Every call re-reads the store; nothing is cached.
pub struct CatalogService<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists items ordered by name, optionally filtered by category.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        _caller: &Caller,
        category: Option<ItemCategory>,
        page: PageRequest,
    ) -> Result<Vec<ItemRecord>, DomainError> {
        let query = ItemQuery {
            category,
            low_stock_only: false,
            page: page.page(),
        };
        Ok(self.store.list_items(query).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, _caller: &Caller, id: ItemId) -> Result<ItemRecord, DomainError> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Item", id))
    }

    /// Items whose current quantity is below par.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock(&self, caller: &Caller) -> Result<Vec<ItemRecord>, DomainError> {
        caller.require(Role::Manager, "view low-stock items")?;
        Ok(self.store.list_items(ItemQuery::low_stock()).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, caller: &Caller, item: NewItem) -> Result<ItemRecord, DomainError> {
        caller.require(Role::Manager, "create items")?;
        item.validate()?;

        let record = item.into_record(caller.user_id);
        self.store.insert_item(record.clone()).await?;

        tracing::info!(item_id = %record.id, name = %record.name, "Item created");
        Ok(record)
    }

    /// Applies a partial update. A quantity change is a stock write resolved
    /// by the store, so it never overwrites a concurrent approval.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: ItemId,
        changes: ItemChanges,
    ) -> Result<ItemRecord, DomainError> {
        caller.require(Role::Manager, "update items")?;
        changes.validate()?;

        let mut record = self.get(caller, id).await?;
        let stock = changes.apply_to(&mut record);
        let writes_stock = stock.is_some();
        let updated = self.store.update_item(record, stock).await?;

        if writes_stock {
            metrics::counter!("inventory_stock_writes_total").increment(1);
        }
        Ok(updated)
    }

    /// Adds a signed delta to the item's quantity. The result must stay >= 0.
    #[tracing::instrument(skip(self))]
    pub async fn adjust(
        &self,
        caller: &Caller,
        id: ItemId,
        delta: i32,
    ) -> Result<ItemRecord, DomainError> {
        caller.require(Role::Manager, "adjust stock")?;

        let mut updated = self
            .store
            .apply_stock(vec![StockChange::Adjust { item_id: id, delta }])
            .await?;
        metrics::counter!("inventory_stock_writes_total").increment(1);

        updated
            .pop()
            .ok_or_else(|| DomainError::not_found("Item", id))
    }

    /// Deletes an item. Count history keeps its lines for the item.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: &Caller, id: ItemId) -> Result<(), DomainError> {
        caller.require(Role::Manager, "delete items")?;

        if !self.store.delete_item(id).await? {
            return Err(DomainError::not_found("Item", id));
        }
        tracing::info!(item_id = %id, "Item deleted");
        Ok(())
    }
}
