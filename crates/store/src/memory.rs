use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CountId, CountStatus, ItemId, UserId};
use tokio::sync::RwLock;

use crate::{
    CountQuery, CountRecord, ItemQuery, ItemRecord, Result, StoreError, UserQuery, UserRecord,
    Version,
    store::{InventoryStore, SaveOptions, StockChange},
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserRecord>,
    items: HashMap<ItemId, ItemRecord>,
    counts: HashMap<CountId, CountRecord>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn name_taken(&self, name: &str, except: Option<ItemId>) -> bool {
        self.items
            .values()
            .any(|i| Some(i.id) != except && i.name == name)
    }

    /// Resolves every change against the current items without touching them.
    ///
    /// Changes to the same item compose in order.
    fn resolve_stock(&self, changes: &[StockChange]) -> Result<HashMap<ItemId, i32>> {
        let mut resolved: HashMap<ItemId, i32> = HashMap::new();
        for change in changes {
            let item_id = change.item_id();
            let current = match resolved.get(&item_id) {
                Some(quantity) => *quantity,
                None => {
                    self.items
                        .get(&item_id)
                        .ok_or(StoreError::ItemNotFound(item_id))?
                        .current_quantity
                }
            };
            resolved.insert(item_id, change.resolve(current)?);
        }
        Ok(resolved)
    }

    fn write_stock(&mut self, resolved: HashMap<ItemId, i32>) -> Vec<ItemRecord> {
        let now = Utc::now();
        let mut updated = Vec::with_capacity(resolved.len());
        for (item_id, quantity) in resolved {
            if let Some(item) = self.items.get_mut(&item_id) {
                item.current_quantity = quantity;
                item.updated_at = now;
                updated.push(item.clone());
            }
        }
        updated
    }
}

/// In-memory store implementation.
///
/// A single lock guards all tables, so every trait method runs as one
/// serialized unit of work, the same guarantee the PostgreSQL implementation
/// gets from its transactions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored counts.
    pub async fn count_count(&self) -> usize {
        self.tables.read().await.counts.len()
    }

    /// Clears every table.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.users.clear();
        tables.items.clear();
        tables.counts.clear();
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::UniqueViolation {
                field: "email",
                value: user.email,
            });
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn update_user(&self, user: UserRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::UserNotFound(user.id));
        }
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::UniqueViolation {
                field: "email",
                value: user.email,
            });
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(false);
        }
        let referenced = tables.items.values().any(|i| i.created_by == id)
            || tables
                .counts
                .values()
                .any(|c| c.created_by == id || c.reviewed_by == Some(id));
        if referenced {
            return Err(StoreError::StillReferenced {
                entity: "user",
                id: id.to_string(),
            });
        }
        tables.users.remove(&id);
        Ok(true)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<UserRecord>> {
        let tables = self.tables.read().await;
        let mut users: Vec<_> = tables
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(query.page.apply(users))
    }

    async fn insert_item(&self, item: ItemRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.name_taken(&item.name, None) {
            return Err(StoreError::UniqueViolation {
                field: "name",
                value: item.name,
            });
        }
        StockChange::Set {
            item_id: item.id,
            quantity: item.current_quantity,
        }
        .resolve(0)?;
        tables.items.insert(item.id, item);
        Ok(())
    }

    async fn update_item(
        &self,
        mut item: ItemRecord,
        stock: Option<StockChange>,
    ) -> Result<ItemRecord> {
        let mut tables = self.tables.write().await;
        let current = tables
            .items
            .get(&item.id)
            .ok_or(StoreError::ItemNotFound(item.id))?
            .current_quantity;
        if tables.name_taken(&item.name, Some(item.id)) {
            return Err(StoreError::UniqueViolation {
                field: "name",
                value: item.name,
            });
        }

        // Stock only moves through the guarded write, never from the caller's copy
        item.current_quantity = match stock {
            Some(change) if change.item_id() == item.id => change.resolve(current)?,
            Some(change) => return Err(StoreError::ItemNotFound(change.item_id())),
            None => current,
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn apply_stock(&self, changes: Vec<StockChange>) -> Result<Vec<ItemRecord>> {
        let mut tables = self.tables.write().await;
        let resolved = tables.resolve_stock(&changes)?;
        Ok(tables.write_stock(resolved))
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool> {
        Ok(self.tables.write().await.items.remove(&id).is_some())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<ItemRecord>> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<ItemRecord>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|i| query.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(query.page.apply(items))
    }

    async fn insert_count(&self, mut count: CountRecord) -> Result<Version> {
        let mut tables = self.tables.write().await;

        if count.status == CountStatus::Draft {
            let duplicate = tables.counts.values().any(|c| {
                c.status == CountStatus::Draft
                    && c.created_by == count.created_by
                    && c.count_date == count.count_date
            });
            if duplicate {
                return Err(StoreError::DuplicateDraft {
                    created_by: count.created_by,
                    count_date: count.count_date,
                });
            }
        }

        count.version = Version::first();
        tables.counts.insert(count.id, count);
        Ok(Version::first())
    }

    async fn get_count(&self, id: CountId) -> Result<Option<CountRecord>> {
        Ok(self.tables.read().await.counts.get(&id).cloned())
    }

    async fn list_counts(&self, query: CountQuery) -> Result<Vec<CountRecord>> {
        let tables = self.tables.read().await;
        let mut counts: Vec<_> = tables
            .counts
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        counts.sort_by(|a, b| query.order.compare(a, b));
        Ok(query.page.apply(counts))
    }

    async fn save_count(
        &self,
        mut count: CountRecord,
        options: SaveOptions,
        stock: Vec<StockChange>,
    ) -> Result<Version> {
        let mut tables = self.tables.write().await;

        let stored_version = tables
            .counts
            .get(&count.id)
            .ok_or(StoreError::CountNotFound(count.id))?
            .version;
        if let Err(err) = options.check(count.id, stored_version) {
            tracing::debug!(count_id = %count.id, stored = %stored_version, "count save rejected: stale version");
            return Err(err);
        }

        // Resolve every stock change before writing anything.
        let resolved = tables.resolve_stock(&stock).inspect_err(|err| {
            tracing::debug!(count_id = %count.id, error = %err, "stock writes rolled back");
        })?;

        let new_version = stored_version.next();
        count.version = new_version;
        tables.counts.insert(count.id, count);
        tables.write_stock(resolved);

        Ok(new_version)
    }

    async fn delete_count(&self, id: CountId, options: SaveOptions) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.counts.get(&id) else {
            return Ok(false);
        };
        if let Err(err) = options.check(id, stored.version) {
            tracing::debug!(count_id = %id, stored = %stored.version, "count delete rejected: stale version");
            return Err(err);
        }
        tables.counts.remove(&id);
        Ok(true)
    }
}
