//! Command handling for the count aggregate.

use common::CountId;
use store::{CountRecord, InventoryStore, SaveOptions, StockChange, StoreError};

use crate::error::DomainError;

use super::Count;

/// How many times a command is evaluated against fresh state before a
/// version conflict is reported to the caller.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Handler for executing commands against counts.
///
/// The handler is responsible for:
/// 1. Loading the count and remembering the version it was read at
/// 2. Running the command, which mutates the count and may request stock writes
/// 3. Saving header, lines and stock writes as one unit of work, conditional
///    on the version from step 1
/// 4. Re-running from step 1 when another writer got there first
pub struct CountHandler<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> CountHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a count, failing with `NotFound` if it doesn't exist.
    pub async fn load(&self, id: CountId) -> Result<Count, DomainError> {
        self.load_existing(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Count", id))
    }

    pub async fn load_existing(&self, id: CountId) -> Result<Option<Count>, DomainError> {
        Ok(self.store.get_count(id).await?.map(Count::from))
    }

    /// Persists a newly opened count.
    pub async fn create(&self, mut count: Count) -> Result<Count, DomainError> {
        let version = self.store.insert_count(CountRecord::from(&count)).await?;
        count.set_version(version);
        Ok(count)
    }

    /// Executes a command and persists the result.
    ///
    /// The command receives the freshly loaded count, mutates it and returns
    /// the stock writes to commit alongside it. It may run more than once, so
    /// it must not have side effects outside the count.
    pub async fn execute<F>(&self, id: CountId, mut command: F) -> Result<Count, DomainError>
    where
        F: FnMut(&mut Count) -> Result<Vec<StockChange>, DomainError> + Send,
    {
        let mut attempt = 1;
        loop {
            let mut count = self.load(id).await?;
            let read_version = count.version();

            let stock = command(&mut count)?;
            let stock_writes = stock.len() as u64;

            let result = self
                .store
                .save_count(
                    CountRecord::from(&count),
                    SaveOptions::expect_version(read_version),
                    stock,
                )
                .await;

            match result {
                Ok(version) => {
                    count.set_version(version);
                    if stock_writes > 0 {
                        metrics::counter!("inventory_stock_writes_total").increment(stock_writes);
                    }
                    return Ok(count);
                }
                Err(err @ StoreError::ConcurrencyConflict { .. }) => {
                    metrics::counter!("count_write_conflicts_total").increment(1);
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        return Err(err.into());
                    }
                    tracing::warn!(count_id = %id, attempt, error = %err, "Stale count write, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Deletes a count after `check` accepts its current state.
    pub async fn delete<F>(&self, id: CountId, mut check: F) -> Result<(), DomainError>
    where
        F: FnMut(&Count) -> Result<(), DomainError> + Send,
    {
        let mut attempt = 1;
        loop {
            let count = self.load(id).await?;
            check(&count)?;

            match self
                .store
                .delete_count(id, SaveOptions::expect_version(count.version()))
                .await
            {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(DomainError::not_found("Count", id)),
                Err(err @ StoreError::ConcurrencyConflict { .. }) => {
                    metrics::counter!("count_write_conflicts_total").increment(1);
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        return Err(err.into());
                    }
                    tracing::warn!(count_id = %id, attempt, error = %err, "Stale count delete, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
