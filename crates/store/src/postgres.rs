use std::collections::HashMap;

use async_trait::async_trait;
use common::{CountId, CountLineId, CountStatus, ItemId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CountLineRecord, CountQuery, CountRecord, ItemQuery, ItemRecord, Page, Result, StoreError,
    UserQuery, UserRecord, Version,
    store::{InventoryStore, SaveOptions, StockChange},
};

const USER_COLUMNS: &str =
    "id, email, hashed_password, full_name, role, is_active, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, name, description, category, unit_of_measure, par_level, current_quantity, created_by, created_at, updated_at";

const COUNT_COLUMNS: &str = "id, count_date, status, created_by, submitted_at, reviewed_by, reviewed_at, rejection_reason, notes, created_at, updated_at, version";

const LINE_COLUMNS: &str = "id, count_id, item_id, expected_quantity, actual_quantity, discrepancy, notes, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_user(row: PgRow) -> Result<UserRecord> {
        Ok(UserRecord {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            hashed_password: row.try_get("hashed_password")?,
            full_name: row.try_get("full_name")?,
            role: row.try_get::<String, _>("role")?.parse()?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<ItemRecord> {
        Ok(ItemRecord {
            id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get::<String, _>("category")?.parse()?,
            unit_of_measure: row.try_get("unit_of_measure")?,
            par_level: row.try_get("par_level")?,
            current_quantity: row.try_get("current_quantity")?,
            created_by: UserId::from_uuid(row.try_get::<Uuid, _>("created_by")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_count(row: PgRow) -> Result<CountRecord> {
        Ok(CountRecord {
            id: CountId::from_uuid(row.try_get::<Uuid, _>("id")?),
            count_date: row.try_get("count_date")?,
            status: row.try_get::<String, _>("status")?.parse()?,
            created_by: UserId::from_uuid(row.try_get::<Uuid, _>("created_by")?),
            submitted_at: row.try_get("submitted_at")?,
            reviewed_by: row
                .try_get::<Option<Uuid>, _>("reviewed_by")?
                .map(UserId::from_uuid),
            reviewed_at: row.try_get("reviewed_at")?,
            rejection_reason: row.try_get("rejection_reason")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
            lines: Vec::new(),
        })
    }

    fn row_to_line(row: &PgRow) -> Result<(CountId, CountLineRecord)> {
        let count_id = CountId::from_uuid(row.try_get::<Uuid, _>("count_id")?);
        let line = CountLineRecord {
            id: CountLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            expected_quantity: row.try_get("expected_quantity")?,
            actual_quantity: row.try_get("actual_quantity")?,
            discrepancy: row.try_get("discrepancy")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };
        Ok((count_id, line))
    }

    /// Loads lines for the given count headers and attaches them in place.
    async fn attach_lines(
        tx: &mut Transaction<'_, Postgres>,
        counts: &mut [CountRecord],
    ) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = counts.iter().map(|c| c.id.as_uuid()).collect();

        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM count_items WHERE count_id = ANY($1) ORDER BY created_at ASC, id ASC"
        ))
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        let mut by_count: HashMap<CountId, Vec<CountLineRecord>> = HashMap::new();
        for row in &rows {
            let (count_id, line) = Self::row_to_line(row)?;
            by_count.entry(count_id).or_default().push(line);
        }
        for count in counts.iter_mut() {
            count.lines = by_count.remove(&count.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Opens a read-only snapshot so headers and lines come from the same
    /// committed state.
    async fn begin_read(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        count_id: CountId,
        lines: &[CountLineRecord],
    ) -> Result<()> {
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO count_items (id, count_id, item_id, expected_quantity, actual_quantity, discrepancy, notes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(count_id.as_uuid())
            .bind(line.item_id.as_uuid())
            .bind(line.expected_quantity)
            .bind(line.actual_quantity)
            .bind(line.discrepancy)
            .bind(&line.notes)
            .bind(line.created_at)
            .bind(line.updated_at)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Applies stock changes inside an open transaction, locking each item row.
    async fn apply_stock_in(
        tx: &mut Transaction<'_, Postgres>,
        changes: &[StockChange],
    ) -> Result<Vec<ItemRecord>> {
        let mut updated: Vec<ItemRecord> = Vec::with_capacity(changes.len());
        for change in changes {
            let item_id = change.item_id();
            let current: Option<i32> = sqlx::query_scalar(
                "SELECT current_quantity FROM items WHERE id = $1 FOR UPDATE",
            )
            .bind(item_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
            let current = current.ok_or(StoreError::ItemNotFound(item_id))?;
            let quantity = change.resolve(current)?;

            let row = sqlx::query(&format!(
                "UPDATE items SET current_quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(item_id.as_uuid())
            .bind(quantity)
            .fetch_one(&mut **tx)
            .await?;
            let item = Self::row_to_item(row)?;

            match updated.iter_mut().find(|i| i.id == item.id) {
                Some(existing) => *existing = item,
                None => updated.push(item),
            }
        }
        Ok(updated)
    }

    fn map_unique(err: sqlx::Error, field: &'static str, value: &str) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return StoreError::UniqueViolation {
                field,
                value: value.to_string(),
            };
        }
        StoreError::Database(err)
    }
}

fn push_page(sql: &mut String, param_count: &mut usize, page: &Page) {
    if page.limit.is_some() {
        *param_count += 1;
        sql.push_str(&format!(" LIMIT ${param_count}"));
    }
    if page.skip > 0 {
        *param_count += 1;
        sql.push_str(&format!(" OFFSET ${param_count}"));
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, hashed_password, full_name, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique(e, "email", &user.email))?;

        Ok(())
    }

    async fn update_user(&self, user: UserRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, hashed_password = $3, full_name = $4, role = $5, is_active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique(e, "email", &user.email))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(user.id));
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::StillReferenced {
                        entity: "user",
                        id: id.to_string(),
                    };
                }
                StoreError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<UserRecord>> {
        let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1");
        let mut param_count = 0;

        if query.role.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND role = ${param_count}"));
        }
        sql.push_str(" ORDER BY email ASC");
        push_page(&mut sql, &mut param_count, &query.page);

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(role) = query.role {
            sqlx_query = sqlx_query.bind(role.as_str());
        }
        if let Some(limit) = query.page.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if query.page.skip > 0 {
            sqlx_query = sqlx_query.bind(query.page.skip as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn insert_item(&self, item: ItemRecord) -> Result<()> {
        StockChange::Set {
            item_id: item.id,
            quantity: item.current_quantity,
        }
        .resolve(0)?;

        sqlx::query(
            r#"
            INSERT INTO items (id, name, description, category, unit_of_measure, par_level, current_quantity, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category.as_str())
        .bind(&item.unit_of_measure)
        .bind(item.par_level)
        .bind(item.current_quantity)
        .bind(item.created_by.as_uuid())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique(e, "name", &item.name))?;

        Ok(())
    }

    async fn update_item(
        &self,
        item: ItemRecord,
        stock: Option<StockChange>,
    ) -> Result<ItemRecord> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE items
            SET name = $2, description = $3, category = $4, unit_of_measure = $5,
                par_level = $6, updated_at = $7
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category.as_str())
        .bind(&item.unit_of_measure)
        .bind(item.par_level)
        .bind(item.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Self::map_unique(e, "name", &item.name))?;
        let mut stored = Self::row_to_item(row.ok_or(StoreError::ItemNotFound(item.id))?)?;

        // The row is already locked by the UPDATE above
        if let Some(change) = stock {
            if change.item_id() != item.id {
                return Err(StoreError::ItemNotFound(change.item_id()));
            }
            if let Some(updated) = Self::apply_stock_in(&mut tx, &[change]).await?.pop() {
                stored = updated;
            }
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn apply_stock(&self, changes: Vec<StockChange>) -> Result<Vec<ItemRecord>> {
        let mut tx = self.pool.begin().await?;
        let updated = Self::apply_stock_in(&mut tx, &changes).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<ItemRecord>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<ItemRecord>> {
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE 1=1");
        let mut param_count = 0;

        if query.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category = ${param_count}"));
        }
        if query.low_stock_only {
            sql.push_str(" AND current_quantity < par_level");
        }
        sql.push_str(" ORDER BY name ASC");
        push_page(&mut sql, &mut param_count, &query.page);

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(category) = query.category {
            sqlx_query = sqlx_query.bind(category.as_str());
        }
        if let Some(limit) = query.page.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if query.page.skip > 0 {
            sqlx_query = sqlx_query.bind(query.page.skip as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn insert_count(&self, count: CountRecord) -> Result<Version> {
        let mut tx = self.pool.begin().await?;

        if count.status == CountStatus::Draft {
            // Creates by the same user serialize on the creator row
            sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(count.created_by.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

            let exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM counts
                    WHERE created_by = $1 AND count_date = $2 AND status = 'draft'
                )
                "#,
            )
            .bind(count.created_by.as_uuid())
            .bind(count.count_date)
            .fetch_one(&mut *tx)
            .await?;

            if exists {
                return Err(StoreError::DuplicateDraft {
                    created_by: count.created_by,
                    count_date: count.count_date,
                });
            }
        }

        let version = Version::first();
        sqlx::query(
            r#"
            INSERT INTO counts (id, count_date, status, created_by, submitted_at, reviewed_by, reviewed_at, rejection_reason, notes, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(count.id.as_uuid())
        .bind(count.count_date)
        .bind(count.status.as_str())
        .bind(count.created_by.as_uuid())
        .bind(count.submitted_at)
        .bind(count.reviewed_by.map(|id| id.as_uuid()))
        .bind(count.reviewed_at)
        .bind(&count.rejection_reason)
        .bind(&count.notes)
        .bind(count.created_at)
        .bind(count.updated_at)
        .bind(version.as_i64())
        .execute(&mut *tx)
        .await?;

        Self::insert_lines(&mut tx, count.id, &count.lines).await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn get_count(&self, id: CountId) -> Result<Option<CountRecord>> {
        let mut tx = self.begin_read().await?;
        let row = sqlx::query(&format!("SELECT {COUNT_COLUMNS} FROM counts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut counts = vec![Self::row_to_count(row)?];
        Self::attach_lines(&mut tx, &mut counts).await?;
        tx.commit().await?;
        Ok(counts.pop())
    }

    async fn list_counts(&self, query: CountQuery) -> Result<Vec<CountRecord>> {
        let mut sql = format!("SELECT {COUNT_COLUMNS} FROM counts WHERE 1=1");
        let mut param_count = 0;

        if query.created_by.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_by = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.from_date.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND count_date >= ${param_count}"));
        }
        if query.to_date.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND count_date <= ${param_count}"));
        }
        if query.created_since.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(query.order.sql());
        push_page(&mut sql, &mut param_count, &query.page);

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(created_by) = query.created_by {
            sqlx_query = sqlx_query.bind(created_by.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(from_date) = query.from_date {
            sqlx_query = sqlx_query.bind(from_date);
        }
        if let Some(to_date) = query.to_date {
            sqlx_query = sqlx_query.bind(to_date);
        }
        if let Some(since) = query.created_since {
            sqlx_query = sqlx_query.bind(since);
        }
        if let Some(limit) = query.page.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if query.page.skip > 0 {
            sqlx_query = sqlx_query.bind(query.page.skip as i64);
        }

        let mut tx = self.begin_read().await?;
        let rows = sqlx_query.fetch_all(&mut *tx).await?;
        let mut counts = rows
            .into_iter()
            .map(Self::row_to_count)
            .collect::<Result<Vec<_>>>()?;
        Self::attach_lines(&mut tx, &mut counts).await?;
        tx.commit().await?;
        Ok(counts)
    }

    async fn save_count(
        &self,
        count: CountRecord,
        options: SaveOptions,
        stock: Vec<StockChange>,
    ) -> Result<Version> {
        let mut tx = self.pool.begin().await?;

        // Lock the header so concurrent writers serialize on the version check
        let stored: Option<i64> =
            sqlx::query_scalar("SELECT version FROM counts WHERE id = $1 FOR UPDATE")
                .bind(count.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let stored = Version::new(stored.ok_or(StoreError::CountNotFound(count.id))?);
        if let Err(err) = options.check(count.id, stored) {
            tracing::debug!(count_id = %count.id, %stored, "count save rejected: stale version");
            return Err(err);
        }

        let new_version = stored.next();
        sqlx::query(
            r#"
            UPDATE counts
            SET count_date = $2, status = $3, submitted_at = $4, reviewed_by = $5, reviewed_at = $6,
                rejection_reason = $7, notes = $8, updated_at = $9, version = $10
            WHERE id = $1
            "#,
        )
        .bind(count.id.as_uuid())
        .bind(count.count_date)
        .bind(count.status.as_str())
        .bind(count.submitted_at)
        .bind(count.reviewed_by.map(|id| id.as_uuid()))
        .bind(count.reviewed_at)
        .bind(&count.rejection_reason)
        .bind(&count.notes)
        .bind(count.updated_at)
        .bind(new_version.as_i64())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM count_items WHERE count_id = $1")
            .bind(count.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        Self::insert_lines(&mut tx, count.id, &count.lines).await?;

        // An error here drops the transaction, rolling back the header too
        if let Err(err) = Self::apply_stock_in(&mut tx, &stock).await {
            tracing::debug!(count_id = %count.id, error = %err, "stock writes rolled back");
            return Err(err);
        }

        tx.commit().await?;
        Ok(new_version)
    }

    async fn delete_count(&self, id: CountId, options: SaveOptions) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<i64> =
            sqlx::query_scalar("SELECT version FROM counts WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(stored) = stored else {
            return Ok(false);
        };
        if let Err(err) = options.check(id, Version::new(stored)) {
            tracing::debug!(count_id = %id, stored, "count delete rejected: stale version");
            return Err(err);
        }

        // count_items rows go with the header (ON DELETE CASCADE)
        sqlx::query("DELETE FROM counts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
