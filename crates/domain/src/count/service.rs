//! Count service: the lifecycle operations callers invoke.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use common::{CountId, CountStatus, ItemId, Role};
use store::{CountOrder, CountQuery, InventoryStore};

use crate::access::Caller;
use crate::error::DomainError;
use crate::paging::PageRequest;

use super::{Count, CountHandler, LineInput, LineUpdate};

/// Input for opening a count.
#[derive(Debug, Clone, Default)]
pub struct NewCount {
    /// Defaults to today (UTC).
    pub count_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// A counted quantity for one catalog item.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub item_id: ItemId,
    pub actual_quantity: i32,
    pub notes: Option<String>,
}

/// A reviewer's decision on a submitted count.
#[derive(Debug, Clone)]
pub struct Review {
    pub approved: bool,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
}

impl Review {
    pub fn approve() -> Self {
        Self {
            approved: true,
            rejection_reason: None,
            notes: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            rejection_reason: Some(reason.into()),
            notes: None,
        }
    }
}

fn ensure_can_edit(caller: &Caller, count: &Count) -> Result<(), DomainError> {
    if caller.can_edit_count(count.created_by()) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "Not authorized to modify this count".to_string(),
        ))
    }
}

/// Service for the count lifecycle.
///
/// Wraps the [`CountHandler`] and adds the caller checks: staff act on their
/// own counts, managers and admins on any count.
pub struct CountService<S: InventoryStore> {
    handler: CountHandler<S>,
}

impl<S: InventoryStore> CountService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CountHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CountHandler<S> {
        &self.handler
    }

    /// Opens a draft for the caller.
    ///
    /// Fails with `Conflict` when the caller already holds a draft for the date.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, caller: &Caller, input: NewCount) -> Result<Count, DomainError> {
        let count_date = input.count_date.unwrap_or_else(|| Utc::now().date_naive());
        let count = self
            .handler
            .create(Count::open(caller.user_id, count_date, input.notes))
            .await?;

        metrics::counter!("counts_created_total").increment(1);
        tracing::info!(count_id = %count.id(), %count_date, "Count created");
        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, caller: &Caller, id: CountId) -> Result<Count, DomainError> {
        let count = self.handler.load(id).await?;
        if !caller.can_view_count(count.created_by()) {
            return Err(DomainError::Forbidden(
                "Not authorized to view this count".to_string(),
            ));
        }
        Ok(count)
    }

    /// Lists counts, most recent count date first. Staff see only their own.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, caller: &Caller, page: PageRequest) -> Result<Vec<Count>, DomainError> {
        let mut query = if caller.role.sees_all_counts() {
            CountQuery::new()
        } else {
            CountQuery::for_creator(caller.user_id)
        };
        query.order = CountOrder::CountDateDesc;
        query.page = page.page();

        let records = self.handler.store().list_counts(query).await?;
        Ok(records.into_iter().map(Count::from).collect())
    }

    /// Submitted counts awaiting review, newest submission first.
    #[tracing::instrument(skip(self))]
    pub async fn pending(
        &self,
        caller: &Caller,
        page: PageRequest,
    ) -> Result<Vec<Count>, DomainError> {
        caller.require(Role::Manager, "view pending counts")?;

        let mut query = CountQuery::with_status(CountStatus::Submitted);
        query.order = CountOrder::SubmittedAtDesc;
        query.page = page.page();

        let records = self.handler.store().list_counts(query).await?;
        Ok(records.into_iter().map(Count::from).collect())
    }

    /// Adds one line. See [`CountService::add_lines`].
    pub async fn add_line(
        &self,
        caller: &Caller,
        id: CountId,
        line: NewLine,
    ) -> Result<Count, DomainError> {
        self.add_lines(caller, id, vec![line]).await
    }

    /// Adds lines in one unit of work, snapshotting each item's current
    /// quantity as the expected quantity.
    ///
    /// Adding an item that is already on the count replaces its actual
    /// quantity and notes but keeps the original snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn add_lines(
        &self,
        caller: &Caller,
        id: CountId,
        lines: Vec<NewLine>,
    ) -> Result<Count, DomainError> {
        // Report ownership and state problems before item lookups
        let current = self.handler.load(id).await?;
        ensure_can_edit(caller, &current)?;
        current.ensure_editable()?;

        let mut snapshots: HashMap<ItemId, i32> = HashMap::new();
        for line in &lines {
            if snapshots.contains_key(&line.item_id) {
                continue;
            }
            let item = self
                .handler
                .store()
                .get_item(line.item_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Item", line.item_id))?;
            snapshots.insert(item.id, item.current_quantity);
        }

        let inputs: Vec<LineInput> = lines
            .into_iter()
            .map(|line| LineInput {
                item_id: line.item_id,
                expected_quantity: snapshots.get(&line.item_id).copied().unwrap_or_default(),
                actual_quantity: line.actual_quantity,
                notes: line.notes,
            })
            .collect();

        self.handler
            .execute(id, |count| {
                ensure_can_edit(caller, count)?;
                count.add_lines(inputs.clone(), Utc::now())?;
                Ok(vec![])
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_line(
        &self,
        caller: &Caller,
        id: CountId,
        item_id: ItemId,
        update: LineUpdate,
    ) -> Result<Count, DomainError> {
        self.handler
            .execute(id, |count| {
                ensure_can_edit(caller, count)?;
                count.update_line(item_id, update.clone(), Utc::now())?;
                Ok(vec![])
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        caller: &Caller,
        id: CountId,
        item_id: ItemId,
    ) -> Result<Count, DomainError> {
        self.handler
            .execute(id, |count| {
                ensure_can_edit(caller, count)?;
                count.remove_line(item_id, Utc::now())?;
                Ok(vec![])
            })
            .await
    }

    /// Submits a draft for review. Only its creator may submit it.
    #[tracing::instrument(skip(self))]
    pub async fn submit(
        &self,
        caller: &Caller,
        id: CountId,
        notes: Option<String>,
    ) -> Result<Count, DomainError> {
        let count = self
            .handler
            .execute(id, |count| {
                if !caller.is(count.created_by()) {
                    return Err(DomainError::Forbidden(
                        "Not authorized to submit this count".to_string(),
                    ));
                }
                count.submit(notes.clone(), Utc::now())?;
                Ok(vec![])
            })
            .await?;

        metrics::counter!("counts_submitted_total").increment(1);
        tracing::info!(count_id = %id, lines = count.lines().len(), "Count submitted");
        Ok(count)
    }

    /// Approves or rejects a submitted count.
    ///
    /// Approval writes each line's actual quantity to its item in the same
    /// unit of work; if any item no longer exists nothing is applied.
    #[tracing::instrument(skip(self))]
    pub async fn review(
        &self,
        caller: &Caller,
        id: CountId,
        review: Review,
    ) -> Result<Count, DomainError> {
        caller.require(Role::Manager, "review counts")?;

        let count = self
            .handler
            .execute(id, |count| {
                let now = Utc::now();
                if review.approved {
                    Ok(count.approve(caller.user_id, review.notes.clone(), now)?)
                } else {
                    count.reject(
                        caller.user_id,
                        review.rejection_reason.clone(),
                        review.notes.clone(),
                        now,
                    )?;
                    Ok(vec![])
                }
            })
            .await?;

        if review.approved {
            metrics::counter!("counts_approved_total").increment(1);
            tracing::info!(count_id = %id, reviewer = %caller.user_id, "Count approved");
        } else {
            metrics::counter!("counts_rejected_total").increment(1);
            tracing::info!(count_id = %id, reviewer = %caller.user_id, "Count rejected");
        }
        Ok(count)
    }

    /// Deletes a draft and its lines.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: &Caller, id: CountId) -> Result<(), DomainError> {
        self.handler
            .delete(id, |count| {
                ensure_can_edit(caller, count)?;
                Ok(count.ensure_deletable()?)
            })
            .await?;

        tracing::info!(count_id = %id, "Count deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{ItemCategory, UserId};
    use store::{InMemoryStore, ItemRecord};

    use super::*;
    use crate::error::ErrorKind;

    struct Fixture {
        store: InMemoryStore,
        service: CountService<InMemoryStore>,
        staff: Caller,
        manager: Caller,
        item: ItemId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let manager = Caller::new(UserId::new(), Role::Manager);
        let now = Utc::now();
        let item = ItemRecord {
            id: ItemId::new(),
            name: "Milk".to_string(),
            description: None,
            category: ItemCategory::Dairy,
            unit_of_measure: "liters".to_string(),
            par_level: 10,
            current_quantity: 5,
            created_by: manager.user_id,
            created_at: now,
            updated_at: now,
        };
        let item_id = item.id;
        store.insert_item(item).await.unwrap();

        Fixture {
            service: CountService::new(store.clone()),
            store,
            staff: Caller::new(UserId::new(), Role::Staff),
            manager,
            item: item_id,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn new_count() -> NewCount {
        NewCount {
            count_date: Some(day()),
            notes: None,
        }
    }

    fn line(item_id: ItemId, actual: i32) -> NewLine {
        NewLine {
            item_id,
            actual_quantity: actual,
            notes: None,
        }
    }

    #[tokio::test]
    async fn second_draft_same_day_conflicts() {
        let f = fixture().await;
        f.service.create(&f.staff, new_count()).await.unwrap();

        let err = f.service.create(&f.staff, new_count()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // A different date is fine
        f.service
            .create(
                &f.staff,
                NewCount {
                    count_date: NaiveDate::from_ymd_opt(2025, 1, 2),
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn same_date_after_submit_succeeds() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 5))
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();

        f.service.create(&f.staff, new_count()).await.unwrap();
    }

    #[tokio::test]
    async fn staff_sees_only_own_counts() {
        let f = fixture().await;
        let other = Caller::new(UserId::new(), Role::Staff);
        let mine = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service.create(&other, new_count()).await.unwrap();

        let listed = f
            .service
            .list(&f.staff, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), mine.id());

        let err = f.service.get(&other, mine.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let counter = Caller::new(UserId::new(), Role::Counter);
        assert!(f.service.get(&counter, mine.id()).await.is_ok());
        let all = f
            .service
            .list(&counter, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn other_staff_cannot_edit_draft() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        let other = Caller::new(UserId::new(), Role::Staff);

        let err = f
            .service
            .add_line(&other, count.id(), line(f.item, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        // Managers may edit anyone's draft
        f.service
            .add_line(&f.manager, count.id(), line(f.item, 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();

        let err = f
            .service
            .add_lines(
                &f.staff,
                count.id(),
                vec![line(f.item, 1), line(ItemId::new(), 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Item", .. }));

        let count = f.service.get(&f.staff, count.id()).await.unwrap();
        assert!(!count.has_lines());
    }

    #[tokio::test]
    async fn only_creator_submits() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 4))
            .await
            .unwrap();

        let err = f
            .service
            .submit(&f.manager, count.id(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn empty_draft_cannot_submit() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();

        let err = f.service.submit(&f.staff, count.id(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn staff_cannot_review_even_own_count() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 4))
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();

        let err = f
            .service
            .review(&f.staff, count.id(), Review::approve())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let counter = Caller::new(UserId::new(), Role::Counter);
        let err = f
            .service
            .review(&counter, count.id(), Review::approve())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn approval_updates_stock() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        let count = f
            .service
            .add_line(&f.staff, count.id(), line(f.item, 8))
            .await
            .unwrap();
        let added = count.line(f.item).unwrap();
        assert_eq!(added.tally.expected(), 5);
        assert_eq!(added.discrepancy(), 3);

        f.service.submit(&f.staff, count.id(), None).await.unwrap();
        let approved = f
            .service
            .review(&f.manager, count.id(), Review::approve())
            .await
            .unwrap();
        assert_eq!(approved.status(), CountStatus::Approved);
        assert_eq!(approved.reviewed_by(), Some(f.manager.user_id));

        let item = f.store.get_item(f.item).await.unwrap().unwrap();
        assert_eq!(item.current_quantity, 8);
    }

    #[tokio::test]
    async fn second_approval_is_invalid_state() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 8))
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();
        f.service
            .review(&f.manager, count.id(), Review::approve())
            .await
            .unwrap();

        let err = f
            .service
            .review(&f.manager, count.id(), Review::approve())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn approval_with_deleted_item_changes_nothing() {
        let f = fixture().await;
        let manager = f.manager;

        // Second item that will be deleted before review
        let now = Utc::now();
        let doomed = ItemRecord {
            id: ItemId::new(),
            name: "Cream".to_string(),
            description: None,
            category: ItemCategory::Dairy,
            unit_of_measure: "liters".to_string(),
            par_level: 2,
            current_quantity: 1,
            created_by: manager.user_id,
            created_at: now,
            updated_at: now,
        };
        let doomed_id = doomed.id;
        f.store.insert_item(doomed).await.unwrap();

        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_lines(
                &f.staff,
                count.id(),
                vec![line(f.item, 8), line(doomed_id, 3)],
            )
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();
        f.store.delete_item(doomed_id).await.unwrap();

        let err = f
            .service
            .review(&manager, count.id(), Review::approve())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let milk = f.store.get_item(f.item).await.unwrap().unwrap();
        assert_eq!(milk.current_quantity, 5);
        let count = f.service.get(&manager, count.id()).await.unwrap();
        assert_eq!(count.status(), CountStatus::Submitted);
    }

    #[tokio::test]
    async fn reject_needs_reason() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 8))
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();

        let err = f
            .service
            .review(
                &f.manager,
                count.id(),
                Review {
                    approved: false,
                    rejection_reason: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let rejected = f
            .service
            .review(&f.manager, count.id(), Review::reject("Recount the dairy shelf"))
            .await
            .unwrap();
        assert_eq!(rejected.status(), CountStatus::Rejected);
        assert_eq!(rejected.rejection_reason(), Some("Recount the dairy shelf"));

        // Stock untouched by rejection
        let milk = f.store.get_item(f.item).await.unwrap().unwrap();
        assert_eq!(milk.current_quantity, 5);
    }

    #[tokio::test]
    async fn pending_lists_submitted_for_managers() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 8))
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();

        let pending = f
            .service
            .pending(&f.manager, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let err = f
            .service
            .pending(&f.staff, PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn delete_only_drafts() {
        let f = fixture().await;
        let count = f.service.create(&f.staff, new_count()).await.unwrap();
        f.service
            .add_line(&f.staff, count.id(), line(f.item, 8))
            .await
            .unwrap();
        f.service.submit(&f.staff, count.id(), None).await.unwrap();

        let err = f.service.delete(&f.staff, count.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let draft = f
            .service
            .create(
                &f.staff,
                NewCount {
                    count_date: NaiveDate::from_ymd_opt(2025, 1, 5),
                    notes: None,
                },
            )
            .await
            .unwrap();
        f.service.delete(&f.staff, draft.id()).await.unwrap();
        let err = f.service.get(&f.staff, draft.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
