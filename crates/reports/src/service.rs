//! Report queries.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{CountStatus, ItemId, Role, UserId};
use domain::{Caller, DomainError};
use store::{CountOrder, CountQuery, CountRecord, InventoryStore, ItemQuery, Page};

use crate::views::{
    self, CountBrief, CountSummary, Dashboard, ItemDiscrepancies, LowStockEntry,
    PersonalDashboard, ReviewerDashboard,
};

/// Default threshold of the discrepancy report, in percent.
pub const DEFAULT_MIN_VARIANCE: f64 = 10.0;

const REVIEWER_WINDOW_DAYS: i64 = 7;
const PERSONAL_WINDOW_DAYS: i64 = 30;
const TOP_DISCREPANCIES: usize = 5;

/// Builds dashboards and reports from the current store contents.
pub struct ReportService<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> ReportService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn item_names(&self) -> Result<HashMap<ItemId, String>, DomainError> {
        let items = self.store.list_items(ItemQuery::default()).await?;
        Ok(items.into_iter().map(|item| (item.id, item.name)).collect())
    }

    /// Dashboard for the caller: the reviewer view for managers and admins,
    /// the caller's own counts for everyone else.
    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self, caller: &Caller) -> Result<Dashboard, DomainError> {
        self.dashboard_at(caller, Utc::now()).await
    }

    pub async fn dashboard_at(
        &self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Dashboard, DomainError> {
        if caller.role.can_review() {
            self.reviewer_dashboard(now).await.map(Dashboard::Reviewer)
        } else {
            self.personal_dashboard(caller.user_id, now)
                .await
                .map(Dashboard::Personal)
        }
    }

    async fn reviewer_dashboard(&self, now: DateTime<Utc>) -> Result<ReviewerDashboard, DomainError> {
        let since = now - Duration::days(REVIEWER_WINDOW_DAYS);

        let items = self.store.list_items(ItemQuery::default()).await?;
        let low_stock_count = items.iter().filter(|item| item.is_low_stock()).count();
        let pending = self
            .store
            .list_counts(CountQuery::with_status(CountStatus::Submitted))
            .await?;

        let recent = self
            .store
            .list_counts(CountQuery {
                created_since: Some(since),
                order: CountOrder::CreatedAtDesc,
                ..Default::default()
            })
            .await?;

        let approved: Vec<CountRecord> = recent
            .iter()
            .filter(|count| count.status == CountStatus::Approved)
            .cloned()
            .collect();
        let names: HashMap<ItemId, String> = items
            .iter()
            .map(|item| (item.id, item.name.clone()))
            .collect();

        Ok(ReviewerDashboard {
            total_items: items.len(),
            low_stock_count,
            pending_approvals: pending.len(),
            recent_counts: recent.iter().map(CountBrief::from).collect(),
            top_discrepancies: views::top_discrepancies(&approved, &names, TOP_DISCREPANCIES),
        })
    }

    async fn personal_dashboard(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<PersonalDashboard, DomainError> {
        let mut drafts = CountQuery::for_creator(user_id);
        drafts.status = Some(CountStatus::Draft);
        let active = self.store.list_counts(drafts).await?;

        let mut recent = CountQuery::for_creator(user_id);
        recent.created_since = Some(now - Duration::days(PERSONAL_WINDOW_DAYS));
        recent.order = CountOrder::CreatedAtDesc;
        let recent = self.store.list_counts(recent).await?;

        Ok(PersonalDashboard {
            active_counts: active.iter().map(CountBrief::from).collect(),
            recent_counts: recent.iter().map(CountBrief::from).collect(),
        })
    }

    /// Every count dated within `[start, end]`, newest date first.
    /// `end` defaults to today.
    #[tracing::instrument(skip(self))]
    pub async fn count_summary(
        &self,
        caller: &Caller,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CountSummary>, DomainError> {
        caller.require(Role::Manager, "view reports")?;
        let end = end.unwrap_or_else(|| Utc::now().date_naive());

        let counts = self
            .store
            .list_counts(CountQuery {
                from_date: Some(start),
                to_date: Some(end),
                order: CountOrder::CountDateDesc,
                page: Page::all(),
                ..Default::default()
            })
            .await?;

        let user_ids: HashSet<UserId> = counts
            .iter()
            .flat_map(|count| std::iter::once(count.created_by).chain(count.reviewed_by))
            .collect();
        let mut names = HashMap::with_capacity(user_ids.len());
        for id in user_ids {
            if let Some(user) = self.store.get_user(id).await? {
                names.insert(id, user.full_name);
            }
        }

        Ok(counts
            .iter()
            .map(|count| CountSummary {
                id: count.id,
                date: count.count_date,
                staff: views::user_label(&names, count.created_by),
                status: count.status,
                total_items: count.lines.len(),
                submitted_at: count.submitted_at,
                reviewed_at: count.reviewed_at,
                reviewer: count.reviewed_by.map(|id| views::user_label(&names, id)),
            })
            .collect())
    }

    /// Significant discrepancies of approved counts dated within
    /// `[start, end]` whose variance is at least `min_variance` percent.
    #[tracing::instrument(skip(self))]
    pub async fn discrepancies(
        &self,
        caller: &Caller,
        start: NaiveDate,
        end: Option<NaiveDate>,
        min_variance: Option<f64>,
    ) -> Result<Vec<ItemDiscrepancies>, DomainError> {
        caller.require(Role::Manager, "view reports")?;

        let min_variance = min_variance.unwrap_or(DEFAULT_MIN_VARIANCE);
        if !(min_variance > 0.0 && min_variance <= 100.0) {
            return Err(DomainError::Validation(
                "min_variance_percentage must be greater than 0 and at most 100".to_string(),
            ));
        }
        let end = end.unwrap_or_else(|| Utc::now().date_naive());

        let counts = self
            .store
            .list_counts(CountQuery {
                status: Some(CountStatus::Approved),
                from_date: Some(start),
                to_date: Some(end),
                ..Default::default()
            })
            .await?;
        let names = self.item_names().await?;

        Ok(views::group_discrepancies(&counts, &names, min_variance))
    }

    /// Items below par with how many units they are short.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock(&self, caller: &Caller) -> Result<Vec<LowStockEntry>, DomainError> {
        caller.require(Role::Manager, "view reports")?;
        let items = self.store.list_items(ItemQuery::low_stock()).await?;
        Ok(items.into_iter().map(LowStockEntry::from).collect())
    }
}
