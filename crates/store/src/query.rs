use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use common::{CountStatus, ItemCategory, Role, UserId};

use crate::{CountRecord, ItemRecord, UserRecord};

/// Offset/limit window over a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Number of rows to skip.
    pub skip: usize,

    /// Maximum number of rows to return; `None` means unbounded.
    pub limit: Option<usize>,
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }

    /// Every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub(crate) fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let rows = rows.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }
}

/// Filter for listing user accounts, ordered by email.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub page: Page,
}

impl UserQuery {
    pub fn matches(&self, user: &UserRecord) -> bool {
        self.role.is_none_or(|role| user.role == role)
    }
}

/// Filter for listing catalog items, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub category: Option<ItemCategory>,

    /// Only items whose current quantity is below their par level.
    pub low_stock_only: bool,

    pub page: Page,
}

impl ItemQuery {
    /// Every item below par.
    pub fn low_stock() -> Self {
        Self {
            low_stock_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, item: &ItemRecord) -> bool {
        if let Some(category) = self.category
            && item.category != category
        {
            return false;
        }
        !self.low_stock_only || item.is_low_stock()
    }
}

/// Sort order of a count listing. Ties are broken by creation time, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountOrder {
    /// Most recent count date first.
    #[default]
    CountDateDesc,
    /// Most recently submitted first; never-submitted counts last.
    SubmittedAtDesc,
    /// Most recently created first.
    CreatedAtDesc,
}

impl CountOrder {
    pub(crate) fn compare(&self, a: &CountRecord, b: &CountRecord) -> Ordering {
        let primary = match self {
            CountOrder::CountDateDesc => b.count_date.cmp(&a.count_date),
            CountOrder::SubmittedAtDesc => b.submitted_at.cmp(&a.submitted_at),
            CountOrder::CreatedAtDesc => Ordering::Equal,
        };
        primary.then_with(|| b.created_at.cmp(&a.created_at))
    }

    pub(crate) fn sql(&self) -> &'static str {
        match self {
            CountOrder::CountDateDesc => "count_date DESC, created_at DESC",
            CountOrder::SubmittedAtDesc => "submitted_at DESC NULLS LAST, created_at DESC",
            CountOrder::CreatedAtDesc => "created_at DESC",
        }
    }
}

/// Filter for listing counts.
#[derive(Debug, Clone, Default)]
pub struct CountQuery {
    pub created_by: Option<UserId>,
    pub status: Option<CountStatus>,

    /// Earliest count date (inclusive).
    pub from_date: Option<NaiveDate>,

    /// Latest count date (inclusive).
    pub to_date: Option<NaiveDate>,

    /// Only counts created at or after this instant.
    pub created_since: Option<DateTime<Utc>>,

    pub order: CountOrder,
    pub page: Page,
}

impl CountQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts created by a specific user.
    pub fn for_creator(created_by: UserId) -> Self {
        Self {
            created_by: Some(created_by),
            ..Default::default()
        }
    }

    /// Counts in a specific status.
    pub fn with_status(status: CountStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, count: &CountRecord) -> bool {
        if let Some(created_by) = self.created_by
            && count.created_by != created_by
        {
            return false;
        }
        if let Some(status) = self.status
            && count.status != status
        {
            return false;
        }
        if let Some(from) = self.from_date
            && count.count_date < from
        {
            return false;
        }
        if let Some(to) = self.to_date
            && count.count_date > to
        {
            return false;
        }
        if let Some(since) = self.created_since
            && count.created_at < since
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_applies_skip_and_limit() {
        let rows: Vec<i32> = (0..10).collect();
        assert_eq!(Page::new(2, 3).apply(rows.clone()), vec![2, 3, 4]);
        assert_eq!(Page::all().apply(rows.clone()).len(), 10);
        assert!(Page::new(20, 5).apply(rows).is_empty());
    }
}
