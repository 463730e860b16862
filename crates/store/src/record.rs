//! Persisted shapes of users, catalog items and counts.

use chrono::{DateTime, NaiveDate, Utc};
use common::{CountId, CountLineId, CountStatus, ItemCategory, ItemId, Role, UserId};
use serde::{Deserialize, Serialize};

/// Version number of a count, used for optimistic concurrency control.
///
/// A count is stored at version 1 when created and every successful write
/// increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a count that has never been stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version a count gets when first inserted.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A user account row. The credential is an opaque hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub hashed_password: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub category: ItemCategory,
    pub unit_of_measure: String,
    pub par_level: i32,
    pub current_quantity: i32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn is_low_stock(&self) -> bool {
        self.current_quantity < self.par_level
    }
}

/// A count header together with all of its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRecord {
    pub id: CountId,
    pub count_date: NaiveDate,
    pub status: CountStatus,
    pub created_by: UserId,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
    pub lines: Vec<CountLineRecord>,
}

/// One counted item inside a count.
///
/// `discrepancy` is written alongside the quantities for querying, readers
/// should derive it from `actual_quantity - expected_quantity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountLineRecord {
    pub id: CountLineId,
    pub item_id: ItemId,
    pub expected_quantity: i32,
    pub actual_quantity: i32,
    pub discrepancy: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::first().next().as_i64(), 2);
        assert!(Version::new(3) > Version::first());
    }
}
