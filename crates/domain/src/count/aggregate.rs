//! Count aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::{CountId, CountLineId, CountStatus, ItemId, UserId};
use store::{CountLineRecord, CountRecord, StockChange, Version};

use super::{CountError, Tally};

/// One counted item inside a count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountLine {
    pub id: CountLineId,
    pub item_id: ItemId,
    pub tally: Tally,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CountLine {
    pub fn discrepancy(&self) -> i32 {
        self.tally.discrepancy()
    }

    pub fn has_significant_discrepancy(&self) -> bool {
        self.tally.has_significant_discrepancy()
    }
}

/// A line to add, with the item's quantity at the moment it is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub item_id: ItemId,
    pub expected_quantity: i32,
    pub actual_quantity: i32,
    pub notes: Option<String>,
}

/// Edit of an existing line; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineUpdate {
    pub actual_quantity: Option<i32>,
    pub notes: Option<String>,
}

/// Count aggregate root.
///
/// Owns its lines. Every mutating method checks the current status first and
/// leaves the aggregate untouched when it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Count {
    id: CountId,
    count_date: NaiveDate,
    status: CountStatus,
    created_by: UserId,
    submitted_at: Option<DateTime<Utc>>,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: Version,
    lines: Vec<CountLine>,
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

// Query methods
impl Count {
    pub fn id(&self) -> CountId {
        self.id
    }

    pub fn count_date(&self) -> NaiveDate {
        self.count_date
    }

    pub fn status(&self) -> CountStatus {
        self.status
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn reviewed_by(&self) -> Option<UserId> {
        self.reviewed_by
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Version the count was loaded at, or saved as.
    pub fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn lines(&self) -> &[CountLine] {
        &self.lines
    }

    pub fn line(&self, item_id: ItemId) -> Option<&CountLine> {
        self.lines.iter().find(|line| line.item_id == item_id)
    }

    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Count {
    /// Opens a new draft.
    pub fn open(created_by: UserId, count_date: NaiveDate, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CountId::new(),
            count_date,
            status: CountStatus::Draft,
            created_by,
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            notes,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
            lines: Vec::new(),
        }
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), CountError> {
        if allowed {
            Ok(())
        } else {
            Err(CountError::InvalidStateTransition {
                current: self.status,
                action,
            })
        }
    }

    /// Adds lines, merging into existing lines for the same item.
    ///
    /// A merge keeps the original expected snapshot and replaces actual
    /// quantity and notes. Either every input is applied or none is.
    pub fn add_lines(&mut self, inputs: Vec<LineInput>, now: DateTime<Utc>) -> Result<(), CountError> {
        self.ensure(self.status.can_modify_lines(), "add items to")?;

        let mut lines = self.lines.clone();
        for input in inputs {
            match lines.iter_mut().find(|line| line.item_id == input.item_id) {
                Some(line) => {
                    line.tally = line.tally.with_actual(input.actual_quantity)?;
                    line.notes = input.notes;
                    line.updated_at = now;
                }
                None => lines.push(CountLine {
                    id: CountLineId::new(),
                    item_id: input.item_id,
                    tally: Tally::new(input.expected_quantity, input.actual_quantity)?,
                    notes: input.notes,
                    created_at: now,
                    updated_at: now,
                }),
            }
        }

        self.lines = lines;
        self.updated_at = now;
        Ok(())
    }

    pub fn update_line(
        &mut self,
        item_id: ItemId,
        update: LineUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), CountError> {
        self.ensure(self.status.can_modify_lines(), "modify items of")?;

        let line = self
            .lines
            .iter_mut()
            .find(|line| line.item_id == item_id)
            .ok_or(CountError::LineNotFound { item_id })?;

        if let Some(actual) = update.actual_quantity {
            line.tally = line.tally.with_actual(actual)?;
        }
        if let Some(notes) = update.notes {
            line.notes = Some(notes);
        }
        line.updated_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_line(&mut self, item_id: ItemId, now: DateTime<Utc>) -> Result<(), CountError> {
        self.ensure(self.status.can_modify_lines(), "remove items from")?;

        let position = self
            .lines
            .iter()
            .position(|line| line.item_id == item_id)
            .ok_or(CountError::LineNotFound { item_id })?;
        self.lines.remove(position);
        self.updated_at = now;
        Ok(())
    }

    /// Submits the draft for review. Non-empty notes replace the current ones.
    pub fn submit(&mut self, notes: Option<String>, now: DateTime<Utc>) -> Result<(), CountError> {
        self.ensure(self.status.can_submit(), "submit")?;
        if !self.has_lines() {
            return Err(CountError::NoLines);
        }

        self.status = CountStatus::Submitted;
        self.submitted_at = Some(now);
        if let Some(notes) = non_empty(notes) {
            self.notes = Some(notes);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Approves the count and returns the stock writes that must be committed
    /// with it: each line's actual quantity becomes its item's quantity.
    pub fn approve(
        &mut self,
        reviewer: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StockChange>, CountError> {
        self.ensure(self.status.can_review(), "approve")?;

        self.status = CountStatus::Approved;
        self.mark_reviewed(reviewer, notes, now);

        Ok(self
            .lines
            .iter()
            .map(|line| StockChange::Set {
                item_id: line.item_id,
                quantity: line.tally.actual(),
            })
            .collect())
    }

    /// Rejects the count. The reason is stored verbatim.
    pub fn reject(
        &mut self,
        reviewer: UserId,
        reason: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), CountError> {
        self.ensure(self.status.can_review(), "reject")?;
        let reason = non_empty(reason).ok_or(CountError::RejectionReasonRequired)?;

        self.status = CountStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.mark_reviewed(reviewer, notes, now);
        Ok(())
    }

    fn mark_reviewed(&mut self, reviewer: UserId, notes: Option<String>, now: DateTime<Utc>) {
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        if let Some(notes) = non_empty(notes) {
            self.notes = Some(notes);
        }
        self.updated_at = now;
    }

    /// Fails unless lines may still be added, edited or removed.
    pub fn ensure_editable(&self) -> Result<(), CountError> {
        self.ensure(self.status.can_modify_lines(), "modify items of")
    }

    pub fn ensure_deletable(&self) -> Result<(), CountError> {
        self.ensure(self.status.can_delete(), "delete")
    }
}

impl From<CountRecord> for Count {
    fn from(record: CountRecord) -> Self {
        let lines = record
            .lines
            .into_iter()
            .map(|line| CountLine {
                id: line.id,
                item_id: line.item_id,
                // The stored discrepancy column is ignored and re-derived
                tally: Tally::stored(line.expected_quantity, line.actual_quantity),
                notes: line.notes,
                created_at: line.created_at,
                updated_at: line.updated_at,
            })
            .collect();

        Self {
            id: record.id,
            count_date: record.count_date,
            status: record.status,
            created_by: record.created_by,
            submitted_at: record.submitted_at,
            reviewed_by: record.reviewed_by,
            reviewed_at: record.reviewed_at,
            rejection_reason: record.rejection_reason,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
            version: record.version,
            lines,
        }
    }
}

impl From<&Count> for CountRecord {
    fn from(count: &Count) -> Self {
        CountRecord {
            id: count.id,
            count_date: count.count_date,
            status: count.status,
            created_by: count.created_by,
            submitted_at: count.submitted_at,
            reviewed_by: count.reviewed_by,
            reviewed_at: count.reviewed_at,
            rejection_reason: count.rejection_reason.clone(),
            notes: count.notes.clone(),
            created_at: count.created_at,
            updated_at: count.updated_at,
            version: count.version,
            lines: count
                .lines
                .iter()
                .map(|line| CountLineRecord {
                    id: line.id,
                    item_id: line.item_id,
                    expected_quantity: line.tally.expected(),
                    actual_quantity: line.tally.actual(),
                    discrepancy: line.discrepancy(),
                    notes: line.notes.clone(),
                    created_at: line.created_at,
                    updated_at: line.updated_at,
                })
                .collect(),
        }
    }
}
