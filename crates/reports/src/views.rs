//! Serializable report shapes and the pure functions that build them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use common::{CountId, CountStatus, ItemCategory, ItemId, UserId};
use domain::Tally;
use serde::Serialize;
use store::{CountRecord, ItemRecord};

/// One count in a dashboard list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountBrief {
    pub id: CountId,
    pub date: NaiveDate,
    pub status: CountStatus,
    pub items_count: usize,
}

impl From<&CountRecord> for CountBrief {
    fn from(count: &CountRecord) -> Self {
        Self {
            id: count.id,
            date: count.count_date,
            status: count.status,
            items_count: count.lines.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopDiscrepancy {
    pub item_name: String,
    pub expected: i32,
    pub actual: i32,
    pub discrepancy: i32,
    pub date: NaiveDate,
}

/// Dashboard for managers and admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerDashboard {
    pub total_items: usize,
    pub low_stock_count: usize,
    pub pending_approvals: usize,
    pub recent_counts: Vec<CountBrief>,
    pub top_discrepancies: Vec<TopDiscrepancy>,
}

/// Dashboard for staff and counters: only their own counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalDashboard {
    pub active_counts: Vec<CountBrief>,
    pub recent_counts: Vec<CountBrief>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dashboard {
    Reviewer(ReviewerDashboard),
    Personal(PersonalDashboard),
}

/// Row of the count summary report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountSummary {
    pub id: CountId,
    pub date: NaiveDate,
    pub staff: String,
    pub status: CountStatus,
    pub total_items: usize,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscrepancyEntry {
    pub date: NaiveDate,
    pub expected: i32,
    pub actual: i32,
    pub discrepancy: i32,
    pub variance_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDiscrepancies {
    pub item_name: String,
    pub discrepancies: Vec<DiscrepancyEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowStockEntry {
    pub id: ItemId,
    pub name: String,
    pub category: ItemCategory,
    pub par_level: i32,
    pub current_quantity: i32,
    pub unit_of_measure: String,
    pub deficit: i32,
}

impl From<ItemRecord> for LowStockEntry {
    fn from(item: ItemRecord) -> Self {
        Self {
            deficit: item.par_level - item.current_quantity,
            id: item.id,
            name: item.name,
            category: item.category,
            par_level: item.par_level,
            current_quantity: item.current_quantity,
            unit_of_measure: item.unit_of_measure,
        }
    }
}

/// Name shown for lines whose item has since been deleted.
pub(crate) fn item_label(names: &HashMap<ItemId, String>, id: ItemId) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("Deleted item {id}"))
}

pub(crate) fn user_label(names: &HashMap<UserId, String>, id: UserId) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("Unknown user {id}"))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The `limit` lines with the largest absolute discrepancy.
pub(crate) fn top_discrepancies(
    counts: &[CountRecord],
    names: &HashMap<ItemId, String>,
    limit: usize,
) -> Vec<TopDiscrepancy> {
    let mut rows: Vec<TopDiscrepancy> = counts
        .iter()
        .flat_map(|count| {
            count.lines.iter().map(move |line| {
                let tally = Tally::stored(line.expected_quantity, line.actual_quantity);
                TopDiscrepancy {
                    item_name: item_label(names, line.item_id),
                    expected: tally.expected(),
                    actual: tally.actual(),
                    discrepancy: tally.discrepancy(),
                    date: count.count_date,
                }
            })
        })
        .collect();
    rows.sort_by_key(|row| std::cmp::Reverse(row.discrepancy.unsigned_abs()));
    rows.truncate(limit);
    rows
}

/// Significant discrepancies at or above `min_variance`, grouped by item name
/// in name order, each group in count-date order.
pub(crate) fn group_discrepancies(
    counts: &[CountRecord],
    names: &HashMap<ItemId, String>,
    min_variance: f64,
) -> Vec<ItemDiscrepancies> {
    let mut dated: Vec<&CountRecord> = counts.iter().collect();
    dated.sort_by_key(|count| count.count_date);

    let mut groups: BTreeMap<String, Vec<DiscrepancyEntry>> = BTreeMap::new();
    for count in dated {
        for line in &count.lines {
            let tally = Tally::stored(line.expected_quantity, line.actual_quantity);
            if !tally.has_significant_discrepancy() {
                continue;
            }
            let variance = tally.variance_percentage();
            if variance < min_variance {
                continue;
            }
            groups
                .entry(item_label(names, line.item_id))
                .or_default()
                .push(DiscrepancyEntry {
                    date: count.count_date,
                    expected: tally.expected(),
                    actual: tally.actual(),
                    discrepancy: tally.discrepancy(),
                    variance_percentage: round2(variance),
                });
        }
    }

    groups
        .into_iter()
        .map(|(item_name, discrepancies)| ItemDiscrepancies {
            item_name,
            discrepancies,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::CountLineId;
    use store::{CountLineRecord, Version};

    use super::*;

    fn count(day: u32, lines: Vec<(ItemId, i32, i32)>) -> CountRecord {
        let now = Utc::now();
        CountRecord {
            id: CountId::new(),
            count_date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            status: CountStatus::Approved,
            created_by: UserId::new(),
            submitted_at: Some(now),
            reviewed_by: Some(UserId::new()),
            reviewed_at: Some(now),
            rejection_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
            version: Version::first(),
            lines: lines
                .into_iter()
                .map(|(item_id, expected, actual)| CountLineRecord {
                    id: CountLineId::new(),
                    item_id,
                    expected_quantity: expected,
                    actual_quantity: actual,
                    discrepancy: 0,
                    notes: None,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
        }
    }

    #[test]
    fn groups_by_name_then_date() {
        let milk = ItemId::new();
        let apples = ItemId::new();
        let names = HashMap::from([
            (milk, "Milk".to_string()),
            (apples, "Apples".to_string()),
        ]);
        let counts = vec![
            count(3, vec![(milk, 10, 7), (apples, 20, 20)]),
            count(1, vec![(milk, 3, 4), (apples, 20, 26)]),
        ];

        let report = group_discrepancies(&counts, &names, 10.0);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].item_name, "Apples");
        assert_eq!(report[0].discrepancies.len(), 1);
        assert_eq!(report[0].discrepancies[0].variance_percentage, 30.0);

        let milk_rows = &report[1].discrepancies;
        assert_eq!(milk_rows.len(), 2);
        assert_eq!(milk_rows[0].date.to_string(), "2025-01-01");
        assert_eq!(milk_rows[0].variance_percentage, 33.33);
        assert_eq!(milk_rows[1].discrepancy, -3);
    }

    #[test]
    fn zero_expected_is_full_variance() {
        let item = ItemId::new();
        let counts = vec![count(1, vec![(item, 0, 2), (ItemId::new(), 0, 0)])];

        let report = group_discrepancies(&counts, &HashMap::new(), 100.0);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].discrepancies[0].variance_percentage, 100.0);
        assert!(report[0].item_name.starts_with("Deleted item"));
    }

    #[test]
    fn threshold_filters_small_variances() {
        let item = ItemId::new();
        let counts = vec![count(1, vec![(item, 10, 12)])];
        assert_eq!(group_discrepancies(&counts, &HashMap::new(), 20.0).len(), 1);
        assert!(group_discrepancies(&counts, &HashMap::new(), 25.0).is_empty());
    }

    #[test]
    fn top_discrepancies_by_magnitude() {
        let counts = vec![count(
            1,
            (0..8)
                .map(|i| (ItemId::new(), 10, 10 + if i % 2 == 0 { i } else { -i }))
                .collect(),
        )];
        let top = top_discrepancies(&counts, &HashMap::new(), 5);
        assert_eq!(top.len(), 5);
        let magnitudes: Vec<i32> = top.iter().map(|row| row.discrepancy.abs()).collect();
        assert_eq!(magnitudes, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn low_stock_deficit() {
        let now = Utc::now();
        let entry = LowStockEntry::from(ItemRecord {
            id: ItemId::new(),
            name: "Flour".to_string(),
            description: None,
            category: ItemCategory::DryGoods,
            unit_of_measure: "kg".to_string(),
            par_level: 10,
            current_quantity: 4,
            created_by: UserId::new(),
            created_at: now,
            updated_at: now,
        });
        assert_eq!(entry.deficit, 6);
    }
}
