//! Read models for the dashboard and manager reports.
//!
//! Everything here is computed on request from the store; there is no
//! materialized state to keep in sync.
//!
//! - [`ReportService`] runs the queries and enforces who may see what
//! - [`views`] holds the serializable shapes handed to the API

pub mod service;
pub mod views;

pub use service::{DEFAULT_MIN_VARIANCE, ReportService};
pub use views::{
    CountBrief, CountSummary, Dashboard, DiscrepancyEntry, ItemDiscrepancies, LowStockEntry,
    PersonalDashboard, ReviewerDashboard, TopDiscrepancy,
};
