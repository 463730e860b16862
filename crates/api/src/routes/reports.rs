//! Manager reports.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::NaiveDate;
use reports::{CountSummary, ItemDiscrepancies, LowStockEntry};
use serde::Deserialize;
use store::InventoryStore;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DiscrepancyQuery {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub min_variance_percentage: Option<f64>,
}

/// GET /api/reports/counts
#[tracing::instrument(skip(state, user))]
pub async fn counts<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(range): Query<DateRange>,
) -> Result<Json<Vec<CountSummary>>, ApiError> {
    let summary = state
        .reports
        .count_summary(&user.caller(), range.start_date, range.end_date)
        .await?;
    Ok(Json(summary))
}

/// GET /api/reports/discrepancies
#[tracing::instrument(skip(state, user))]
pub async fn discrepancies<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(query): Query<DiscrepancyQuery>,
) -> Result<Json<Vec<ItemDiscrepancies>>, ApiError> {
    let report = state
        .reports
        .discrepancies(
            &user.caller(),
            query.start_date,
            query.end_date,
            query.min_variance_percentage,
        )
        .await?;
    Ok(Json(report))
}

/// GET /api/reports/low-stock
#[tracing::instrument(skip(state, user))]
pub async fn low_stock<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Vec<LowStockEntry>>, ApiError> {
    Ok(Json(state.reports.low_stock(&user.caller()).await?))
}
