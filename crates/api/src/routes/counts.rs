//! Count lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::{CountId, CountLineId, CountStatus, ItemId, UserId};
use domain::{Count, LineUpdate, NewCount, NewLine, Review};
use serde::{Deserialize, Serialize};
use store::{InventoryStore, Version};

use crate::error::ApiError;
use crate::extract::{ApiJson, CurrentUser};
use crate::routes::{MessageResponse, Paging, parse_id};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct CreateCountRequest {
    pub count_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountLineRequest {
    pub item_id: ItemId,
    pub actual_quantity: i32,
    pub notes: Option<String>,
}

impl From<CountLineRequest> for NewLine {
    fn from(req: CountLineRequest) -> Self {
        NewLine {
            item_id: req.item_id,
            actual_quantity: req.actual_quantity,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub actual_quantity: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approved: bool,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CountLineResponse {
    pub id: CountLineId,
    pub count_id: CountId,
    pub item_id: ItemId,
    pub expected_quantity: i32,
    pub actual_quantity: i32,
    pub discrepancy: i32,
    pub has_significant_discrepancy: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub id: CountId,
    pub count_date: NaiveDate,
    pub status: CountStatus,
    pub created_by: UserId,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub version: Version,
    pub count_items: Vec<CountLineResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Count> for CountResponse {
    fn from(count: Count) -> Self {
        let count_items = count
            .lines()
            .iter()
            .map(|line| CountLineResponse {
                id: line.id,
                count_id: count.id(),
                item_id: line.item_id,
                expected_quantity: line.tally.expected(),
                actual_quantity: line.tally.actual(),
                discrepancy: line.discrepancy(),
                has_significant_discrepancy: line.has_significant_discrepancy(),
                notes: line.notes.clone(),
                created_at: line.created_at,
                updated_at: line.updated_at,
            })
            .collect();

        Self {
            id: count.id(),
            count_date: count.count_date(),
            status: count.status(),
            created_by: count.created_by(),
            submitted_at: count.submitted_at(),
            reviewed_by: count.reviewed_by(),
            reviewed_at: count.reviewed_at(),
            rejection_reason: count.rejection_reason().map(String::from),
            notes: count.notes().map(String::from),
            version: count.version(),
            count_items,
            created_at: count.created_at(),
            updated_at: count.updated_at(),
        }
    }
}

fn respond(counts: Vec<Count>) -> Json<Vec<CountResponse>> {
    Json(counts.into_iter().map(CountResponse::from).collect())
}

// -- Handlers --

/// GET /api/counts: staff see their own counts only.
#[tracing::instrument(skip(state, user))]
pub async fn list<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(paging): Query<Paging>,
) -> Result<Json<Vec<CountResponse>>, ApiError> {
    let counts = state.counts.list(&user.caller(), paging.page()?).await?;
    Ok(respond(counts))
}

/// GET /api/counts/pending
#[tracing::instrument(skip(state, user))]
pub async fn pending<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(paging): Query<Paging>,
) -> Result<Json<Vec<CountResponse>>, ApiError> {
    let counts = state.counts.pending(&user.caller(), paging.page()?).await?;
    Ok(respond(counts))
}

/// POST /api/counts
#[tracing::instrument(skip(state, user))]
pub async fn create<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    req: Option<ApiJson<CreateCountRequest>>,
) -> Result<(StatusCode, Json<CountResponse>), ApiError> {
    let req = req.map(|ApiJson(req)| req).unwrap_or_default();
    let count = state
        .counts
        .create(
            &user.caller(),
            NewCount {
                count_date: req.count_date,
                notes: req.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(count.into())))
}

/// GET /api/counts/{id}
#[tracing::instrument(skip(state, user))]
pub async fn get<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.counts.get(&user.caller(), parse_id(&id)?).await?;
    Ok(Json(count.into()))
}

/// DELETE /api/counts/{id}: drafts only.
#[tracing::instrument(skip(state, user))]
pub async fn delete<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.counts.delete(&user.caller(), parse_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Count deleted successfully")))
}

/// POST /api/counts/{id}/submit
#[tracing::instrument(skip(state, user))]
pub async fn submit<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    req: Option<ApiJson<SubmitRequest>>,
) -> Result<Json<CountResponse>, ApiError> {
    let req = req.map(|ApiJson(req)| req).unwrap_or_default();
    let count = state
        .counts
        .submit(&user.caller(), parse_id(&id)?, req.notes)
        .await?;
    Ok(Json(count.into()))
}

/// POST /api/counts/{id}/review
#[tracing::instrument(skip(state, user))]
pub async fn review<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .counts
        .review(
            &user.caller(),
            parse_id(&id)?,
            Review {
                approved: req.approved,
                rejection_reason: req.rejection_reason,
                notes: req.notes,
            },
        )
        .await?;
    Ok(Json(count.into()))
}

/// POST /api/counts/{id}/items
#[tracing::instrument(skip(state, user))]
pub async fn add_line<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CountLineRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .counts
        .add_line(&user.caller(), parse_id(&id)?, req.into())
        .await?;
    Ok(Json(count.into()))
}

/// POST /api/counts/{id}/items/bulk: all lines or none.
#[tracing::instrument(skip(state, user, req))]
pub async fn add_lines<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<Vec<CountLineRequest>>,
) -> Result<Json<CountResponse>, ApiError> {
    let lines = req.into_iter().map(NewLine::from).collect();
    let count = state
        .counts
        .add_lines(&user.caller(), parse_id(&id)?, lines)
        .await?;
    Ok(Json(count.into()))
}

/// PUT /api/counts/{id}/items/{item_id}
#[tracing::instrument(skip(state, user))]
pub async fn update_line<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path((id, item_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<UpdateLineRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .counts
        .update_line(
            &user.caller(),
            parse_id(&id)?,
            parse_id(&item_id)?,
            LineUpdate {
                actual_quantity: req.actual_quantity,
                notes: req.notes,
            },
        )
        .await?;
    Ok(Json(count.into()))
}

/// DELETE /api/counts/{id}/items/{item_id}
#[tracing::instrument(skip(state, user))]
pub async fn remove_line<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .counts
        .remove_line(&user.caller(), parse_id(&id)?, parse_id(&item_id)?)
        .await?;
    Ok(Json(count.into()))
}
