//! Catalog item endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ItemCategory, ItemId, UserId};
use domain::{ItemChanges, NewItem, PageRequest};
use serde::{Deserialize, Serialize};
use store::{InventoryStore, ItemRecord};

use crate::error::ApiError;
use crate::extract::{ApiJson, CurrentUser};
use crate::routes::{MessageResponse, parse_id};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ItemListQuery {
    pub category: Option<ItemCategory>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: ItemCategory,
    pub unit_of_measure: String,
    pub par_level: i32,
    pub current_quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
    pub unit_of_measure: Option<String>,
    pub par_level: Option<i32>,
    pub current_quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i32,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub category: ItemCategory,
    pub unit_of_measure: String,
    pub par_level: i32,
    pub current_quantity: i32,
    pub is_low_stock: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemRecord> for ItemResponse {
    fn from(item: ItemRecord) -> Self {
        Self {
            is_low_stock: item.is_low_stock(),
            id: item.id,
            name: item.name,
            description: item.description,
            category: item.category,
            unit_of_measure: item.unit_of_measure,
            par_level: item.par_level,
            current_quantity: item.current_quantity,
            created_by: item.created_by,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

fn respond(items: Vec<ItemRecord>) -> Json<Vec<ItemResponse>> {
    Json(items.into_iter().map(ItemResponse::from).collect())
}

// -- Handlers --

/// GET /api/items
#[tracing::instrument(skip(state, user))]
pub async fn list<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let items = state
        .catalog
        .list(
            &user.caller(),
            query.category,
            PageRequest::new(query.skip, query.limit)?,
        )
        .await?;
    Ok(respond(items))
}

/// GET /api/items/low-stock
#[tracing::instrument(skip(state, user))]
pub async fn low_stock<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    Ok(respond(state.catalog.low_stock(&user.caller()).await?))
}

/// GET /api/items/{id}
#[tracing::instrument(skip(state, user))]
pub async fn get<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state.catalog.get(&user.caller(), parse_id(&id)?).await?;
    Ok(Json(item.into()))
}

/// POST /api/items
#[tracing::instrument(skip(state, user))]
pub async fn create<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let item = state
        .catalog
        .create(
            &user.caller(),
            NewItem {
                name: req.name,
                description: req.description,
                category: req.category,
                unit_of_measure: req.unit_of_measure,
                par_level: req.par_level,
                current_quantity: req.current_quantity,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// PUT /api/items/{id}: partial update.
#[tracing::instrument(skip(state, user))]
pub async fn update<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state
        .catalog
        .update(
            &user.caller(),
            parse_id(&id)?,
            ItemChanges {
                name: req.name,
                description: req.description,
                category: req.category,
                unit_of_measure: req.unit_of_measure,
                par_level: req.par_level,
                current_quantity: req.current_quantity,
            },
        )
        .await?;
    Ok(Json(item.into()))
}

/// POST /api/items/{id}/adjust
#[tracing::instrument(skip(state, user))]
pub async fn adjust<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AdjustRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state
        .catalog
        .adjust(&user.caller(), parse_id(&id)?, req.delta)
        .await?;
    Ok(Json(item.into()))
}

/// DELETE /api/items/{id}
#[tracing::instrument(skip(state, user))]
pub async fn delete<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.catalog.delete(&user.caller(), parse_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Item deleted successfully")))
}
