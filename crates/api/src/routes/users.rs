//! Admin account management.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Role, UserId};
use domain::{NewUser, PageRequest, UserChanges};
use serde::{Deserialize, Serialize};
use store::{InventoryStore, UserRecord};

use crate::error::ApiError;
use crate::extract::{ApiJson, CurrentUser};
use crate::routes::{MessageResponse, parse_id};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

// -- Response types --

/// A user account as returned to clients. Never carries the credential.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// -- Handlers --

/// GET /api/users
#[tracing::instrument(skip(state, user))]
pub async fn list<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state
        .users
        .list(
            &user.caller(),
            query.role,
            PageRequest::new(query.skip, query.limit)?,
        )
        .await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/users: admin creation with any role.
#[tracing::instrument(skip(state, user, req))]
pub async fn create<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let created = state
        .users
        .create(
            &user.caller(),
            NewUser {
                email: req.email,
                password: req.password,
                full_name: req.full_name,
                role: req.role,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/users/{id}
#[tracing::instrument(skip(state, user))]
pub async fn get<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let found = state.users.get(&user.caller(), parse_id(&id)?).await?;
    Ok(Json(found.into()))
}

/// PUT /api/users/{id}
#[tracing::instrument(skip(state, user, req))]
pub async fn update<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .users
        .update(
            &user.caller(),
            parse_id(&id)?,
            UserChanges {
                email: req.email,
                full_name: req.full_name,
                role: req.role,
                is_active: req.is_active,
                password: req.password,
            },
        )
        .await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/users/{id}
#[tracing::instrument(skip(state, user))]
pub async fn delete<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.users.delete(&user.caller(), parse_id(&id)?).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
