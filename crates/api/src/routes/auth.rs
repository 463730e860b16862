//! Registration, login and token refresh.

use std::sync::Arc;

use auth::{TokenKind, TokenPair};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};
use domain::NewUser;
use serde::Deserialize;
use store::InventoryStore;

use crate::error::ApiError;
use crate::extract::{ApiJson, BearerToken, CurrentUser};
use crate::routes::users::UserResponse;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// OAuth2 password-grant style form; `username` carries the email.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/register: self-registration, always as staff.
#[tracing::instrument(skip_all)]
pub async fn register<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state
        .users
        .register(NewUser {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            role: common::Role::Staff,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /api/auth/login
#[tracing::instrument(skip_all, fields(email = %form.username))]
pub async fn login<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenPair>, ApiError> {
    let user = match state.users.authenticate(&form.username, &form.password).await {
        Ok(user) => user,
        Err(err) => {
            metrics::counter!("login_failures_total").increment(1);
            return Err(err.into());
        }
    };
    Ok(Json(state.tokens.issue_pair(user.id)?))
}

/// POST /api/auth/refresh: trades a refresh token for a new pair.
#[tracing::instrument(skip_all)]
pub async fn refresh<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenPair>, ApiError> {
    let user_id = state.tokens.validate(&token, TokenKind::Refresh)?;
    let user = state.users.get_active(user_id).await?;
    Ok(Json(state.tokens.issue_pair(user.id)?))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}
