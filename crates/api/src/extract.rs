//! Request extractors for bearer credentials and JSON bodies.

use std::sync::Arc;

use auth::TokenKind;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::Caller;
use serde::de::DeserializeOwned;
use store::{InventoryStore, UserRecord};

use crate::error::ApiError;
use crate::state::AppState;

/// The raw token of an `Authorization: Bearer ...` header.
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let token = header
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        Ok(BearerToken(token.to_string()))
    }
}

/// The active account behind a valid access token.
pub struct CurrentUser(pub UserRecord);

impl CurrentUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.0.id, self.0.role)
    }
}

impl<S> FromRequestParts<Arc<AppState<S>>> for CurrentUser
where
    S: InventoryStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let user_id = state.tokens.validate(&token, TokenKind::Access)?;
        let user = state.users.get_active(user_id).await?;
        Ok(CurrentUser(user))
    }
}

/// A JSON request body whose rejections render as the API error envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

fn reject_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(reject_body)?;
        Ok(ApiJson(value))
    }
}

/// An absent body (no `Content-Type`) is `None`; a present one must parse.
impl<T, S> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(reject_body)?;
        Ok(body.map(|Json(value)| ApiJson(value)))
    }
}
