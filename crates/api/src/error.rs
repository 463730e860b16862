//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
///
/// Every error renders as `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request that never reached the domain.
    BadRequest(String),
    /// Missing or unusable bearer credentials.
    Unauthorized(String),
    Domain(DomainError),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: ErrorKind,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidState | ErrorKind::Validation | ErrorKind::Conflict => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            ApiError::BadRequest(msg) => (ErrorKind::Validation, msg),
            ApiError::Unauthorized(msg) => (ErrorKind::Unauthenticated, msg),
            ApiError::Domain(err) => (err.kind(), err.to_string()),
            ApiError::Internal(msg) => (ErrorKind::Internal, msg),
        };

        let status = status_for(kind);
        let message = if kind == ErrorKind::Internal {
            tracing::error!(error = %message, "internal server error");
            "Internal server error".to_string()
        } else {
            message
        };

        let body = Json(ErrorEnvelope {
            error: ErrorBody {
                kind,
                message: &message,
            },
        });
        if kind == ErrorKind::Unauthenticated {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<auth::AuthError> for ApiError {
    fn from(err: auth::AuthError) -> Self {
        ApiError::Domain(err.into())
    }
}
