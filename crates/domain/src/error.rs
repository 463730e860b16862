//! Domain error types.

use auth::AuthError;
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::count::CountError;

/// Stable, machine-readable classification of a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthenticated,
    InvalidState,
    Validation,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Count(#[from] CountError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A store failure with no domain meaning.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// A credential failure with no domain meaning.
    #[error("Credential error: {0}")]
    Auth(AuthError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Count(err) => err.kind(),
            DomainError::Catalog(_) => ErrorKind::Validation,
            DomainError::Store(_) | DomainError::Auth(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ItemNotFound(id) => DomainError::not_found("Item", id),
            StoreError::CountNotFound(id) => DomainError::not_found("Count", id),
            StoreError::UserNotFound(id) => DomainError::not_found("User", id),
            StoreError::DuplicateDraft { .. } => {
                DomainError::Conflict("You already have an active count for this date".to_string())
            }
            StoreError::UniqueViolation { field, value } => {
                DomainError::Conflict(format!("{field} '{value}' is already in use"))
            }
            StoreError::StillReferenced { entity, id } => DomainError::Conflict(format!(
                "{entity} {id} is still referenced by items or counts"
            )),
            StoreError::ConcurrencyConflict { count_id, .. } => DomainError::Conflict(format!(
                "Count {count_id} was modified concurrently, retry the request"
            )),
            StoreError::QuantityOutOfRange { quantity, .. } if quantity < 0 => {
                DomainError::Validation(format!(
                    "Quantity cannot go below zero (would be {quantity})"
                ))
            }
            StoreError::QuantityOutOfRange { quantity, .. } => DomainError::Validation(format!(
                "Quantity {quantity} exceeds the maximum of {}",
                i32::MAX
            )),
            other => DomainError::Store(other),
        }
    }
}

impl From<AuthError> for DomainError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WeakPassword(msg) => DomainError::Validation(msg),
            AuthError::TokenExpired | AuthError::InvalidToken | AuthError::WrongTokenKind { .. } => {
                DomainError::Unauthenticated(err.to_string())
            }
            other => DomainError::Auth(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use common::{ItemId, UserId};

    use super::*;

    #[test]
    fn store_errors_map_to_kinds() {
        let not_found: DomainError = StoreError::ItemNotFound(ItemId::new()).into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let duplicate: DomainError = StoreError::DuplicateDraft {
            created_by: UserId::new(),
            count_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
        .into();
        assert_eq!(duplicate.kind(), ErrorKind::Conflict);

        let unique: DomainError = StoreError::UniqueViolation {
            field: "email",
            value: "a@example.com".to_string(),
        }
        .into();
        assert_eq!(unique.kind(), ErrorKind::Conflict);

        let negative: DomainError = StoreError::QuantityOutOfRange {
            item_id: ItemId::new(),
            quantity: -1,
        }
        .into();
        assert_eq!(negative.kind(), ErrorKind::Validation);
        assert!(negative.to_string().contains("below zero"));

        let overflow: DomainError = StoreError::QuantityOutOfRange {
            item_id: ItemId::new(),
            quantity: i64::from(i32::MAX) + 1,
        }
        .into();
        assert_eq!(overflow.kind(), ErrorKind::Validation);
        assert!(overflow.to_string().contains("exceeds the maximum"));

        let decode: DomainError = StoreError::Decode("bad".to_string()).into();
        assert_eq!(decode.kind(), ErrorKind::Internal);
    }

    #[test]
    fn auth_errors_map_to_kinds() {
        let weak: DomainError = AuthError::WeakPassword("too short".to_string()).into();
        assert_eq!(weak.kind(), ErrorKind::Validation);

        let expired: DomainError = AuthError::TokenExpired.into();
        assert_eq!(expired.kind(), ErrorKind::Unauthenticated);

        let hash: DomainError = AuthError::Hash("boom".to_string()).into();
        assert_eq!(hash.kind(), ErrorKind::Internal);
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(ErrorKind::InvalidState.as_str(), "invalid_state");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }
}
