//! Count aggregate and its lifecycle.
//!
//! A count moves `draft → submitted → approved | rejected`. Lines can only be
//! touched while the count is a draft, and approval writes every line's
//! actual quantity back to the catalog in the same unit of work.

mod aggregate;
mod handler;
mod service;
mod tally;

pub use aggregate::{Count, CountLine, LineInput, LineUpdate};
pub use handler::{CountHandler, MAX_WRITE_ATTEMPTS};
pub use service::{CountService, NewCount, NewLine, Review};
pub use tally::Tally;

use common::{CountStatus, ItemId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised by the count aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    /// The count is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} a {current} count")]
    InvalidStateTransition {
        current: CountStatus,
        action: &'static str,
    },

    /// A count with no lines cannot be submitted.
    #[error("Cannot submit empty count")]
    NoLines,

    /// Rejection needs a non-empty reason.
    #[error("Rejection reason is required")]
    RejectionReasonRequired,

    #[error("Quantity cannot be negative (got {quantity})")]
    NegativeQuantity { quantity: i32 },

    #[error("Item {item_id} not found in count")]
    LineNotFound { item_id: ItemId },
}

impl CountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CountError::InvalidStateTransition { .. } | CountError::NoLines => {
                ErrorKind::InvalidState
            }
            CountError::RejectionReasonRequired | CountError::NegativeQuantity { .. } => {
                ErrorKind::Validation
            }
            CountError::LineNotFound { .. } => ErrorKind::NotFound,
        }
    }
}
