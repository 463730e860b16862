//! HTTP handlers, one module per resource.

pub mod auth;
pub mod counts;
pub mod dashboard;
pub mod health;
pub mod items;
pub mod metrics;
pub mod reports;
pub mod users;

use std::str::FromStr;

use domain::PageRequest;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `skip` / `limit` query parameters shared by listings.
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl Paging {
    pub fn page(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(self.skip, self.limit)?)
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parses a path identifier, rejecting anything that is not a UUID.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
