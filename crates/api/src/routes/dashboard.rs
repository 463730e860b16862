//! Role-dependent dashboard.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use reports::Dashboard;
use store::InventoryStore;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

/// GET /api/dashboard/stats
#[tracing::instrument(skip(state, user))]
pub async fn stats<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.reports.dashboard(&user.caller()).await?))
}
