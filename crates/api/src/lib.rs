//! HTTP API server for the inventory count backend.
//!
//! Provides REST endpoints under `/api` for accounts, the item catalog, the
//! count workflow, the dashboard and reports, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use domain::{DomainError, NewUser};
use metrics_exporter_prometheus::PrometheusHandle;
use store::InventoryStore;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::BootstrapAdmin;
pub use state::AppState;

fn api_routes<S: InventoryStore + Clone + 'static>() -> Router<Arc<AppState<S>>> {
    use routes::{auth, counts, dashboard, items, reports, users};

    Router::new()
        .route("/auth/register", post(auth::register::<S>))
        .route("/auth/login", post(auth::login::<S>))
        .route("/auth/refresh", post(auth::refresh::<S>))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list::<S>).post(users::create::<S>))
        .route(
            "/users/{id}",
            get(users::get::<S>)
                .put(users::update::<S>)
                .delete(users::delete::<S>),
        )
        .route("/items", get(items::list::<S>).post(items::create::<S>))
        .route("/items/low-stock", get(items::low_stock::<S>))
        .route(
            "/items/{id}",
            get(items::get::<S>)
                .put(items::update::<S>)
                .delete(items::delete::<S>),
        )
        .route("/items/{id}/adjust", post(items::adjust::<S>))
        .route("/counts", get(counts::list::<S>).post(counts::create::<S>))
        .route("/counts/pending", get(counts::pending::<S>))
        .route(
            "/counts/{id}",
            get(counts::get::<S>).delete(counts::delete::<S>),
        )
        .route("/counts/{id}/submit", post(counts::submit::<S>))
        .route("/counts/{id}/review", post(counts::review::<S>))
        .route("/counts/{id}/items", post(counts::add_line::<S>))
        .route("/counts/{id}/items/bulk", post(counts::add_lines::<S>))
        .route(
            "/counts/{id}/items/{item_id}",
            axum::routing::put(counts::update_line::<S>).delete(counts::remove_line::<S>),
        )
        .route("/dashboard/stats", get(dashboard::stats::<S>))
        .route("/reports/counts", get(reports::counts::<S>))
        .route("/reports/discrepancies", get(reports::discrepancies::<S>))
        .route("/reports/low-stock", get(reports::low_stock::<S>))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: InventoryStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    allowed_origins: &[String],
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::health::banner))
        .route("/health", get(routes::health::check))
        .nest("/api", api_routes::<S>())
        .with_state(state)
        .merge(metrics_router)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Creates the configured admin account if no account uses its email yet.
pub async fn bootstrap_admin<S: InventoryStore + Clone + 'static>(
    state: &AppState<S>,
    admin: BootstrapAdmin,
) -> Result<(), DomainError> {
    let created = state
        .users
        .ensure_admin(NewUser {
            email: admin.email,
            password: admin.password,
            full_name: admin.full_name,
            role: common::Role::Admin,
        })
        .await?;

    match created {
        Some(user) => tracing::info!(user_id = %user.id, email = %user.email, "bootstrap admin created"),
        None => tracing::debug!("bootstrap admin already present"),
    }
    Ok(())
}
