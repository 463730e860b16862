//! Shared application state.

use std::sync::Arc;

use auth::{PasswordHasher, TokenIssuer};
use domain::{CatalogService, CountService, UserService};
use reports::ReportService;
use store::InventoryStore;

/// Services shared by every handler, each over the same store.
pub struct AppState<S: InventoryStore> {
    pub users: UserService<S>,
    pub catalog: CatalogService<S>,
    pub counts: CountService<S>,
    pub reports: ReportService<S>,
    pub tokens: TokenIssuer,
}

impl<S: InventoryStore + Clone> AppState<S> {
    pub fn new(store: S, hasher: PasswordHasher, tokens: TokenIssuer) -> Arc<Self> {
        Arc::new(Self {
            users: UserService::new(store.clone(), hasher),
            catalog: CatalogService::new(store.clone()),
            counts: CountService::new(store.clone()),
            reports: ReportService::new(store),
            tokens,
        })
    }
}
