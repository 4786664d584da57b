//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::Database;
use crate::service::DirectoryService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Directory service for all business logic.
    pub directory: Arc<DirectoryService>,
    /// Storage handle, used for health reporting.
    pub database: Database,
}

impl AppState {
    /// Builds the service layer on top of an initialized database.
    #[must_use]
    pub fn new(database: Database) -> Self {
        let directory = DirectoryService::new(database.sessions().clone(), database.repositories());
        Self {
            directory: Arc::new(directory),
            database,
        }
    }
}
