//! Storage bootstrap: pool, schema, sessions, and repositories in one
//! handle.

use super::error::StoreError;
use super::pool::{Pool, PoolStatus};
use super::selector::{BackendSelection, RepositoryFactory};
use super::session::SessionProvider;

/// Initialized storage for the process.
///
/// Built once at startup with [`Database::connect`] and shared by cloning.
/// [`Database::shutdown`] disposes the pool; it is idempotent.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool,
    sessions: SessionProvider,
    repositories: RepositoryFactory,
}

impl Database {
    /// Opens the pool for `selection`, creates missing tables, and returns
    /// the ready handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for invalid sizing or a URL that does
    /// not match the selected backend, and connection or DDL errors. On
    /// failure the pool is shut down before returning.
    pub async fn connect(selection: BackendSelection) -> Result<Self, StoreError> {
        let BackendSelection {
            scope,
            pool: config,
            repositories,
        } = selection;
        let manager = repositories.connection_manager(&config)?;
        let pool = Pool::new(manager, config)?;
        pool.initialize().await?;

        let sessions = SessionProvider::new(pool.clone());
        if let Err(err) = Self::prepare(&sessions, repositories).await {
            pool.shutdown().await;
            return Err(err);
        }

        tracing::info!(
            %scope,
            backend = %repositories.backend(),
            max_connections = pool.config().max_connections(),
            "database ready"
        );
        Ok(Self {
            pool,
            sessions,
            repositories,
        })
    }

    async fn prepare(
        sessions: &SessionProvider,
        repositories: RepositoryFactory,
    ) -> Result<(), StoreError> {
        let mut session = sessions.acquire().await?;
        repositories.ensure_schema(&mut session).await
    }

    /// Session and unit-of-work provider.
    #[must_use]
    pub const fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    /// Repository factory for the active backend.
    #[must_use]
    pub const fn repositories(&self) -> RepositoryFactory {
        self.repositories
    }

    /// Current pool usage.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Disposes the pool. Outstanding sessions finish normally; new
    /// acquisitions fail with [`StoreError::PoolClosed`].
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
