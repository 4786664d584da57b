//! Explicit multi-write transactions.

use std::ops::{Deref, DerefMut};

use serde::Serialize;

use super::error::StoreError;
use super::session::Session;

/// Lifecycle of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfWorkState {
    /// Transaction open, writes may be staged.
    Open,
    /// Every staged write is durable.
    Committed,
    /// No staged write is visible.
    RolledBack,
}

/// A session whose writes become durable together or not at all.
///
/// Repositories receive the unit of work through `Deref<Target = Session>`
/// and must be called with `WriteMode::Stage`. Consuming `commit` and
/// `rollback` make the two terminal states exclusive. Dropping an open
/// unit of work rolls it back when its connection is released.
#[derive(Debug)]
pub struct UnitOfWork {
    session: Session,
    state: UnitOfWorkState,
}

impl UnitOfWork {
    /// Opens a transaction on `session`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnitOfWorkMisuse`] if the session already has
    /// a transaction open, or the driver error if `BEGIN` fails.
    pub async fn begin(mut session: Session) -> Result<Self, StoreError> {
        session.begin_unit_of_work().await?;
        tracing::debug!(lease = session.lease(), "unit of work opened");
        Ok(Self {
            session,
            state: UnitOfWorkState::Open,
        })
    }

    /// Current state. Always [`UnitOfWorkState::Open`] while the value is
    /// reachable by callers.
    #[must_use]
    pub const fn state(&self) -> UnitOfWorkState {
        self.state
    }

    /// Makes every staged write durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionConflict`] if an earlier statement
    /// failed, or the driver error if `COMMIT` fails. Either way nothing is
    /// committed.
    pub async fn commit(mut self) -> Result<(), StoreError> {
        let result = self.session.commit().await;
        self.state = if result.is_ok() {
            UnitOfWorkState::Committed
        } else {
            UnitOfWorkState::RolledBack
        };
        tracing::debug!(state = ?self.state, "unit of work finished");
        result
    }

    /// Discards every staged write.
    ///
    /// # Errors
    ///
    /// Returns the driver error if `ROLLBACK` fails; the connection is then
    /// reset before reuse.
    pub async fn rollback(mut self) -> Result<(), StoreError> {
        let result = self.session.rollback().await;
        self.state = UnitOfWorkState::RolledBack;
        tracing::debug!(state = ?self.state, "unit of work finished");
        result
    }
}

impl Deref for UnitOfWork {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for UnitOfWork {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Open {
            tracing::warn!(
                lease = self.session.lease(),
                "unit of work dropped without commit; staged writes are discarded"
            );
        }
    }
}
