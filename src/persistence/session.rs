//! Sessions: one checked-out connection plus its transaction state.
//!
//! A [`Session`] is the only handle repositories accept. It tracks whether
//! a transaction is open and who opened it, so that stand-alone writes
//! commit on their own while writes staged inside a
//! [`UnitOfWork`](super::unit_of_work::UnitOfWork) wait for its commit.

use sqlx::any::AnyRow;

use super::dialect::Backend;
use super::entity::SqlValue;
use super::error::StoreError;
use super::manager;
use super::pool::{Pool, PooledConnection};
use super::unit_of_work::UnitOfWork;

/// Durability of a single repository write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Commit as soon as the write succeeds (roll back if it fails).
    /// Rejected inside a unit of work.
    #[default]
    Commit,
    /// Leave the write pending in the current transaction.
    Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transaction {
    None,
    /// Opened by a single write; settled by that write.
    Implicit,
    /// Opened by a unit of work; settled only by it.
    UnitOfWork,
}

/// A connection leased from the pool for one logical operation.
///
/// Dropping a session returns its connection to the pool. If a transaction
/// is still open at that point, the connection is rolled back before it is
/// handed to anyone else.
#[derive(Debug)]
pub struct Session {
    conn: PooledConnection,
    backend: Backend,
    transaction: Transaction,
    rollback_only: bool,
    echo: bool,
}

impl Session {
    pub(crate) fn new(conn: PooledConnection, backend: Backend, echo: bool) -> Self {
        Self {
            conn,
            backend,
            transaction: Transaction::None,
            rollback_only: false,
            echo,
        }
    }

    /// Backend family of the underlying connection.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Pool lease identifier of the underlying connection.
    #[must_use]
    pub const fn lease(&self) -> u64 {
        self.conn.lease()
    }

    /// Returns `true` while any transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction != Transaction::None
    }

    /// Returns `true` while a unit of work owns the transaction.
    #[must_use]
    pub fn in_unit_of_work(&self) -> bool {
        self.transaction == Transaction::UnitOfWork
    }

    pub(crate) async fn begin_unit_of_work(&mut self) -> Result<(), StoreError> {
        if self.in_transaction() {
            return Err(StoreError::UnitOfWorkMisuse(
                "session already has an open transaction",
            ));
        }
        self.begin(Transaction::UnitOfWork).await
    }

    /// Prepares the session for a write in `mode`.
    pub(crate) async fn begin_write(&mut self, mode: WriteMode) -> Result<(), StoreError> {
        match (self.transaction, mode) {
            (Transaction::UnitOfWork, WriteMode::Commit) => Err(StoreError::UnitOfWorkMisuse(
                "commit-mode write inside a unit of work; stage it instead",
            )),
            (Transaction::None, _) => self.begin(Transaction::Implicit).await,
            _ => Ok(()),
        }
    }

    /// Finishes a write started with [`Session::begin_write`].
    ///
    /// In commit mode the implicit transaction is committed on success and
    /// rolled back on failure. In stage mode the outcome is passed through
    /// and the transaction stays open.
    pub(crate) async fn settle<T>(
        &mut self,
        mode: WriteMode,
        outcome: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if mode == WriteMode::Stage || self.transaction != Transaction::Implicit {
            return outcome;
        }
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        "rollback after failed write also failed"
                    );
                }
                Err(err)
            }
        }
    }

    pub(crate) async fn commit(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction() {
            return Ok(());
        }
        if self.rollback_only {
            self.rollback().await?;
            return Err(StoreError::TransactionConflict(
                "transaction aborted by an earlier failed statement".to_string(),
            ));
        }
        match self.control("COMMIT").await {
            Ok(()) => {
                self.transaction = Transaction::None;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::debug!(error = %rollback_err, "rollback after failed commit");
                }
                Err(err)
            }
        }
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction() {
            return Ok(());
        }
        let result = self.control("ROLLBACK").await;
        self.transaction = Transaction::None;
        self.rollback_only = false;
        if result.is_err() {
            self.conn.mark_needs_reset();
        }
        result
    }

    pub(crate) async fn fetch_all(
        &mut self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<AnyRow>, StoreError> {
        self.echo(sql, params.len());
        let result = manager::fetch_all(&mut self.conn, sql, params).await;
        self.observe(result)
    }

    pub(crate) async fn fetch_optional(
        &mut self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Option<AnyRow>, StoreError> {
        self.echo(sql, params.len());
        let result = manager::fetch_optional(&mut self.conn, sql, params).await;
        self.observe(result)
    }

    /// Runs a statement and returns the number of affected rows.
    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<u64, StoreError> {
        self.echo(sql, params.len());
        let result = manager::execute(&mut self.conn, sql, params)
            .await
            .map(|done| done.rows_affected());
        self.observe(result)
    }

    /// Runs an unparameterised statement (DDL).
    pub(crate) async fn execute_raw(&mut self, sql: &str) -> Result<(), StoreError> {
        self.echo(sql, 0);
        let result = manager::execute(&mut self.conn, sql, Vec::new())
            .await
            .map(|_| ());
        self.observe(result)
    }

    /// Opens a transaction of `kind`.
    ///
    /// The session counts as in-transaction before `BEGIN` is awaited, so a
    /// caller cancelled mid-statement still leaves a session whose drop
    /// resets the connection.
    async fn begin(&mut self, kind: Transaction) -> Result<(), StoreError> {
        self.transaction = kind;
        self.rollback_only = false;
        if let Err(err) = self.control(self.backend.begin_statement()).await {
            self.transaction = Transaction::None;
            return Err(err);
        }
        Ok(())
    }

    async fn control(&mut self, statement: &'static str) -> Result<(), StoreError> {
        self.echo(statement, 0);
        manager::execute(&mut self.conn, statement, Vec::new())
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }

    fn observe<T>(&mut self, result: Result<T, sqlx::Error>) -> Result<T, StoreError> {
        result.map_err(|err| {
            if self.in_transaction() {
                self.rollback_only = true;
            }
            StoreError::from(err)
        })
    }

    fn echo(&self, sql: &str, params: usize) {
        if self.echo {
            tracing::info!(
                target: "restodir::sql",
                lease = self.conn.lease(),
                params,
                "{sql}"
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction() {
            tracing::debug!(
                lease = self.conn.lease(),
                "session dropped inside a transaction; rolling back on release"
            );
            self.conn.mark_needs_reset();
        }
    }
}

/// Hands out sessions and units of work backed by one pool.
#[derive(Debug, Clone)]
pub struct SessionProvider {
    pool: Pool,
}

impl SessionProvider {
    /// Wraps an initialized pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Backing pool.
    #[must_use]
    pub const fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Checks out a connection and wraps it in a fresh session.
    ///
    /// # Errors
    ///
    /// Propagates pool acquisition errors ([`StoreError::PoolUninitialized`],
    /// [`StoreError::PoolClosed`], [`StoreError::PoolExhausted`],
    /// [`StoreError::ConnectionLost`]).
    pub async fn acquire(&self) -> Result<Session, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(Session::new(
            conn,
            self.pool.manager().backend(),
            self.pool.config().echo_queries,
        ))
    }

    /// Acquires a session and opens a unit of work on it.
    ///
    /// # Errors
    ///
    /// Propagates acquisition errors and failures to open the transaction.
    pub async fn unit_of_work(&self) -> Result<UnitOfWork, StoreError> {
        let session = self.acquire().await?;
        UnitOfWork::begin(session).await
    }
}
