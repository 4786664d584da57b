//! Shared fixtures: throwaway SQLite databases.

#![allow(dead_code, clippy::panic)]

use restodir::domain::{NewRestaurant, Restaurant};
use restodir::persistence::{
    BackendSelection, Database, DeploymentScope, Repository, WriteMode, select,
};
use tempfile::TempDir;

/// A database living in a temporary directory, removed on drop.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

impl std::ops::Deref for TestDb {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

/// Local-scope selection pointed at a fresh file in `dir`.
pub fn local_selection(
    dir: &TempDir,
    max_persistent: u32,
    max_overflow: u32,
) -> BackendSelection {
    let mut selection = select(DeploymentScope::Local);
    let path = dir.path().join("test.db");
    selection.pool.backend_url = format!("sqlite://{}?mode=rwc", path.display());
    selection.pool.max_persistent = max_persistent;
    selection.pool.max_overflow = max_overflow;
    selection.pool.acquire_timeout_secs = 10;
    selection
}

/// Connects a fresh SQLite database with the given pool size.
pub async fn sqlite_db_sized(max_persistent: u32, max_overflow: u32) -> TestDb {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("cannot create temp dir");
    };
    let selection = local_selection(&dir, max_persistent, max_overflow);
    let db = match Database::connect(selection).await {
        Ok(db) => db,
        Err(e) => panic!("database bootstrap failed: {e}"),
    };
    TestDb { db, _dir: dir }
}

/// Connects a fresh SQLite database with local-scope pool sizing.
pub async fn sqlite_db() -> TestDb {
    sqlite_db_sized(5, 10).await
}

/// Stores a restaurant with a committed write.
pub async fn seed_restaurant(db: &Database, name: &str, city: &str) -> Restaurant {
    let repo = db.repositories().repository::<Restaurant>();
    let Ok(mut session) = db.sessions().acquire().await else {
        panic!("acquire failed");
    };
    match repo
        .create(&mut session, NewRestaurant::new(name, city), "seed", WriteMode::Commit)
        .await
    {
        Ok(restaurant) => restaurant,
        Err(e) => panic!("seed failed: {e}"),
    }
}
