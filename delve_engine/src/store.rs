//! Ownership of the single SQLite handle behind a world.
//!
//! `WorldStore` is the one object that owns the connection. The query, play and
//! authoring services borrow it for as long as they live, so they cannot outlive a
//! `close()`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rusqlite::{Connection, Transaction};
use time::OffsetDateTime;

use crate::authoring::WorldAuthor;
use crate::error::{StoreError, StoreResult};
use crate::mutation::WorldMutator;
use crate::query::WorldQuery;
use crate::schema::{CORE_TABLES, ENABLE_FOREIGN_KEYS, count_core_tables, create_schema, seed_starter_world};

/// Current time as a Unix timestamp, used for session start times.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Exclusive owner of an open world store, or of nothing.
#[derive(Debug, Default)]
pub struct WorldStore {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

impl WorldStore {
    /// A store with nothing open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh store at `path` and return it open.
    ///
    /// # Errors
    /// - see [`WorldStore::create_new`]
    pub fn create(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut store = Self::new();
        store.create_new(path)?;
        Ok(store)
    }

    /// Open an existing store at `path`.
    ///
    /// # Errors
    /// - see [`WorldStore::open`]
    pub fn open_at(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut store = Self::new();
        store.open(path)?;
        Ok(store)
    }

    /// Replace whatever is at `path` with a new store holding the schema and the starter world.
    ///
    /// Schema and starter content are built in one transaction. On failure the store is
    /// closed and the error returned; no half-built world is ever left open.
    ///
    /// # Errors
    /// - `BadValue` for an empty path
    /// - `StorageFault` if the old file cannot be removed or any statement fails
    pub fn create_new(&mut self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StoreError::BadValue("store path is empty".into()));
        }
        self.close();

        if path.exists() {
            info!("removing existing file at {}", path.display());
            fs::remove_file(path)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(ENABLE_FOREIGN_KEYS)?;
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());

        let start_time = unix_now();
        let built = self.with_transaction("create store", |tx| {
            create_schema(tx)?;
            seed_starter_world(tx, start_time)
        });
        if let Err(e) = built {
            error!("could not build new store at {}: {e}", path.display());
            self.close();
            return Err(e);
        }

        info!("created world store {}", path.display());
        Ok(())
    }

    /// Open an existing store and check that it has the core tables.
    ///
    /// # Errors
    /// - `BadValue` for an empty path
    /// - `NotFound` if nothing exists at `path`
    /// - `StorageFault` if the file cannot be opened or is not a complete world store
    pub fn open(&mut self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StoreError::BadValue("store path is empty".into()));
        }
        if !path.exists() {
            return Err(StoreError::NotFound(format!("store file {}", path.display())));
        }
        self.close();

        let conn = Connection::open(path)?;
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());

        let checked = self
            .conn()
            .and_then(|conn| Ok(conn.execute_batch(ENABLE_FOREIGN_KEYS)?))
            .and_then(|()| self.check_schema());
        if let Err(e) = checked {
            warn!("rejecting store at {}: {e}", path.display());
            self.close();
            return Err(e);
        }

        info!("opened world store {}", path.display());
        Ok(())
    }

    /// Release the handle. Safe to call at any time, including when nothing is open.
    ///
    /// A busy handle gets a second attempt after its statement cache is flushed. If
    /// that fails too the failure is logged and the handle dropped anyway.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err((conn, err)) = conn.close()
        {
            warn!("store close failed ({err}); flushing cached statements and retrying");
            conn.flush_prepared_statement_cache();
            if let Err((conn, err)) = conn.close() {
                error!("store could not be closed cleanly: {err}");
                drop(conn);
            }
        }
        if let Some(path) = self.path.take() {
            info!("closed world store {}", path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Path of the open store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True if a store is open and all core tables are present.
    pub fn verify_schema(&self) -> bool {
        self.check_schema().is_ok()
    }

    fn check_schema(&self) -> StoreResult<()> {
        let found = count_core_tables(self.conn()?)?;
        if found == CORE_TABLES.len() {
            Ok(())
        } else {
            Err(StoreError::StorageFault(format!(
                "schema incomplete: found {found} of {} core tables",
                CORE_TABLES.len()
            )))
        }
    }

    /// Borrow the open connection.
    ///
    /// # Errors
    /// - `NotInitialized` if nothing is open
    pub fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::NotInitialized)
    }

    /// Run `work` inside one transaction.
    ///
    /// Commits only if `work` succeeds; otherwise rolls back explicitly and returns the
    /// original error, leaving the store as it was.
    ///
    /// # Errors
    /// - `NotInitialized` if nothing is open
    /// - any error from `work`, or from beginning/committing the transaction
    pub fn with_transaction<T>(
        &mut self,
        label: &str,
        work: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.conn.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        match work(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            },
            Err(e) => {
                warn!("{label}: rolling back ({e})");
                if let Err(rollback_err) = tx.rollback() {
                    error!("{label}: rollback failed: {rollback_err}");
                }
                Err(e)
            },
        }
    }

    /// Read-only projections over this store.
    pub fn query(&self) -> WorldQuery<'_> {
        WorldQuery::new(self)
    }

    /// Gameplay mutations against this store.
    pub fn play(&mut self) -> WorldMutator<'_> {
        WorldMutator::new(self)
    }

    /// Structural edits to the world graph.
    pub fn author(&mut self) -> WorldAuthor<'_> {
        WorldAuthor::new(self)
    }
}

impl Drop for WorldStore {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_rejects_empty_path() {
        let mut store = WorldStore::new();
        assert!(matches!(store.create_new(""), Err(StoreError::BadValue(_))));
        assert!(!store.is_open());
    }

    #[test]
    fn create_overwrites_existing_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("world.db");
        fs::write(&path, b"not a database").expect("write junk");
        let store = WorldStore::create(&path).expect("create");
        assert!(store.verify_schema());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let err = WorldStore::open_at(dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn open_rejects_incomplete_schema() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("partial.db");
        {
            let conn = Connection::open(&path).expect("open raw");
            conn.execute_batch("CREATE TABLE rooms (id INTEGER PRIMARY KEY);")
                .expect("partial schema");
        }
        let mut store = WorldStore::new();
        assert!(matches!(store.open(&path), Err(StoreError::StorageFault(_))));
        assert!(!store.is_open());
    }

    #[test]
    fn open_rejects_non_database_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("junk.db");
        fs::write(&path, vec![0x42_u8; 4096]).expect("write junk");
        let mut store = WorldStore::new();
        assert!(matches!(store.open(&path), Err(StoreError::StorageFault(_))));
        assert!(!store.is_open());
    }

    #[test]
    fn reopen_after_close() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("world.db");
        let mut store = WorldStore::create(&path).expect("create");
        store.close();
        store.close();
        assert!(!store.is_open());
        assert!(matches!(store.conn(), Err(StoreError::NotInitialized)));
        store.open(&path).expect("reopen");
        assert!(store.is_open());
    }

    #[test]
    fn foreign_keys_enabled_after_open() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("world.db");
        drop(WorldStore::create(&path).expect("create"));
        let store = WorldStore::open_at(&path).expect("open");
        let enabled: i64 = store
            .conn()
            .expect("conn")
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("pragma");
        assert_eq!(enabled, 1);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let dir = tempdir().expect("tempdir");
        let mut store = WorldStore::create(dir.path().join("world.db")).expect("create");
        let result: StoreResult<()> = store.with_transaction("test", |tx| {
            tx.execute("DELETE FROM item_locations", [])?;
            Err(StoreError::BadValue("stop".into()))
        });
        assert!(result.is_err());
        let count: i64 = store
            .conn()
            .expect("conn")
            .query_row("SELECT COUNT(*) FROM item_locations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 2);
    }

    #[test]
    fn transaction_on_closed_store_is_not_initialized() {
        let mut store = WorldStore::new();
        let result = store.with_transaction("noop", |_| Ok(()));
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }
}
