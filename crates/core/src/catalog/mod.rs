pub mod relation;
pub mod schema;

use std::cell::Cell;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::debug;

use crate::domain::*;
use crate::error::{Error, Result};

pub use relation::Relation;

/// Lock a shared store. A poisoned lock means a watcher panicked mid-update.
pub fn lock(store: &Mutex<FlowStore>) -> Result<MutexGuard<'_, FlowStore>> {
    store.lock().map_err(|_| Error::StorePoisoned)
}

/// SQLite-backed store holding one relation per flow kind.
///
/// Every operation touches exactly one relation; the only cross-relation
/// primitive is [`FlowStore::unit_of_work`], reserved for the synchronizer.
pub struct FlowStore {
    conn: Connection,
    /// Bit per [`FlowKind`] whose schema has been ensured on this connection.
    ensured: Cell<u8>,
}

impl FlowStore {
    /// Open or create a store at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            ensured: Cell::new(0),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            ensured: Cell::new(0),
        })
    }

    // ── Schema ───────────────────────────────────────────────────────

    /// Idempotently create the relation backing `R`.
    pub fn ensure_schema<R: Relation>(&self) -> Result<()> {
        self.ensure_kind(R::KIND)
    }

    fn ensure_kind(&self, kind: FlowKind) -> Result<()> {
        let bit = 1u8 << (kind as u8);
        if self.ensured.get() & bit == 0 {
            schema::create_relation(&self.conn, kind)?;
            self.ensured.set(self.ensured.get() | bit);
        }
        Ok(())
    }

    /// Whether the relation backing `R` exists yet. Does not create it.
    pub fn exists<R: Relation>(&self) -> Result<bool> {
        schema::relation_exists(&self.conn, R::KIND)
    }

    fn relation<R: Relation>(&self) -> Result<&Connection> {
        self.ensure_schema::<R>()?;
        Ok(&self.conn)
    }

    // ── Flow records ─────────────────────────────────────────────────

    /// Insert a record. Fails with `DuplicateKey` if its derived path is already stored.
    pub fn insert<R: Relation>(&self, record: &R) -> Result<()> {
        debug!(relation = %R::KIND, key = %record.key(), "insert");
        relation::insert(self.relation::<R>()?, record)
    }

    pub fn query_all<R: Relation>(&self) -> Result<Vec<R>> {
        relation::query_all(self.relation::<R>()?)
    }

    pub fn query_by_album<R: Relation>(&self, album: &str) -> Result<Vec<R>> {
        relation::query_by_album(self.relation::<R>()?, album)
    }

    /// Exact key lookup. Favorites may hold the same base under several albums.
    pub fn query_by_key<R: Relation>(&self, key: &str) -> Result<Vec<R>> {
        relation::query_by_key(self.relation::<R>()?, key)
    }

    /// Records whose key equals `prefix` once a trailing extension is ignored,
    /// e.g. `/a/preview/h1` matches `/a/preview/h1.jpg`.
    pub fn query_by_key_prefix<R: Relation>(&self, prefix: &str) -> Result<Vec<R>> {
        relation::query_by_key_prefix(self.relation::<R>()?, prefix)
    }

    pub fn delete_by_key<R: Relation>(&self, key: &str) -> Result<usize> {
        debug!(relation = %R::KIND, key, "delete by key");
        relation::delete_by_key::<R>(self.relation::<R>()?, key)
    }

    pub fn delete_where_album<R: Relation>(&self, album: &str) -> Result<usize> {
        debug!(relation = %R::KIND, album, "delete where album");
        relation::delete_where_album::<R>(self.relation::<R>()?, album)
    }

    pub fn count<R: Relation>(&self) -> Result<usize> {
        relation::count::<R>(self.relation::<R>()?)
    }

    /// Row count of every relation, in [`FlowKind::ALL`] order.
    pub fn stats(&self) -> Result<FlowStats> {
        Ok(FlowStats {
            counts: vec![
                (FlowKind::Base, self.count::<BaseRecord>()?),
                (FlowKind::Backup, self.count::<BackupRecord>()?),
                (FlowKind::Preview, self.count::<PreviewRecord>()?),
                (FlowKind::Edited, self.count::<EditedRecord>()?),
                (FlowKind::SocialMedia, self.count::<SocialMediaRecord>()?),
                (FlowKind::Favorite, self.count::<FavoriteRecord>()?),
            ],
        })
    }

    // ── Units of work ────────────────────────────────────────────────

    /// Run `f` inside one transaction spanning every relation. Committed only
    /// if `f` returns `Ok`.
    pub fn unit_of_work<T>(&mut self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        for kind in FlowKind::ALL {
            self.ensure_kind(kind)?;
        }
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ── Config ───────────────────────────────────────────────────────

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .ok();
        Ok(value)
    }

    pub fn list_config(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM config ORDER BY key")?;
        let entries = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
