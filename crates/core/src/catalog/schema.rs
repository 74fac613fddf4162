use rusqlite::{params, Connection};

use crate::domain::FlowKind;
use crate::error::{Error, Result};

/// Schema version written by this build. Bump when a relation's columns change.
pub const SCHEMA_VERSION: u32 = 1;

/// Create the tables every catalog needs up front. Flow relations are created
/// lazily by [`create_relation`] on first access.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Stamp fresh catalogs with the current version and refuse catalogs written
/// by a newer build.
pub fn migrate(conn: &Connection) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match stored.and_then(|v| v.parse::<u32>().ok()) {
        None => {
            conn.execute(
                "INSERT INTO config (key, value) VALUES ('schema_version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(db) if db > SCHEMA_VERSION => {
            return Err(Error::SchemaTooNew {
                db,
                code: SCHEMA_VERSION,
            });
        }
        Some(_) => {}
    }
    Ok(())
}

pub fn table_name(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::Base => "base_flow",
        FlowKind::Backup => "backup_flow",
        FlowKind::Preview => "preview_flow",
        FlowKind::Edited => "edited_flow",
        FlowKind::SocialMedia => "social_media_flow",
        FlowKind::Favorite => "favorite_flow",
    }
}

/// Idempotent `CREATE TABLE` for one flow relation.
pub fn create_relation(conn: &Connection, kind: FlowKind) -> Result<()> {
    let ddl = match kind {
        FlowKind::Base => {
            "CREATE TABLE IF NOT EXISTS base_flow (
                collection  TEXT NOT NULL,
                name        TEXT NOT NULL,
                album       TEXT NOT NULL,
                favorited   INTEGER NOT NULL DEFAULT 0,
                backup      TEXT,
                preview     TEXT,
                base        TEXT NOT NULL PRIMARY KEY,
                date        TEXT NOT NULL,
                time        TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_base_flow_album ON base_flow(album);"
        }
        FlowKind::Backup => {
            "CREATE TABLE IF NOT EXISTS backup_flow (
                collection  TEXT NOT NULL,
                name        TEXT NOT NULL,
                album       TEXT NOT NULL,
                backup      TEXT NOT NULL PRIMARY KEY,
                date        TEXT NOT NULL,
                time        TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_backup_flow_album ON backup_flow(album);"
        }
        FlowKind::Preview => {
            "CREATE TABLE IF NOT EXISTS preview_flow (
                collection  TEXT NOT NULL,
                name        TEXT NOT NULL,
                album       TEXT NOT NULL,
                base        TEXT NOT NULL,
                preview     TEXT NOT NULL PRIMARY KEY,
                date        TEXT NOT NULL,
                time        TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_preview_flow_album ON preview_flow(album);"
        }
        FlowKind::Edited => {
            "CREATE TABLE IF NOT EXISTS edited_flow (
                collection  TEXT NOT NULL,
                album       TEXT NOT NULL,
                preview     TEXT,
                base        TEXT NOT NULL,
                edited      TEXT NOT NULL PRIMARY KEY
            );
            CREATE INDEX IF NOT EXISTS idx_edited_flow_album ON edited_flow(album);"
        }
        FlowKind::SocialMedia => {
            "CREATE TABLE IF NOT EXISTS social_media_flow (
                collection    TEXT NOT NULL,
                album         TEXT NOT NULL,
                preview       TEXT,
                base          TEXT NOT NULL,
                social_media  TEXT NOT NULL PRIMARY KEY
            );
            CREATE INDEX IF NOT EXISTS idx_social_media_flow_album ON social_media_flow(album);"
        }
        FlowKind::Favorite => {
            "CREATE TABLE IF NOT EXISTS favorite_flow (
                collection  TEXT NOT NULL,
                album       TEXT NOT NULL,
                preview     TEXT,
                base        TEXT NOT NULL,
                PRIMARY KEY (base, album)
            );
            CREATE INDEX IF NOT EXISTS idx_favorite_flow_album ON favorite_flow(album);"
        }
    };
    conn.execute_batch(ddl)?;
    Ok(())
}

pub fn relation_exists(conn: &Connection, kind: FlowKind) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table_name(kind)],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}
