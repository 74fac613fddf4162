use std::path::PathBuf;

use rusqlite::{params, Connection, Row};

use crate::domain::*;
use crate::error::{Error, Result};

use super::schema::table_name;

/// A flow record type persisted in its own relation, keyed by a derived path.
pub trait Relation: Sized {
    const KIND: FlowKind;
    /// Column holding the derived path that identifies the row.
    const KEY: &'static str;
    /// Columns in table order, used for every SELECT.
    const COLUMNS: &'static [&'static str];
    /// Columns holding filesystem paths, rewritten on album and picture renames.
    const PATH_COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize>;

    fn key(&self) -> String;

    fn table() -> &'static str {
        table_name(Self::KIND)
    }
}

fn path_str(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

fn opt_path_str(path: &Option<PathBuf>) -> Option<String> {
    path.as_deref().map(path_str)
}

fn get_path(row: &Row<'_>, idx: usize) -> rusqlite::Result<PathBuf> {
    Ok(PathBuf::from(row.get::<_, String>(idx)?))
}

fn get_opt_path(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<PathBuf>> {
    Ok(row.get::<_, Option<String>>(idx)?.map(PathBuf::from))
}

impl Relation for BaseRecord {
    const KIND: FlowKind = FlowKind::Base;
    const KEY: &'static str = "base";
    const COLUMNS: &'static [&'static str] = &[
        "collection", "name", "album", "favorited", "backup", "preview", "base", "date", "time",
    ];
    const PATH_COLUMNS: &'static [&'static str] = &["backup", "preview", "base"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BaseRecord {
            collection: row.get(0)?,
            name: row.get(1)?,
            album: row.get(2)?,
            favorited: row.get::<_, i64>(3)? != 0,
            backup: get_opt_path(row, 4)?,
            preview: get_opt_path(row, 5)?,
            base: get_path(row, 6)?,
            date: row.get(7)?,
            time: row.get(8)?,
        })
    }

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO base_flow (collection, name, album, favorited, backup, preview, base, date, time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.collection,
                self.name,
                self.album,
                self.favorited as i64,
                opt_path_str(&self.backup),
                opt_path_str(&self.preview),
                path_str(&self.base),
                self.date,
                self.time,
            ],
        )
    }

    fn key(&self) -> String {
        path_str(&self.base)
    }
}

impl Relation for BackupRecord {
    const KIND: FlowKind = FlowKind::Backup;
    const KEY: &'static str = "backup";
    const COLUMNS: &'static [&'static str] = &["collection", "name", "album", "backup", "date", "time"];
    const PATH_COLUMNS: &'static [&'static str] = &["backup"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BackupRecord {
            collection: row.get(0)?,
            name: row.get(1)?,
            album: row.get(2)?,
            backup: get_path(row, 3)?,
            date: row.get(4)?,
            time: row.get(5)?,
        })
    }

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO backup_flow (collection, name, album, backup, date, time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.collection,
                self.name,
                self.album,
                path_str(&self.backup),
                self.date,
                self.time,
            ],
        )
    }

    fn key(&self) -> String {
        path_str(&self.backup)
    }
}

impl Relation for PreviewRecord {
    const KIND: FlowKind = FlowKind::Preview;
    const KEY: &'static str = "preview";
    const COLUMNS: &'static [&'static str] =
        &["collection", "name", "album", "base", "preview", "date", "time"];
    const PATH_COLUMNS: &'static [&'static str] = &["base", "preview"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PreviewRecord {
            collection: row.get(0)?,
            name: row.get(1)?,
            album: row.get(2)?,
            base: get_path(row, 3)?,
            preview: get_path(row, 4)?,
            date: row.get(5)?,
            time: row.get(6)?,
        })
    }

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO preview_flow (collection, name, album, base, preview, date, time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.collection,
                self.name,
                self.album,
                path_str(&self.base),
                path_str(&self.preview),
                self.date,
                self.time,
            ],
        )
    }

    fn key(&self) -> String {
        path_str(&self.preview)
    }
}

impl Relation for EditedRecord {
    const KIND: FlowKind = FlowKind::Edited;
    const KEY: &'static str = "edited";
    const COLUMNS: &'static [&'static str] = &["collection", "album", "preview", "base", "edited"];
    const PATH_COLUMNS: &'static [&'static str] = &["preview", "base", "edited"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EditedRecord {
            collection: row.get(0)?,
            album: row.get(1)?,
            preview: get_opt_path(row, 2)?,
            base: get_path(row, 3)?,
            edited: get_path(row, 4)?,
        })
    }

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO edited_flow (collection, album, preview, base, edited)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.collection,
                self.album,
                opt_path_str(&self.preview),
                path_str(&self.base),
                path_str(&self.edited),
            ],
        )
    }

    fn key(&self) -> String {
        path_str(&self.edited)
    }
}

impl Relation for SocialMediaRecord {
    const KIND: FlowKind = FlowKind::SocialMedia;
    const KEY: &'static str = "social_media";
    const COLUMNS: &'static [&'static str] =
        &["collection", "album", "preview", "base", "social_media"];
    const PATH_COLUMNS: &'static [&'static str] = &["preview", "base", "social_media"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SocialMediaRecord {
            collection: row.get(0)?,
            album: row.get(1)?,
            preview: get_opt_path(row, 2)?,
            base: get_path(row, 3)?,
            social_media: get_path(row, 4)?,
        })
    }

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO social_media_flow (collection, album, preview, base, social_media)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.collection,
                self.album,
                opt_path_str(&self.preview),
                path_str(&self.base),
                path_str(&self.social_media),
            ],
        )
    }

    fn key(&self) -> String {
        path_str(&self.social_media)
    }
}

impl Relation for FavoriteRecord {
    const KIND: FlowKind = FlowKind::Favorite;
    // The primary key is (base, album); base alone identifies the picture.
    const KEY: &'static str = "base";
    const COLUMNS: &'static [&'static str] = &["collection", "album", "preview", "base"];
    const PATH_COLUMNS: &'static [&'static str] = &["preview", "base"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FavoriteRecord {
            collection: row.get(0)?,
            album: row.get(1)?,
            preview: get_opt_path(row, 2)?,
            base: get_path(row, 3)?,
        })
    }

    fn insert_into(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO favorite_flow (collection, album, preview, base) VALUES (?1, ?2, ?3, ?4)",
            params![
                self.collection,
                self.album,
                opt_path_str(&self.preview),
                path_str(&self.base),
            ],
        )
    }

    fn key(&self) -> String {
        path_str(&self.base)
    }
}

// ── Single-relation statements ───────────────────────────────────
//
// These run against a plain connection or a transaction; callers make sure
// the relation's schema exists first.

fn select_sql<R: Relation>(filter: &str) -> String {
    format!("SELECT {} FROM {} {}", R::COLUMNS.join(", "), R::table(), filter)
}

fn collect<R: Relation>(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, R::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn insert<R: Relation>(conn: &Connection, record: &R) -> Result<()> {
    match record.insert_into(conn) {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(Error::DuplicateKey {
                relation: R::KIND.as_str(),
                key: record.key(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn query_all<R: Relation>(conn: &Connection) -> Result<Vec<R>> {
    collect(conn, &select_sql::<R>(&format!("ORDER BY {}", R::KEY)), &[])
}

pub(crate) fn query_by_album<R: Relation>(conn: &Connection, album: &str) -> Result<Vec<R>> {
    collect(
        conn,
        &select_sql::<R>(&format!("WHERE album = ?1 ORDER BY {}", R::KEY)),
        &[&album],
    )
}

pub(crate) fn query_by_key<R: Relation>(conn: &Connection, key: &str) -> Result<Vec<R>> {
    collect(conn, &select_sql::<R>(&format!("WHERE {} = ?1", R::KEY)), &[&key])
}

/// Rows whose key is `prefix` itself or `prefix` followed by a single extension.
pub(crate) fn query_by_key_prefix<R: Relation>(conn: &Connection, prefix: &str) -> Result<Vec<R>> {
    let pattern = format!("{}.%", escape_like(prefix));
    let candidates: Vec<R> = collect(
        conn,
        &select_sql::<R>(&format!(
            "WHERE {key} = ?1 OR {key} LIKE ?2 ESCAPE '\\' ORDER BY {key}",
            key = R::KEY
        )),
        &[&prefix, &pattern],
    )?;

    // LIKE is case-insensitive and lets `%` span further dots or separators.
    Ok(candidates
        .into_iter()
        .filter(|r| {
            let key = r.key();
            match key.strip_prefix(prefix) {
                Some("") => true,
                Some(rest) => {
                    rest.starts_with('.')
                        && !rest[1..].contains('.')
                        && !rest.contains(std::path::MAIN_SEPARATOR)
                }
                None => false,
            }
        })
        .collect())
}

/// Rows of one album whose `column` equals `value`.
pub(crate) fn query_where<R: Relation>(
    conn: &Connection,
    album: &str,
    column: &str,
    value: &str,
) -> Result<Vec<R>> {
    collect(
        conn,
        &select_sql::<R>(&format!("WHERE album = ?1 AND {column} = ?2 ORDER BY {}", R::KEY)),
        &[&album, &value],
    )
}

/// Set `assignments` on the row of `album` identified by `key`.
pub(crate) fn update_by_key<R: Relation>(
    conn: &Connection,
    album: &str,
    key: &str,
    assignments: &[(&str, &str)],
) -> Result<usize> {
    if assignments.is_empty() {
        return Ok(0);
    }
    let set = assignments
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    let mut args: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(assignments.len() + 2);
    args.push(&album);
    args.push(&key);
    args.extend(assignments.iter().map(|(_, value)| value as &dyn rusqlite::ToSql));

    let changed = conn.execute(
        &format!("UPDATE {} SET {set} WHERE album = ?1 AND {} = ?2", R::table(), R::KEY),
        args.as_slice(),
    )?;
    Ok(changed)
}

pub(crate) fn delete_by_key<R: Relation>(conn: &Connection, key: &str) -> Result<usize> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE {} = ?1", R::table(), R::KEY),
        params![key],
    )?;
    Ok(removed)
}

pub(crate) fn delete_where_album<R: Relation>(conn: &Connection, album: &str) -> Result<usize> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE album = ?1", R::table()),
        params![album],
    )?;
    Ok(removed)
}

pub(crate) fn count<R: Relation>(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", R::table()), [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

pub(crate) fn count_album<R: Relation>(conn: &Connection, album: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE album = ?1", R::table()),
        params![album],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Rewrite `old` to `new` as a leading path segment of every path column, and
/// exact matches of the album column. Returns the summed change count of all statements.
pub(crate) fn rewrite_album<R: Relation>(conn: &Connection, old: &str, new: &str) -> Result<usize> {
    let old_prefix = format!("{old}{}", std::path::MAIN_SEPARATOR);
    let new_prefix = format!("{new}{}", std::path::MAIN_SEPARATOR);
    let mut touched = 0;

    for column in R::PATH_COLUMNS {
        touched += conn.execute(
            &format!(
                "UPDATE {table} SET {col} = ?2 || substr({col}, length(?1) + 1)
                 WHERE substr({col}, 1, length(?1)) = ?1",
                table = R::table(),
                col = column
            ),
            params![old_prefix, new_prefix],
        )?;
    }
    touched += conn.execute(
        &format!("UPDATE {} SET album = ?2 WHERE album = ?1", R::table()),
        params![old, new],
    )?;
    Ok(touched)
}

/// Replace every occurrence of the path `old` in the path columns of `R`
/// (restricted to one album). Used when a single picture's files are renamed.
pub(crate) fn rewrite_path<R: Relation>(
    conn: &Connection,
    album: &str,
    old: &str,
    new: &str,
) -> Result<usize> {
    let mut touched = 0;
    for column in R::PATH_COLUMNS {
        touched += conn.execute(
            &format!(
                "UPDATE {table} SET {col} = ?3 WHERE album = ?1 AND {col} = ?2",
                table = R::table(),
                col = column
            ),
            params![album, old, new],
        )?;
    }
    Ok(touched)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
