use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::catalog::{relation, FlowStore, Relation};
use crate::domain::*;
use crate::error::{Error, Result};
use crate::layout::path_key;

// ── Albums ───────────────────────────────────────────────────────────

/// Rows held by `album` across all six relations.
fn album_row_count(conn: &Connection, album: &str) -> Result<usize> {
    Ok(relation::count_album::<BaseRecord>(conn, album)?
        + relation::count_album::<BackupRecord>(conn, album)?
        + relation::count_album::<PreviewRecord>(conn, album)?
        + relation::count_album::<EditedRecord>(conn, album)?
        + relation::count_album::<SocialMediaRecord>(conn, album)?
        + relation::count_album::<FavoriteRecord>(conn, album)?)
}

/// Rewrite the album column and every path below `old` to `new`, in every relation.
///
/// Only whole leading path segments are rewritten, so `old` appearing inside an
/// unrelated segment is left alone. Fails with `AlbumExists` when `new` already
/// owns rows, which keeps `rename_album(a, b)` followed by `rename_album(b, a)`
/// an exact round trip. Returns the number of column updates applied.
pub fn rename_album(store: &mut FlowStore, old: &str, new: &str) -> Result<usize> {
    if old == new {
        return Ok(0);
    }

    let touched = store.unit_of_work(|conn| {
        if album_row_count(conn, new)? > 0 {
            return Err(Error::AlbumExists(new.to_string()));
        }
        Ok(relation::rewrite_album::<BaseRecord>(conn, old, new)?
            + relation::rewrite_album::<BackupRecord>(conn, old, new)?
            + relation::rewrite_album::<PreviewRecord>(conn, old, new)?
            + relation::rewrite_album::<EditedRecord>(conn, old, new)?
            + relation::rewrite_album::<SocialMediaRecord>(conn, old, new)?
            + relation::rewrite_album::<FavoriteRecord>(conn, old, new)?)
    })?;

    info!(old, new, touched, "album renamed");
    Ok(touched)
}

/// Move an album directory on disk and rename its records to match.
/// The directory move is reverted if the records cannot be rewritten.
pub fn relocate_album(store: &mut FlowStore, old_dir: &Path, new_dir: &Path) -> Result<usize> {
    if old_dir == new_dir {
        return Ok(0);
    }
    if new_dir.exists() {
        return Err(Error::AlbumExists(path_key(new_dir)));
    }

    let moved = old_dir.is_dir();
    if moved {
        if let Some(parent) = new_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(old_dir, new_dir)?;
    }

    match rename_album(store, &path_key(old_dir), &path_key(new_dir)) {
        Ok(touched) => Ok(touched),
        Err(e) => {
            if moved {
                if let Err(revert) = fs::rename(new_dir, old_dir) {
                    warn!(
                        from = %new_dir.display(),
                        to = %old_dir.display(),
                        error = %revert,
                        "failed to move album directory back"
                    );
                }
            }
            Err(e)
        }
    }
}

/// Remove every row of `album` from all six relations. Deleting an album that
/// has no rows is not an error.
pub fn delete_album(store: &mut FlowStore, album: &str) -> Result<DeleteSummary> {
    let summary = store.unit_of_work(|conn| {
        Ok(DeleteSummary {
            base: relation::delete_where_album::<BaseRecord>(conn, album)?,
            backup: relation::delete_where_album::<BackupRecord>(conn, album)?,
            preview: relation::delete_where_album::<PreviewRecord>(conn, album)?,
            edited: relation::delete_where_album::<EditedRecord>(conn, album)?,
            social_media: relation::delete_where_album::<SocialMediaRecord>(conn, album)?,
            favorite: relation::delete_where_album::<FavoriteRecord>(conn, album)?,
        })
    })?;

    info!(album, removed = summary.total(), "album deleted");
    Ok(summary)
}

// ── Pictures ─────────────────────────────────────────────────────────

/// `path` with its file stem replaced by `name`; directory and extension kept.
fn with_stem(path: &Path, name: &str) -> PathBuf {
    let file_name = match path.extension() {
        Some(ext) => format!("{name}.{}", ext.to_string_lossy()),
        None => name.to_string(),
    };
    path.with_file_name(file_name)
}

/// A picture name must stay a single file stem inside its flow directory.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

fn revert_moves(moved: &[(PathBuf, PathBuf)]) {
    for (from, to) in moved.iter().rev() {
        if let Err(e) = fs::rename(to, from) {
            warn!(from = %to.display(), to = %from.display(), error = %e, "failed to revert file rename");
        }
    }
}

/// Rename one picture, identified by its current preview path within an album.
///
/// The preview and base files are renamed on disk (when present) so their stem
/// becomes `update.name`. Then, in one unit of work: the preview row, the base
/// row and its backup row's name, and every edited, social-media and favorite
/// reference to the old paths. File renames are undone if the database update
/// fails. Returns the new preview path.
pub fn rename_picture(store: &mut FlowStore, update: &PictureRename) -> Result<PathBuf> {
    validate_name(&update.name)?;
    let album = update.album.as_str();
    let old_preview = path_key(&update.preview);

    let preview_row = store
        .query_by_key::<PreviewRecord>(&old_preview)?
        .into_iter()
        .find(|row| row.album == album)
        .ok_or_else(|| Error::NotFound(format!("preview {old_preview} in album {album}")))?;

    let old_base = path_key(&preview_row.base);
    let new_preview_path = with_stem(&preview_row.preview, &update.name);
    let new_base_path = with_stem(&preview_row.base, &update.name);
    let new_preview = path_key(&new_preview_path);
    let new_base = path_key(&new_base_path);

    if new_preview != old_preview
        && (!store.query_by_key::<PreviewRecord>(&new_preview)?.is_empty() || new_preview_path.exists())
    {
        return Err(Error::DuplicateKey {
            relation: FlowKind::Preview.as_str(),
            key: new_preview,
        });
    }
    if new_base != old_base
        && (!store.query_by_key::<BaseRecord>(&new_base)?.is_empty() || new_base_path.exists())
    {
        return Err(Error::DuplicateKey {
            relation: FlowKind::Base.as_str(),
            key: new_base,
        });
    }

    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (from, to) in [
        (&preview_row.preview, &new_preview_path),
        (&preview_row.base, &new_base_path),
    ] {
        if from == to || !from.is_file() {
            continue;
        }
        if let Err(e) = fs::rename(from, to) {
            revert_moves(&moved);
            return Err(e.into());
        }
        debug!(from = %from.display(), to = %to.display(), "renamed file");
        moved.push((from.clone(), to.clone()));
    }

    let result = store.unit_of_work(|conn| {
        let name = update.name.as_str();
        relation::update_by_key::<PreviewRecord>(
            conn,
            album,
            &old_preview,
            &[("name", name), ("preview", new_preview.as_str()), ("base", new_base.as_str())],
        )?;

        for base in relation::query_where::<BaseRecord>(conn, album, "base", &old_base)? {
            if let Some(backup) = &base.backup {
                relation::update_by_key::<BackupRecord>(conn, album, &path_key(backup), &[("name", name)])?;
            }
            let mut assignments = vec![("name", name), ("base", new_base.as_str())];
            if base.preview.as_deref().map(path_key).as_deref() == Some(old_preview.as_str()) {
                assignments.push(("preview", new_preview.as_str()));
            }
            relation::update_by_key::<BaseRecord>(conn, album, &base.key(), &assignments)?;
        }

        for (old, new) in [(&old_preview, &new_preview), (&old_base, &new_base)] {
            relation::rewrite_path::<EditedRecord>(conn, album, old, new)?;
            relation::rewrite_path::<SocialMediaRecord>(conn, album, old, new)?;
            relation::rewrite_path::<FavoriteRecord>(conn, album, old, new)?;
        }
        Ok(())
    });

    if let Err(e) = result {
        revert_moves(&moved);
        return Err(e);
    }

    info!(album, from = %old_preview, to = %new_preview, "picture renamed");
    Ok(new_preview_path)
}

/// Delete the row keyed by `key` from one relation. Favorites are removed from
/// every album holding that base. Returns the number of rows removed.
pub fn delete_picture(store: &FlowStore, kind: FlowKind, key: &str) -> Result<usize> {
    let removed = match kind {
        FlowKind::Base => store.delete_by_key::<BaseRecord>(key)?,
        FlowKind::Backup => store.delete_by_key::<BackupRecord>(key)?,
        FlowKind::Preview => store.delete_by_key::<PreviewRecord>(key)?,
        FlowKind::Edited => store.delete_by_key::<EditedRecord>(key)?,
        FlowKind::SocialMedia => store.delete_by_key::<SocialMediaRecord>(key)?,
        FlowKind::Favorite => store.delete_by_key::<FavoriteRecord>(key)?,
    };
    info!(flow = %kind, key, removed, "picture deleted");
    Ok(removed)
}

/// Delete a row and the file it describes. Favorites have no file of their own.
pub fn discard_picture(store: &FlowStore, kind: FlowKind, key: &str) -> Result<usize> {
    let removed = delete_picture(store, kind, key)?;
    if kind.is_virtual() {
        return Ok(removed);
    }
    match fs::remove_file(key) {
        Ok(()) => debug!(path = key, "removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(removed)
}

/// Mark or unmark the picture whose preview is `preview` as a favorite. The
/// base row's flag and the favorite row change together.
pub fn set_favorite(store: &mut FlowStore, preview: &Path, favorited: bool) -> Result<usize> {
    let preview = path_key(preview);
    let changed = store.unit_of_work(|conn| {
        let bases: Vec<BaseRecord> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM base_flow WHERE preview = ?1",
                BaseRecord::COLUMNS.join(", ")
            ))?;
            let rows = stmt
                .query_map(params![preview], BaseRecord::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        if bases.is_empty() {
            return Err(Error::NotFound(format!("base picture with preview {preview}")));
        }

        for base in &bases {
            conn.execute(
                "UPDATE base_flow SET favorited = ?1 WHERE base = ?2",
                params![favorited as i64, base.key()],
            )?;
            if favorited {
                let favorite = FavoriteRecord {
                    collection: base.collection.clone(),
                    album: base.album.clone(),
                    preview: base.preview.clone(),
                    base: base.base.clone(),
                };
                match relation::insert(conn, &favorite) {
                    Err(e) if e.is_duplicate_key() => {}
                    other => other?,
                }
            } else {
                conn.execute(
                    "DELETE FROM favorite_flow WHERE base = ?1 AND album = ?2",
                    params![base.key(), base.album],
                )?;
            }
        }
        Ok(bases.len())
    })?;

    info!(preview = %preview, favorited, "favorite updated");
    Ok(changed)
}
