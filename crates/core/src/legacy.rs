use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::capture::CaptureMoment;
use crate::catalog::{relation, FlowStore};
use crate::domain::*;
use crate::error::{Error, Result};
use crate::ingest::copy_picture;
use crate::layout::{basename_without_extension, Album, FlowLayout};
use crate::settings::TieBreak;

/// A legacy album directory named `<name> <YYYY-MM-DD>`, with one subdirectory
/// per flow named after `layout`, to be imported into `collection`.
#[derive(Debug, Clone)]
pub struct LegacyImport {
    pub legacy_root: PathBuf,
    pub collection: String,
    pub layout: FlowLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyReport {
    pub album: String,
    pub backups: usize,
    pub bases: usize,
    pub previews: usize,
    pub edited: usize,
    pub social_media: usize,
    pub favorites: usize,
    /// Base pictures imported without a backup or preview counterpart.
    pub missing_backup: usize,
    pub missing_preview: usize,
    /// Files already recorded by an earlier import.
    pub skipped: usize,
    /// Files that could not be read or copied.
    pub failed: usize,
}

#[derive(Debug, Clone)]
struct LegacyFile {
    path: PathBuf,
    file_name: OsString,
    stem: String,
    size: u64,
    modified: SystemTime,
}

/// Regular files directly inside `dir`, by name, following symlinks. A missing
/// directory holds nothing. Entries that cannot be read are logged, counted in
/// `unreadable` and left out.
fn scan(dir: &Path, unreadable: &mut usize) -> Vec<LegacyFile> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "legacy subdirectory missing; nothing to import");
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        match legacy_file(entry) {
            Ok(Some(file)) => files.push(file),
            Ok(None) => {}
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "legacy entry not readable; skipped");
                *unreadable += 1;
            }
        }
    }
    files
}

fn legacy_file(entry: walkdir::Result<walkdir::DirEntry>) -> Result<Option<LegacyFile>> {
    let entry = entry?;
    if !entry.file_type().is_file() {
        return Ok(None);
    }
    let metadata = entry.metadata()?;
    Ok(Some(LegacyFile {
        path: entry.path().to_path_buf(),
        file_name: entry.file_name().to_os_string(),
        stem: basename_without_extension(entry.path()),
        size: metadata.len(),
        modified: metadata.modified()?,
    }))
}

fn by_stem<'a>(files: &'a [LegacyFile], stem: &str, tie_break: TieBreak) -> Option<&'a LegacyFile> {
    tie_break.pick(files.iter().filter(|f| f.stem == stem).collect())
}

struct Counterparts<'a> {
    backup: Option<&'a LegacyFile>,
    preview: Option<&'a LegacyFile>,
    edited: Option<&'a LegacyFile>,
    social_media: Option<&'a LegacyFile>,
    favorite: Option<&'a LegacyFile>,
}

struct LegacyTree {
    backups: Vec<LegacyFile>,
    bases: Vec<LegacyFile>,
    previews: Vec<LegacyFile>,
    edited: Vec<LegacyFile>,
    social_media: Vec<LegacyFile>,
    favorites: Vec<LegacyFile>,
    /// Directory entries that could not be read.
    unreadable: usize,
}

impl LegacyTree {
    fn scan(root: &Path, layout: &FlowLayout) -> Self {
        let dir = |kind| root.join(layout.dir_name(kind));
        let mut unreadable = 0;
        Self {
            backups: scan(&dir(FlowKind::Backup), &mut unreadable),
            bases: scan(&dir(FlowKind::Base), &mut unreadable),
            previews: scan(&dir(FlowKind::Preview), &mut unreadable),
            edited: scan(&dir(FlowKind::Edited), &mut unreadable),
            social_media: scan(&dir(FlowKind::SocialMedia), &mut unreadable),
            favorites: scan(&dir(FlowKind::Favorite), &mut unreadable),
            unreadable,
        }
    }

    fn counterparts(&self, base: &LegacyFile, tie_break: TieBreak) -> Counterparts<'_> {
        let backup = tie_break.pick(
            self.backups
                .iter()
                .filter(|b| b.size == base.size && b.modified == base.modified)
                .collect(),
        );
        Counterparts {
            backup,
            preview: by_stem(&self.previews, &base.stem, tie_break),
            edited: by_stem(&self.edited, &base.stem, tie_break),
            social_media: by_stem(&self.social_media, &base.stem, tie_break),
            favorite: by_stem(&self.favorites, &base.stem, tie_break),
        }
    }
}

/// Rebuild the flow records of one legacy album.
///
/// Every legacy backup is copied and recorded on its own. Each legacy base
/// picture is then correlated with a backup of identical size and
/// modification time, and with preview, edited, social-media and favorite
/// files of the same stem. Whatever was found is copied into the canonical
/// album tree and recorded in one unit of work per picture; counterparts that
/// were not found are left absent.
pub fn import_legacy(
    store: &mut FlowStore,
    import: &LegacyImport,
    layout: &FlowLayout,
    tie_break: TieBreak,
) -> Result<LegacyReport> {
    let album = Album::from_dir(import.collection.clone(), &import.legacy_root)?;
    album.create_directories(layout)?;
    let album_key = album.key();
    let tree = LegacyTree::scan(&import.legacy_root, &import.layout);

    let mut report = LegacyReport {
        album: album_key.clone(),
        failed: tree.unreadable,
        ..LegacyReport::default()
    };

    // ── Backups stand alone ──────────────────────────────────────
    for file in &tree.backups {
        let target = album.backup_path(layout, &file.file_name.to_string_lossy());
        if let Err(e) = copy_picture(&file.path, &target) {
            warn!(file = %file.path.display(), error = %e, "legacy backup not copied");
            report.failed += 1;
            continue;
        }
        let record = BackupRecord {
            collection: album.collection.clone(),
            name: album.name.clone(),
            album: album_key.clone(),
            backup: target,
            date: album.date.clone(),
            time: CaptureMoment::from_system_time(file.modified).time,
        };
        match store.insert(&record) {
            Ok(()) => report.backups += 1,
            Err(e) if e.is_duplicate_key() => report.skipped += 1,
            Err(e) => return Err(e),
        }
    }

    // ── Base pictures and their counterparts ─────────────────────
    for base in &tree.bases {
        let found = tree.counterparts(base, tie_break);
        match import_picture(store, &album, layout, base, &found) {
            Ok(()) => {
                report.bases += 1;
                report.previews += usize::from(found.preview.is_some());
                report.edited += usize::from(found.edited.is_some());
                report.social_media += usize::from(found.social_media.is_some());
                report.favorites += usize::from(found.favorite.is_some());
                report.missing_backup += usize::from(found.backup.is_none());
                report.missing_preview += usize::from(found.preview.is_none());
            }
            Err(e) if e.is_duplicate_key() => {
                debug!(base = %base.path.display(), "legacy picture already imported");
                report.skipped += 1;
            }
            Err(Error::Io(e)) => {
                warn!(base = %base.path.display(), error = %e, "legacy picture not imported");
                report.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        album = %album_key,
        bases = report.bases,
        backups = report.backups,
        previews = report.previews,
        skipped = report.skipped,
        failed = report.failed,
        "legacy album imported"
    );
    Ok(report)
}

fn import_picture(
    store: &mut FlowStore,
    album: &Album,
    layout: &FlowLayout,
    base: &LegacyFile,
    found: &Counterparts<'_>,
) -> Result<()> {
    let target_in = |kind: FlowKind, file: &LegacyFile| album.flow_dir(layout, kind).join(&file.file_name);
    let album_key = album.key();
    let time = CaptureMoment::from_system_time(base.modified).time;

    let base_target = target_in(FlowKind::Base, base);
    let backup_target = found.backup.map(|b| target_in(FlowKind::Backup, b));
    let preview_target = found.preview.map(|p| target_in(FlowKind::Preview, p));
    let edited_target = found.edited.map(|e| target_in(FlowKind::Edited, e));
    let social_target = found.social_media.map(|s| target_in(FlowKind::SocialMedia, s));

    // Files first, so records never point at a file that was not copied.
    copy_picture(&base.path, &base_target)?;
    if let (Some(file), Some(target)) = (found.preview, &preview_target) {
        copy_picture(&file.path, target)?;
    }
    if let (Some(file), Some(target)) = (found.edited, &edited_target) {
        copy_picture(&file.path, target)?;
    }
    if let (Some(file), Some(target)) = (found.social_media, &social_target) {
        copy_picture(&file.path, target)?;
    }

    store.unit_of_work(|conn| {
        if let Some(edited) = &edited_target {
            relation::insert(
                conn,
                &EditedRecord {
                    collection: album.collection.clone(),
                    album: album_key.clone(),
                    preview: preview_target.clone(),
                    base: base_target.clone(),
                    edited: edited.clone(),
                },
            )?;
        }
        if let Some(social_media) = &social_target {
            relation::insert(
                conn,
                &SocialMediaRecord {
                    collection: album.collection.clone(),
                    album: album_key.clone(),
                    preview: preview_target.clone(),
                    base: base_target.clone(),
                    social_media: social_media.clone(),
                },
            )?;
        }
        if found.favorite.is_some() {
            relation::insert(
                conn,
                &FavoriteRecord {
                    collection: album.collection.clone(),
                    album: album_key.clone(),
                    preview: preview_target.clone(),
                    base: base_target.clone(),
                },
            )?;
        }
        relation::insert(
            conn,
            &BaseRecord {
                collection: album.collection.clone(),
                name: album.name.clone(),
                album: album_key.clone(),
                favorited: found.favorite.is_some(),
                backup: backup_target.clone(),
                preview: preview_target.clone(),
                base: base_target.clone(),
                date: album.date.clone(),
                time: time.clone(),
            },
        )?;
        if let Some(preview) = &preview_target {
            relation::insert(
                conn,
                &PreviewRecord {
                    collection: album.collection.clone(),
                    name: album.name.clone(),
                    album: album_key.clone(),
                    base: base_target.clone(),
                    preview: preview.clone(),
                    date: album.date.clone(),
                    time: time.clone(),
                },
            )?;
        }
        Ok(())
    })
}
