use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::{self, FlowStore};
use crate::convert::{CancelToken, PreviewConverter};
use crate::domain::*;
use crate::error::{Error, Result};
use crate::layout::{path_key, Album, FlowLayout};
use crate::settings::{IoPolicy, Settings};

/// Progress callback events for an ingestion batch.
pub enum IngestProgress {
    /// Starting ingestion with total count.
    Start { total: usize },
    /// A picture was copied into one of the album's flows.
    Copied { flow: FlowKind, target: PathBuf },
    /// The picture was already ingested into this album.
    Skipped { source: PathBuf },
    /// Preview conversions are starting.
    Converting { total: usize },
    /// A preview was written and recorded.
    Converted { preview: PathBuf },
    /// Copying or converting a picture failed; the batch continues.
    Failed { source: PathBuf, message: String },
    /// Ingestion completed.
    Complete { ingested: usize, previews: usize },
}

/// One failed step of one picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    pub source: PathBuf,
    pub flow: FlowKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Pictures with base and backup copies recorded.
    pub ingested: usize,
    pub previews: usize,
    pub skipped: usize,
    pub failures: Vec<IngestFailure>,
    /// The batch stopped early (I/O failure under `IoPolicy::Abort`, or cancellation).
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub quality: u8,
    pub workers: usize,
    pub io_policy: IoPolicy,
}

impl From<&Settings> for IngestOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            quality: settings.quality,
            workers: settings.conversion_workers,
            io_policy: settings.io_policy,
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions::from(&Settings::default())
    }
}

/// Copy a single file to the target path, creating parent directories as needed.
/// Returns Ok(false) if skipped (file exists with same size), Ok(true) if copied.
pub fn copy_picture(source: &Path, target: &Path) -> Result<bool> {
    let expected_size = source.metadata()?.len();
    if let Ok(metadata) = target.metadata() {
        if metadata.len() == expected_size {
            return Ok(false);
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::copy(source, target)?;
    Ok(true)
}

struct PendingPreview<'a> {
    picture: &'a CapturedPicture,
    base: PathBuf,
    preview: PathBuf,
}

fn emit(progress: &mut Option<&mut dyn FnMut(IngestProgress)>, event: IngestProgress) {
    if let Some(cb) = progress.as_mut() {
        cb(event);
    }
}

/// Ingest a batch of captured pictures into `album`.
///
/// Base and backup copies are made and recorded one picture at a time. Previews
/// are then converted on a bounded worker pool without holding the store lock,
/// and recorded once the pool is done. A picture whose conversion fails keeps
/// its base and backup. Database errors abort the batch; pictures already
/// recorded stay recorded.
#[allow(clippy::too_many_arguments)]
pub fn ingest(
    store: &Mutex<FlowStore>,
    album: &Album,
    layout: &FlowLayout,
    pictures: &[CapturedPicture],
    converter: &dyn PreviewConverter,
    options: &IngestOptions,
    cancel: &CancelToken,
    mut progress: Option<&mut dyn FnMut(IngestProgress)>,
) -> Result<IngestReport> {
    album.create_directories(layout)?;
    emit(&mut progress, IngestProgress::Start { total: pictures.len() });

    let album_key = album.key();
    let mut report = IngestReport::default();
    let mut pending: Vec<PendingPreview<'_>> = Vec::new();

    // ── Base and backup copies ───────────────────────────────────
    for picture in pictures {
        if cancel.is_cancelled() {
            report.aborted = true;
            break;
        }

        let base = album.base_path(layout, &picture.hashed_name);
        let backup = album.backup_path(layout, &picture.hashed_name);
        let preview = album.preview_path(layout, &picture.hashed_name);

        let base_record = BaseRecord {
            collection: album.collection.clone(),
            name: picture.name.clone(),
            album: album_key.clone(),
            favorited: false,
            backup: Some(backup.clone()),
            preview: Some(preview.clone()),
            base: base.clone(),
            date: picture.date.clone(),
            time: picture.time.clone(),
        };
        let backup_record = BackupRecord {
            collection: album.collection.clone(),
            name: picture.name.clone(),
            album: album_key.clone(),
            backup: backup.clone(),
            date: picture.date.clone(),
            time: picture.time.clone(),
        };

        let mut copied_all = true;
        for (flow, target) in [(FlowKind::Base, &base), (FlowKind::Backup, &backup)] {
            match copy_picture(&picture.source, target) {
                Ok(copied) => {
                    debug!(source = %picture.source.display(), target = %target.display(), copied, "copy");
                    emit(
                        &mut progress,
                        IngestProgress::Copied {
                            flow,
                            target: target.clone(),
                        },
                    );
                }
                Err(e) => {
                    warn!(source = %picture.source.display(), flow = %flow, error = %e, "copy failed");
                    emit(
                        &mut progress,
                        IngestProgress::Failed {
                            source: picture.source.clone(),
                            message: e.to_string(),
                        },
                    );
                    report.failures.push(IngestFailure {
                        source: picture.source.clone(),
                        flow,
                        message: e.to_string(),
                    });
                    copied_all = false;
                    break;
                }
            }
        }
        if !copied_all {
            if options.io_policy == IoPolicy::Abort {
                report.aborted = true;
                break;
            }
            continue;
        }

        {
            let guard = catalog::lock(store)?;
            match guard.insert(&base_record) {
                Err(e) if e.is_duplicate_key() => {
                    info!(base = %base.display(), "already ingested; skipped");
                    report.skipped += 1;
                    emit(
                        &mut progress,
                        IngestProgress::Skipped {
                            source: picture.source.clone(),
                        },
                    );
                    // A preview lost to an earlier failed conversion is retried.
                    let recorded = !guard.query_by_key::<PreviewRecord>(&path_key(&preview))?.is_empty();
                    if !recorded || !preview.is_file() {
                        debug!(preview = %preview.display(), "preview missing; converting again");
                        pending.push(PendingPreview {
                            picture,
                            base,
                            preview,
                        });
                    }
                    continue;
                }
                other => other?,
            }
            match guard.insert(&backup_record) {
                Err(e) if e.is_duplicate_key() => {
                    debug!(backup = %backup.display(), "backup already recorded");
                }
                other => other?,
            }
        }

        report.ingested += 1;
        pending.push(PendingPreview {
            picture,
            base,
            preview,
        });
    }

    // ── Preview conversions ──────────────────────────────────────
    emit(&mut progress, IngestProgress::Converting { total: pending.len() });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .thread_name(|i| format!("convert-{i}"))
        .build()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let quality = options.quality;
    let results: Vec<Result<()>> = pool.install(|| {
        pending
            .par_iter()
            .map(|job| converter.convert(&job.picture.source, quality, &job.preview, cancel))
            .collect()
    });

    // ── Preview records ──────────────────────────────────────────
    let guard = catalog::lock(store)?;
    for (job, result) in pending.iter().zip(results) {
        if let Err(e) = result {
            if matches!(e, Error::Cancelled) {
                report.aborted = true;
            }
            warn!(source = %job.picture.source.display(), error = %e, "preview conversion failed");
            emit(
                &mut progress,
                IngestProgress::Failed {
                    source: job.picture.source.clone(),
                    message: e.to_string(),
                },
            );
            report.failures.push(IngestFailure {
                source: job.picture.source.clone(),
                flow: FlowKind::Preview,
                message: e.to_string(),
            });
            continue;
        }

        let record = PreviewRecord {
            collection: album.collection.clone(),
            name: job.picture.name.clone(),
            album: album_key.clone(),
            base: job.base.clone(),
            preview: job.preview.clone(),
            date: job.picture.date.clone(),
            time: job.picture.time.clone(),
        };
        match guard.insert(&record) {
            Err(e) if e.is_duplicate_key() => {
                debug!(preview = %job.preview.display(), "preview already recorded");
            }
            other => other?,
        }
        report.previews += 1;
        emit(
            &mut progress,
            IngestProgress::Converted {
                preview: job.preview.clone(),
            },
        );
    }
    drop(guard);

    info!(
        album = %album_key,
        ingested = report.ingested,
        previews = report.previews,
        skipped = report.skipped,
        failed = report.failures.len(),
        "ingestion finished"
    );
    emit(
        &mut progress,
        IngestProgress::Complete {
            ingested: report.ingested,
            previews: report.previews,
        },
    );
    Ok(report)
}
