pub mod session;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, trace, warn};

use crate::catalog::FlowStore;
use crate::domain::*;
use crate::error::{Error, Result};
use crate::layout::{basename_without_extension, path_key, Album, FlowLayout};

pub use session::Session;

/// What happened to a file inside a watched flow directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

/// Outcome of reconciling one event into the flow store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    /// The row already existed; repeated create/modify events land here.
    Duplicate,
    /// No preview of the album has the same stem.
    Unmatched,
    Removed(usize),
    /// Directories, hidden files and names without a stem.
    Ignored,
}

/// Flatten a notify event into per-file create/modify/remove events.
pub fn translate(event: &Event) -> Vec<WatchEvent> {
    let each = |kind: WatchEventKind| {
        event
            .paths
            .iter()
            .map(|path| WatchEvent {
                kind,
                path: path.clone(),
            })
            .collect::<Vec<_>>()
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => each(WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(WatchEventKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                WatchEvent {
                    kind: WatchEventKind::Removed,
                    path: from.clone(),
                },
                WatchEvent {
                    kind: WatchEventKind::Created,
                    path: to.clone(),
                },
            ],
            _ => Vec::new(),
        },
        // Backends that cannot tell which side of a rename they saw.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| WatchEvent {
                kind: if path.exists() {
                    WatchEventKind::Created
                } else {
                    WatchEventKind::Removed
                },
                path: path.clone(),
            })
            .collect(),
        EventKind::Modify(_) => each(WatchEventKind::Modified),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => each(WatchEventKind::Modified),
        EventKind::Remove(_) => each(WatchEventKind::Removed),
        _ => {
            trace!(?event, "ignored watch event");
            Vec::new()
        }
    }
}

/// Apply one filesystem event in the `kind` directory of `album` to the store.
///
/// A created or modified file is correlated to the album's preview with the
/// same stem and recorded under `<album>/<flow dir>/<file name>`. A removed
/// file deletes that row.
pub fn reconcile(
    store: &FlowStore,
    album: &Album,
    layout: &FlowLayout,
    kind: FlowKind,
    event: &WatchEvent,
) -> Result<Reconciled> {
    if !kind.is_watched() {
        return Err(Error::NotWatched(kind));
    }
    let Some(file_name) = event.path.file_name() else {
        return Ok(Reconciled::Ignored);
    };
    if file_name.to_string_lossy().starts_with('.') {
        return Ok(Reconciled::Ignored);
    }
    let key = album.flow_dir(layout, kind).join(file_name);

    match event.kind {
        WatchEventKind::Removed => {
            let removed = match kind {
                FlowKind::Edited => store.delete_by_key::<EditedRecord>(&path_key(&key))?,
                _ => store.delete_by_key::<SocialMediaRecord>(&path_key(&key))?,
            };
            debug!(flow = %kind, key = %key.display(), removed, "watched file removed");
            Ok(Reconciled::Removed(removed))
        }
        WatchEventKind::Created | WatchEventKind::Modified => {
            if event.path.is_dir() {
                return Ok(Reconciled::Ignored);
            }
            let stem = basename_without_extension(Path::new(file_name));
            if stem.is_empty() {
                return Ok(Reconciled::Ignored);
            }

            let prefix = album.flow_dir(layout, FlowKind::Preview).join(&stem);
            let album_key = album.key();
            let Some(preview) = store
                .query_by_key_prefix::<PreviewRecord>(&path_key(&prefix))?
                .into_iter()
                .find(|p| p.album == album_key && basename_without_extension(&p.preview) == stem)
            else {
                warn!(
                    flow = %kind,
                    file = %event.path.display(),
                    album = %album_key,
                    "no preview matches watched file; skipped"
                );
                return Ok(Reconciled::Unmatched);
            };

            let inserted = match kind {
                FlowKind::Edited => store.insert(&EditedRecord {
                    collection: album.collection.clone(),
                    album: album_key,
                    preview: Some(preview.preview),
                    base: preview.base,
                    edited: key.clone(),
                }),
                _ => store.insert(&SocialMediaRecord {
                    collection: album.collection.clone(),
                    album: album_key,
                    preview: Some(preview.preview),
                    base: preview.base,
                    social_media: key.clone(),
                }),
            };
            match inserted {
                Ok(()) => {
                    info!(flow = %kind, key = %key.display(), "watched file recorded");
                    Ok(Reconciled::Inserted)
                }
                Err(e) if e.is_duplicate_key() => Ok(Reconciled::Duplicate),
                Err(e) => Err(e),
            }
        }
    }
}

// ── Watcher handle ───────────────────────────────────────────────────

enum Msg {
    Event(notify::Result<Event>),
    Stop,
}

/// Watches one flow directory of one album and reconciles its events on a
/// worker thread. Dropping or cancelling the handle stops the watcher and
/// joins the worker.
pub struct FlowWatcher {
    kind: FlowKind,
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    tx: Sender<Msg>,
    handle: Option<JoinHandle<()>>,
}

impl FlowWatcher {
    pub fn start(
        store: Arc<Mutex<FlowStore>>,
        album: Album,
        layout: FlowLayout,
        kind: FlowKind,
    ) -> Result<Self> {
        if !kind.is_watched() {
            return Err(Error::NotWatched(kind));
        }
        let dir = album.flow_dir(&layout, kind);
        fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::channel();
        let events_tx = tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                if events_tx.send(Msg::Event(result)).is_err() {
                    trace!("watch worker gone; dropping event");
                }
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let handle = thread::Builder::new()
            .name(format!("watch-{kind}"))
            .spawn(move || run_worker(rx, store, album, layout, kind))?;

        info!(flow = %kind, dir = %dir.display(), "watching");
        Ok(Self {
            kind,
            dir,
            watcher: Some(watcher),
            tx,
            handle: Some(handle),
        })
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop watching and wait for in-flight events to be reconciled.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.handle.is_none() {
            return;
        }
        drop(self.watcher.take());
        let _ = self.tx.send(Msg::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(flow = %self.kind, "watch worker panicked");
            }
        }
        info!(flow = %self.kind, dir = %self.dir.display(), "stopped watching");
    }
}

impl Drop for FlowWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    rx: Receiver<Msg>,
    store: Arc<Mutex<FlowStore>>,
    album: Album,
    layout: FlowLayout,
    kind: FlowKind,
) {
    for msg in rx {
        let event = match msg {
            Msg::Stop => break,
            Msg::Event(Ok(event)) => event,
            Msg::Event(Err(e)) => {
                warn!(flow = %kind, error = %e, "watch error");
                continue;
            }
        };

        for change in translate(&event) {
            let Ok(guard) = store.lock() else {
                error!(flow = %kind, "flow store lock poisoned; stopping watcher");
                return;
            };
            match reconcile(&guard, &album, &layout, kind, &change) {
                Ok(outcome) => trace!(?outcome, path = %change.path.display(), "reconciled"),
                Err(e) => warn!(flow = %kind, path = %change.path.display(), error = %e, "reconcile failed"),
            }
        }
    }
}
