pub mod capture;
pub mod catalog;
pub mod convert;
pub mod domain;
pub mod error;
pub mod hasher;
pub mod ingest;
pub mod layout;
pub mod legacy;
pub mod settings;
pub mod sync;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use catalog::{FlowStore, Relation};
use convert::{CancelToken, ImageConverter, MagickConverter, PreviewConverter};
use domain::*;
use error::Result;
use ingest::{IngestOptions, IngestProgress, IngestReport};
use layout::Album;
use legacy::{LegacyImport, LegacyReport};
use settings::Settings;
use watch::Session;

/// Value of `conversion.program` selecting the in-process converter.
pub const BUILTIN_CONVERTER: &str = "builtin";

/// The main entry point for the picturebot library: one flow store plus the
/// settings persisted in it. Commands lock the store for their duration;
/// watchers started from [`Library::session`] share the same store.
pub struct Library {
    store: Arc<Mutex<FlowStore>>,
    settings: Settings,
}

impl Library {
    /// Open or create a library at the given catalog path.
    pub fn open(catalog_path: &Path) -> Result<Self> {
        Self::from_store(FlowStore::open(catalog_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_store(FlowStore::open_in_memory()?)
    }

    fn from_store(store: FlowStore) -> Result<Self> {
        let settings = Settings::load(&store)?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            settings,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, FlowStore>> {
        catalog::lock(&self.store)
    }

    // ── Settings ─────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate, persist and apply one setting.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        let settings = Settings::set(&*self.lock()?, key, value)?;
        self.settings = settings;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.lock()?.get_config(key)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        self.lock()?.list_config()
    }

    // ── Ingestion ────────────────────────────────────────────────

    /// Ingest captured pictures into `album` with the converter configured by
    /// `conversion.program`. An external converter that cannot be started fails
    /// the batch before anything is copied.
    pub fn ingest(
        &self,
        album: &Album,
        pictures: &[CapturedPicture],
        cancel: &CancelToken,
        progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> Result<IngestReport> {
        if self.settings.conversion_program == BUILTIN_CONVERTER {
            return self.ingest_with(album, pictures, &ImageConverter, cancel, progress);
        }
        let converter = MagickConverter::new(
            &self.settings.conversion_program,
            self.settings.conversion_timeout,
        );
        converter.check_available()?;
        self.ingest_with(album, pictures, &converter, cancel, progress)
    }

    pub fn ingest_with(
        &self,
        album: &Album,
        pictures: &[CapturedPicture],
        converter: &dyn PreviewConverter,
        cancel: &CancelToken,
        progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> Result<IngestReport> {
        ingest::ingest(
            &self.store,
            album,
            &self.settings.layout,
            pictures,
            converter,
            &IngestOptions::from(&self.settings),
            cancel,
            progress,
        )
    }

    // ── Renames and deletes ──────────────────────────────────────

    pub fn rename_album(&self, old: &str, new: &str) -> Result<usize> {
        sync::rename_album(&mut *self.lock()?, old, new)
    }

    /// Rename an album and move its directory along with it.
    pub fn relocate_album(&self, old: &Album, new: &Album) -> Result<usize> {
        sync::relocate_album(&mut *self.lock()?, &old.path, &new.path)
    }

    pub fn rename_picture(&self, update: &PictureRename) -> Result<PathBuf> {
        sync::rename_picture(&mut *self.lock()?, update)
    }

    pub fn delete_album(&self, album: &str) -> Result<DeleteSummary> {
        sync::delete_album(&mut *self.lock()?, album)
    }

    pub fn delete_picture(&self, kind: FlowKind, key: &str) -> Result<usize> {
        sync::delete_picture(&*self.lock()?, kind, key)
    }

    pub fn discard_picture(&self, kind: FlowKind, key: &str) -> Result<usize> {
        sync::discard_picture(&*self.lock()?, kind, key)
    }

    pub fn set_favorite(&self, preview: &Path, favorited: bool) -> Result<usize> {
        sync::set_favorite(&mut *self.lock()?, preview, favorited)
    }

    // ── Legacy import ────────────────────────────────────────────

    pub fn import_legacy(&self, import: &LegacyImport) -> Result<LegacyReport> {
        legacy::import_legacy(
            &mut *self.lock()?,
            import,
            &self.settings.layout,
            self.settings.tie_break,
        )
    }

    // ── Watching ─────────────────────────────────────────────────

    /// A watch session sharing this library's store.
    pub fn session(&self) -> Session {
        Session::new(Arc::clone(&self.store), self.settings.layout.clone())
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Records of one flow, optionally restricted to one album.
    pub fn records<R: Relation>(&self, album: Option<&str>) -> Result<Vec<R>> {
        let store = self.lock()?;
        match album {
            Some(album) => store.query_by_album::<R>(album),
            None => store.query_all::<R>(),
        }
    }

    pub fn stats(&self) -> Result<FlowStats> {
        self.lock()?.stats()
    }
}
