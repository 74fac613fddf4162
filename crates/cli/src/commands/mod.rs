pub mod album;
pub mod config;
pub mod flows;
pub mod ingest;
pub mod legacy;
pub mod picture;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};
use picturebot_core::layout::Album;

/// Resolve an album directory given on the command line; its parent is the collection.
pub(crate) fn album_at(dir: &Path) -> Result<Album> {
    let collection = dir
        .parent()
        .with_context(|| format!("{} has no collection directory", dir.display()))?;
    Ok(Album::from_dir(collection.to_string_lossy(), dir)?)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
