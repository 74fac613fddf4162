use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF parsing error: {0}")]
    Exif(#[from] exif::Error),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("{relation} flow already holds {key}")]
    DuplicateKey { relation: &'static str, key: String },

    #[error("no matching record: {0}")]
    NotFound(String),

    #[error("album already has flow records: {0}")]
    AlbumExists(String),

    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    #[error("the {0} flow is not filled by external tools and cannot be watched")]
    NotWatched(crate::domain::FlowKind),

    #[error("failed to convert {}: {message}", .path.display())]
    ConversionFailed { path: PathBuf, message: String },

    #[error("conversion of {} timed out after {}s", .path.display(), .timeout.as_secs())]
    ConversionTimedOut { path: PathBuf, timeout: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("album directory must be named `<name> <YYYY-MM-DD>`: {}", .0.display())]
    InvalidAlbumName(PathBuf),

    #[error("invalid picture name: {0:?}")]
    InvalidName(String),

    #[error("invalid value for setting {key}: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("catalog schema version {db} is newer than supported version {code}")]
    SchemaTooNew { db: u32, code: u32 },

    #[error("flow store lock poisoned by a panicking watcher")]
    StorePoisoned,
}

impl Error {
    /// Key collisions are expected for repeated watcher events and legacy re-imports.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
