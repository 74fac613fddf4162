use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One categorized representation of a picture, each persisted in its own relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowKind {
    Base,
    Backup,
    Preview,
    Edited,
    SocialMedia,
    Favorite,
}

impl FlowKind {
    pub const ALL: [FlowKind; 6] = [
        FlowKind::Base,
        FlowKind::Backup,
        FlowKind::Preview,
        FlowKind::Edited,
        FlowKind::SocialMedia,
        FlowKind::Favorite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Base => "base",
            FlowKind::Backup => "backup",
            FlowKind::Preview => "preview",
            FlowKind::Edited => "edited",
            FlowKind::SocialMedia => "social-media",
            FlowKind::Favorite => "favorite",
        }
    }

    /// Flows whose subdirectory is filled by external tools and reconciled by watchers.
    pub fn is_watched(&self) -> bool {
        matches!(self, FlowKind::Edited | FlowKind::SocialMedia)
    }

    /// The favorites flow is a marker only; it has no directory of its own on disk.
    pub fn is_virtual(&self) -> bool {
        matches!(self, FlowKind::Favorite)
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(FlowKind::Base),
            "backup" => Ok(FlowKind::Backup),
            "preview" => Ok(FlowKind::Preview),
            "edited" => Ok(FlowKind::Edited),
            "social-media" | "socialmedia" | "social" => Ok(FlowKind::SocialMedia),
            "favorite" | "favorites" => Ok(FlowKind::Favorite),
            _ => Err(Error::UnknownFlow(s.to_string())),
        }
    }
}

/// Row of the base flow: the original copy of a picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRecord {
    pub collection: String,
    pub name: String,
    pub album: String,
    pub favorited: bool,
    pub backup: Option<PathBuf>,
    pub preview: Option<PathBuf>,
    pub base: PathBuf,
    pub date: String,
    pub time: String,
}

/// Row of the backup flow. Backup rows stand alone; nothing references them by key
/// except the base row's `backup` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub collection: String,
    pub name: String,
    pub album: String,
    pub backup: PathBuf,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRecord {
    pub collection: String,
    pub name: String,
    pub album: String,
    pub base: PathBuf,
    pub preview: PathBuf,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedRecord {
    pub collection: String,
    pub album: String,
    pub preview: Option<PathBuf>,
    pub base: PathBuf,
    pub edited: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMediaRecord {
    pub collection: String,
    pub album: String,
    pub preview: Option<PathBuf>,
    pub base: PathBuf,
    pub social_media: PathBuf,
}

/// Favorite marker, keyed by (base, album). No file of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub collection: String,
    pub album: String,
    pub preview: Option<PathBuf>,
    pub base: PathBuf,
}

/// A freshly captured picture, already content-addressed and timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPicture {
    /// Where the picture currently lives (camera card, download folder, ...).
    pub source: PathBuf,
    /// Content-addressed file name, e.g. `3f2a...e1.jpg`.
    pub hashed_name: String,
    /// Human-facing capture name.
    pub name: String,
    pub date: String,
    pub time: String,
}

/// Rename request for a single picture. Matched by (old preview path, album).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureRename {
    pub album: String,
    pub preview: PathBuf,
    pub name: String,
}

/// Rows removed per relation by a cascading album delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub base: usize,
    pub backup: usize,
    pub preview: usize,
    pub edited: usize,
    pub social_media: usize,
    pub favorite: usize,
}

impl DeleteSummary {
    pub fn total(&self) -> usize {
        self.base + self.backup + self.preview + self.edited + self.social_media + self.favorite
    }
}

/// Per-relation row counts, used by the CLI status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub counts: Vec<(FlowKind, usize)>,
}
