use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::FlowKind;
use crate::error::{Error, Result};

/// Subdirectory names of each flow inside an album directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLayout {
    pub base: String,
    pub backup: String,
    pub preview: String,
    pub edited: String,
    pub social_media: String,
    pub favorites: String,
}

impl Default for FlowLayout {
    fn default() -> Self {
        Self {
            base: "base".to_string(),
            backup: "backup".to_string(),
            preview: "preview".to_string(),
            edited: "edited".to_string(),
            social_media: "social-media".to_string(),
            favorites: "favorites".to_string(),
        }
    }
}

impl FlowLayout {
    pub fn dir_name(&self, kind: FlowKind) -> &str {
        match kind {
            FlowKind::Base => &self.base,
            FlowKind::Backup => &self.backup,
            FlowKind::Preview => &self.preview,
            FlowKind::Edited => &self.edited,
            FlowKind::SocialMedia => &self.social_media,
            FlowKind::Favorite => &self.favorites,
        }
    }

    pub fn set_dir_name(&mut self, kind: FlowKind, name: String) {
        match kind {
            FlowKind::Base => self.base = name,
            FlowKind::Backup => self.backup = name,
            FlowKind::Preview => self.preview = name,
            FlowKind::Edited => self.edited = name,
            FlowKind::SocialMedia => self.social_media = name,
            FlowKind::Favorite => self.favorites = name,
        }
    }
}

/// A capture session, mapped to `<collection>/<name> <date>` on disk.
/// The album column of every flow relation stores [`Album::key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub collection: String,
    pub name: String,
    pub date: String,
    pub path: PathBuf,
}

impl Album {
    pub fn new(collection: impl Into<String>, name: impl Into<String>, date: impl Into<String>) -> Self {
        let collection = collection.into();
        let name = name.into();
        let date = date.into();
        let path = Path::new(&collection).join(format!("{name} {date}"));
        Self {
            collection,
            name,
            date,
            path,
        }
    }

    /// Rebuild an album descriptor from an existing `<name> <YYYY-MM-DD>` directory.
    pub fn from_dir(collection: impl Into<String>, dir: &Path) -> Result<Self> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidAlbumName(dir.to_path_buf()))?;
        let (name, date) = parse_album_dir_name(&dir_name)
            .ok_or_else(|| Error::InvalidAlbumName(dir.to_path_buf()))?;
        Ok(Self::new(collection, name, date))
    }

    pub fn key(&self) -> String {
        path_key(&self.path)
    }

    pub fn flow_dir(&self, layout: &FlowLayout, kind: FlowKind) -> PathBuf {
        self.path.join(layout.dir_name(kind))
    }

    pub fn base_path(&self, layout: &FlowLayout, hashed_name: &str) -> PathBuf {
        self.flow_dir(layout, FlowKind::Base).join(hashed_name)
    }

    pub fn backup_path(&self, layout: &FlowLayout, hashed_name: &str) -> PathBuf {
        self.flow_dir(layout, FlowKind::Backup).join(hashed_name)
    }

    /// Previews are always JPEG, whatever the source format.
    pub fn preview_path(&self, layout: &FlowLayout, hashed_name: &str) -> PathBuf {
        let stem = basename_without_extension(Path::new(hashed_name));
        self.flow_dir(layout, FlowKind::Preview)
            .join(format!("{stem}.jpg"))
    }

    /// Create the album directory and one subdirectory per non-virtual flow.
    pub fn create_directories(&self, layout: &FlowLayout) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        for kind in FlowKind::ALL {
            if kind.is_virtual() {
                continue;
            }
            fs::create_dir_all(self.flow_dir(layout, kind))?;
        }
        Ok(())
    }
}

/// Split `"Trip to Rome 2024-01-01"` into `("Trip to Rome", "2024-01-01")`.
pub fn parse_album_dir_name(dir_name: &str) -> Option<(String, String)> {
    let (name, date) = dir_name.trim().rsplit_once(' ')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((name.to_string(), date.to_string()))
}

pub fn basename_without_extension(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// String form of a derived path as stored in the key columns.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> FlowLayout {
        FlowLayout::default()
    }

    #[test]
    fn test_album_new_joins_collection_and_name_date() {
        let album = Album::new("C", "Trip", "2024-01-01");
        assert_eq!(album.path, PathBuf::from("C").join("Trip 2024-01-01"));
        assert_eq!(album.key(), path_key(&PathBuf::from("C/Trip 2024-01-01")));
    }

    #[test]
    fn test_derived_paths() {
        let album = Album::new("/lib/C", "Trip", "2024-01-01");
        let root = PathBuf::from("/lib/C/Trip 2024-01-01");
        assert_eq!(album.base_path(&layout(), "h1.jpg"), root.join("base/h1.jpg"));
        assert_eq!(album.backup_path(&layout(), "h1.jpg"), root.join("backup/h1.jpg"));
        assert_eq!(album.preview_path(&layout(), "h1.jpg"), root.join("preview/h1.jpg"));
    }

    #[test]
    fn test_preview_path_forces_jpg_extension() {
        let album = Album::new("/lib/C", "Trip", "2024-01-01");
        let preview = album.preview_path(&layout(), "abc123.ARW");
        assert_eq!(preview.file_name().unwrap().to_string_lossy(), "abc123.jpg");
    }

    #[test]
    fn test_custom_layout_dir_names() {
        let mut layout = layout();
        layout.set_dir_name(FlowKind::Preview, "JPGs".to_string());
        let album = Album::new("/lib", "Beach", "2023-07-14");
        assert_eq!(
            album.flow_dir(&layout, FlowKind::Preview),
            PathBuf::from("/lib/Beach 2023-07-14/JPGs")
        );
    }

    #[test]
    fn test_create_directories_skips_favorites() {
        let tmp = tempfile::tempdir().unwrap();
        let album = Album::new(tmp.path().to_string_lossy(), "Trip", "2024-01-01");
        album.create_directories(&layout()).unwrap();

        for kind in [FlowKind::Base, FlowKind::Backup, FlowKind::Preview, FlowKind::Edited, FlowKind::SocialMedia] {
            assert!(album.flow_dir(&layout(), kind).is_dir(), "{kind} dir missing");
        }
        assert!(!album.flow_dir(&layout(), FlowKind::Favorite).exists());
    }

    #[test]
    fn test_parse_album_dir_name() {
        assert_eq!(
            parse_album_dir_name("Trip to Rome 2024-01-01"),
            Some(("Trip to Rome".to_string(), "2024-01-01".to_string()))
        );
        assert_eq!(parse_album_dir_name("Trip"), None);
        assert_eq!(parse_album_dir_name("Trip 2024-13-01"), None);
        assert_eq!(parse_album_dir_name(" 2024-01-01"), None);
    }

    #[test]
    fn test_album_from_dir() {
        let album = Album::from_dir("/lib/C", Path::new("/old/Wedding 2019-05-04")).unwrap();
        assert_eq!(album.name, "Wedding");
        assert_eq!(album.date, "2019-05-04");
        assert_eq!(album.path, PathBuf::from("/lib/C/Wedding 2019-05-04"));

        let err = Album::from_dir("/lib/C", Path::new("/old/misc")).unwrap_err();
        assert!(matches!(err, Error::InvalidAlbumName(_)));
    }

    #[test]
    fn test_basename_without_extension() {
        assert_eq!(basename_without_extension(Path::new("/a/b/photo123.jpg")), "photo123");
        assert_eq!(basename_without_extension(Path::new("photo123")), "photo123");
    }
}
