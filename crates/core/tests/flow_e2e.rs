use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use picturebot_core::convert::{CancelToken, ImageConverter};
use picturebot_core::domain::*;
use picturebot_core::layout::{path_key, Album, FlowLayout};
use picturebot_core::legacy::LegacyImport;
use picturebot_core::settings::KEY_PROGRAM;
use picturebot_core::{Library, BUILTIN_CONVERTER};

/// Create a JPEG with a gradient pattern seeded by (r, g, b).
fn create_jpeg(path: &Path, r: u8, g: u8, b: u8) {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        image::Rgb([
            r.wrapping_add((x * 3) as u8),
            g.wrapping_add((y * 3) as u8),
            b.wrapping_add(((x + y) * 2) as u8),
        ])
    });
    img.save(path).unwrap();
}

fn picture(source: PathBuf, hashed: &str, name: &str) -> CapturedPicture {
    CapturedPicture {
        source,
        hashed_name: hashed.to_string(),
        name: name.to_string(),
        date: "2024-01-01".to_string(),
        time: "10:00:00".to_string(),
    }
}

fn library_with_builtin_converter(tmp: &Path) -> Library {
    let mut library = Library::open(&tmp.join("catalog.db")).unwrap();
    library.set_setting(KEY_PROGRAM, BUILTIN_CONVERTER).unwrap();
    library
}

/// Ingest one picture per seed into `album`, returning the hashed names used.
fn ingest_pictures(library: &Library, tmp: &Path, album: &Album, count: u8) -> Vec<String> {
    let sources = tmp.join("card");
    fs::create_dir_all(&sources).unwrap();
    let pictures: Vec<CapturedPicture> = (0..count)
        .map(|i| {
            let source = sources.join(format!("DSC{i}.jpg"));
            create_jpeg(&source, i * 40, 10, 200);
            picture(source, &format!("h{i}.jpg"), &format!("DSC{i}"))
        })
        .collect();
    let report = library.ingest(album, &pictures, &CancelToken::new(), None).unwrap();
    assert_eq!(report.previews, count as usize);
    pictures.into_iter().map(|p| p.hashed_name).collect()
}

fn snapshot(library: &Library) -> String {
    format!(
        "{:?}{:?}{:?}{:?}{:?}{:?}",
        library.records::<BaseRecord>(None).unwrap(),
        library.records::<BackupRecord>(None).unwrap(),
        library.records::<PreviewRecord>(None).unwrap(),
        library.records::<EditedRecord>(None).unwrap(),
        library.records::<SocialMediaRecord>(None).unwrap(),
        library.records::<FavoriteRecord>(None).unwrap(),
    )
}

// ── Ingestion ────────────────────────────────────────────────────

#[test]
fn test_ingest_scenario_h1() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("a.jpg");
    create_jpeg(&source, 10, 20, 30);
    let collection = tmp.path().join("C");
    let album = Album::new(collection.to_string_lossy(), "Trip", "2024-01-01");

    let library = Library::open(&tmp.path().join("catalog.db")).unwrap();
    let report = library
        .ingest_with(
            &album,
            &[picture(source, "h1.jpg", "a")],
            &ImageConverter,
            &CancelToken::new(),
            None,
        )
        .unwrap();
    assert_eq!((report.ingested, report.previews), (1, 1));

    let album_dir = collection.join("Trip 2024-01-01");
    let bases = library.records::<BaseRecord>(Some(&album.key())).unwrap();
    let backups = library.records::<BackupRecord>(Some(&album.key())).unwrap();
    let previews = library.records::<PreviewRecord>(Some(&album.key())).unwrap();
    assert_eq!((bases.len(), backups.len(), previews.len()), (1, 1, 1));

    assert_eq!(bases[0].base, album_dir.join("base/h1.jpg"));
    assert_eq!(backups[0].backup, album_dir.join("backup/h1.jpg"));
    assert_eq!(previews[0].preview, album_dir.join("preview/h1.jpg"));
    assert_eq!(bases[0].name, "a");
    for (date, time) in [
        (&bases[0].date, &bases[0].time),
        (&backups[0].date, &backups[0].time),
        (&previews[0].date, &previews[0].time),
    ] {
        assert_eq!(date, "2024-01-01");
        assert_eq!(time, "10:00:00");
    }

    for path in [&bases[0].base, &backups[0].backup, &previews[0].preview] {
        assert!(path.is_file(), "{} missing", path.display());
    }
}

#[test]
fn test_ingest_every_artifact_has_exactly_one_row() {
    let tmp = tempfile::tempdir().unwrap();
    let library = library_with_builtin_converter(tmp.path());
    let album = Album::new(tmp.path().join("C").to_string_lossy(), "Beach", "2023-07-14");
    let layout = FlowLayout::default();

    for hashed in ingest_pictures(&library, tmp.path(), &album, 3) {
        let base = album.base_path(&layout, &hashed);
        let backup = album.backup_path(&layout, &hashed);
        let preview = album.preview_path(&layout, &hashed);
        assert!(base.is_file() && backup.is_file() && preview.is_file());

        let bases = library.records::<BaseRecord>(Some(&album.key())).unwrap();
        assert_eq!(bases.iter().filter(|r| r.base == base).count(), 1);
        let backups = library.records::<BackupRecord>(Some(&album.key())).unwrap();
        assert_eq!(backups.iter().filter(|r| r.backup == backup).count(), 1);
        let previews = library.records::<PreviewRecord>(Some(&album.key())).unwrap();
        assert_eq!(previews.iter().filter(|r| r.preview == preview).count(), 1);
    }
}

// ── Album rename and delete ──────────────────────────────────────

#[test]
fn test_album_rename_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let library = library_with_builtin_converter(tmp.path());
    let album = Album::new(tmp.path().join("C").to_string_lossy(), "Trip", "2024-01-01");
    let other = Album::new(tmp.path().join("C").to_string_lossy(), "Other", "2024-02-02");
    let hashed = ingest_pictures(&library, tmp.path(), &album, 2);
    ingest_pictures(&library, tmp.path(), &other, 1);
    let preview = album.preview_path(&FlowLayout::default(), &hashed[0]);
    library.set_favorite(&preview, true).unwrap();
    let before = snapshot(&library);

    let renamed = Album::new(tmp.path().join("C").to_string_lossy(), "Holiday", "2024-01-01");
    library.rename_album(&album.key(), &renamed.key()).unwrap();
    assert!(library.records::<BaseRecord>(Some(&album.key())).unwrap().is_empty());
    assert_eq!(library.records::<BaseRecord>(Some(&renamed.key())).unwrap().len(), 2);
    assert_eq!(library.records::<FavoriteRecord>(Some(&renamed.key())).unwrap().len(), 1);

    library.rename_album(&renamed.key(), &album.key()).unwrap();
    assert_eq!(snapshot(&library), before);
}

#[test]
fn test_album_relocate_moves_files_and_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let library = library_with_builtin_converter(tmp.path());
    let album = Album::new(tmp.path().join("C").to_string_lossy(), "Trip", "2024-01-01");
    let hashed = ingest_pictures(&library, tmp.path(), &album, 1);

    let renamed = Album::new(tmp.path().join("C").to_string_lossy(), "Holiday", "2024-01-01");
    library.relocate_album(&album, &renamed).unwrap();

    let layout = FlowLayout::default();
    let previews = library.records::<PreviewRecord>(Some(&renamed.key())).unwrap();
    assert_eq!(previews[0].preview, renamed.preview_path(&layout, &hashed[0]));
    assert!(previews[0].preview.is_file());
    assert!(!album.path.exists());
}

#[test]
fn test_delete_album_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let library = library_with_builtin_converter(tmp.path());
    let album = Album::new(tmp.path().join("C").to_string_lossy(), "Trip", "2024-01-01");
    let other = Album::new(tmp.path().join("C").to_string_lossy(), "Other", "2024-02-02");
    let hashed = ingest_pictures(&library, tmp.path(), &album, 2);
    ingest_pictures(&library, tmp.path(), &other, 1);
    library
        .set_favorite(&album.preview_path(&FlowLayout::default(), &hashed[1]), true)
        .unwrap();

    let summary = library.delete_album(&album.key()).unwrap();
    assert_eq!((summary.base, summary.backup, summary.preview, summary.favorite), (2, 2, 2, 1));

    let again = library.delete_album(&album.key()).unwrap();
    assert_eq!(again.total(), 0);
    assert!(library.records::<BaseRecord>(Some(&album.key())).unwrap().is_empty());
    assert!(library.records::<FavoriteRecord>(Some(&album.key())).unwrap().is_empty());
    assert_eq!(library.records::<BaseRecord>(Some(&other.key())).unwrap().len(), 1);
}

// ── Picture rename and favorites ─────────────────────────────────

#[test]
fn test_rename_picture_after_ingest() {
    let tmp = tempfile::tempdir().unwrap();
    let library = library_with_builtin_converter(tmp.path());
    let album = Album::new(tmp.path().join("C").to_string_lossy(), "Trip", "2024-01-01");
    let layout = FlowLayout::default();
    let hashed = ingest_pictures(&library, tmp.path(), &album, 1);
    let old_preview = album.preview_path(&layout, &hashed[0]);

    let new_preview = library
        .rename_picture(&PictureRename {
            album: album.key(),
            preview: old_preview.clone(),
            name: "sunset".to_string(),
        })
        .unwrap();

    assert!(new_preview.is_file());
    assert!(!old_preview.exists());
    let base = &library.records::<BaseRecord>(Some(&album.key())).unwrap()[0];
    assert_eq!(base.name, "sunset");
    assert_eq!(base.preview.as_ref(), Some(&new_preview));
    assert!(base.base.is_file());
    let backup = &library.records::<BackupRecord>(Some(&album.key())).unwrap()[0];
    assert_eq!(backup.name, "sunset");
    assert!(backup.backup.is_file());
}

// ── Watch bridge ─────────────────────────────────────────────────

fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}

#[test]
fn test_watch_session_records_edited_picture_once() {
    let tmp = tempfile::tempdir().unwrap();
    let library = Library::open(&tmp.path().join("catalog.db")).unwrap();
    let album = Album::new(tmp.path().join("C").to_string_lossy(), "Trip", "2024-01-01");
    let layout = FlowLayout::default();
    let source = tmp.path().join("photo123.jpg");
    create_jpeg(&source, 1, 2, 3);
    library
        .ingest_with(
            &album,
            &[picture(source, "photo123.jpg", "photo123")],
            &ImageConverter,
            &CancelToken::new(),
            None,
        )
        .unwrap();

    let mut session = library.session();
    session.switch_album(album.clone()).unwrap();

    let edited = album.flow_dir(&layout, FlowKind::Edited).join("photo123.jpg");
    fs::write(&edited, b"edited once").unwrap();
    assert!(wait_for(|| library.records::<EditedRecord>(None).unwrap().len() == 1));

    // Rewriting the same file only produces duplicate events.
    fs::write(&edited, b"edited twice").unwrap();
    thread::sleep(Duration::from_millis(500));
    let rows = library.records::<EditedRecord>(None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].edited, edited);
    assert_eq!(rows[0].preview, Some(album.preview_path(&layout, "photo123.jpg")));

    fs::remove_file(&edited).unwrap();
    assert!(wait_for(|| library.records::<EditedRecord>(None).unwrap().is_empty()));
    session.stop();
}

// ── Legacy import ────────────────────────────────────────────────

#[test]
fn test_legacy_import_single_picture() {
    let tmp = tempfile::tempdir().unwrap();
    let legacy = tmp.path().join("old/Wedding 2019-05-04");
    for dir in ["base", "backup", "preview"] {
        fs::create_dir_all(legacy.join(dir)).unwrap();
    }
    create_jpeg(&legacy.join("base/IMG_7.jpg"), 5, 5, 5);
    fs::copy(legacy.join("base/IMG_7.jpg"), legacy.join("backup/IMG_7.jpg")).unwrap();
    create_jpeg(&legacy.join("preview/IMG_7.jpg"), 9, 9, 9);
    let mtime = filetime::FileTime::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(1_560_000_000));
    filetime::set_file_mtime(legacy.join("base/IMG_7.jpg"), mtime).unwrap();
    filetime::set_file_mtime(legacy.join("backup/IMG_7.jpg"), mtime).unwrap();

    let library = Library::open(&tmp.path().join("catalog.db")).unwrap();
    let collection = tmp.path().join("C");
    let report = library
        .import_legacy(&LegacyImport {
            legacy_root: legacy.clone(),
            collection: collection.to_string_lossy().into_owned(),
            layout: FlowLayout::default(),
        })
        .unwrap();
    assert_eq!((report.bases, report.backups, report.previews), (1, 1, 1));

    let album = Album::new(collection.to_string_lossy(), "Wedding", "2019-05-04");
    let bases = library.records::<BaseRecord>(Some(&album.key())).unwrap();
    let backups = library.records::<BackupRecord>(Some(&album.key())).unwrap();
    let previews = library.records::<PreviewRecord>(Some(&album.key())).unwrap();
    assert_eq!((bases.len(), backups.len(), previews.len()), (1, 1, 1));
    assert_eq!(bases[0].backup.as_ref(), Some(&backups[0].backup));
    assert_eq!(bases[0].preview.as_ref(), Some(&previews[0].preview));
    assert_eq!(previews[0].base, bases[0].base);

    let album_dir = collection.join("Wedding 2019-05-04");
    let copied: Vec<String> = walk_files(&album_dir);
    assert_eq!(
        copied,
        vec![
            path_key(&album_dir.join("backup/IMG_7.jpg")),
            path_key(&album_dir.join("base/IMG_7.jpg")),
            path_key(&album_dir.join("preview/IMG_7.jpg")),
        ]
    );
}

fn walk_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| path_key(e.path()))
        .collect();
    files.sort();
    files
}

// ── Persistence ──────────────────────────────────────────────────

#[test]
fn test_settings_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("catalog.db");
    {
        let mut library = Library::open(&db_path).unwrap();
        library.set_setting("flow.preview", "JPGs").unwrap();
        library.set_setting("conversion.quality", "60").unwrap();
    }
    let library = Library::open(&db_path).unwrap();
    assert_eq!(library.settings().layout.preview, "JPGs");
    assert_eq!(library.settings().quality, 60);
    assert_eq!(
        library.get_setting("conversion.quality").unwrap().as_deref(),
        Some("60")
    );
    assert!(library.list_settings().unwrap().iter().any(|(k, v)| k == "flow.preview" && v == "JPGs"));
}
