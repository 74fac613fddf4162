use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::domain::CapturedPicture;
use crate::error::Result;
use crate::hasher;
use crate::layout::basename_without_extension;

/// Capture date (`YYYY-MM-DD`) and time (`HH:MM:SS`) of a picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMoment {
    pub date: String,
    pub time: String,
}

impl CaptureMoment {
    fn from_naive(dt: NaiveDateTime) -> Self {
        Self {
            date: dt.format("%Y-%m-%d").to_string(),
            time: dt.format("%H:%M:%S").to_string(),
        }
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let dt: DateTime<Utc> = time.into();
        Self::from_naive(dt.naive_utc())
    }
}

/// Parse an EXIF `DateTimeOriginal`, either `2024:01:15 12:00:00` (raw) or
/// `2024-01-15 12:00:00` (display value).
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

fn exif_datetime(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY))?;
    match field.value {
        exif::Value::Ascii(ref parts) => parts
            .first()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(parse_exif_datetime),
        _ => parse_exif_datetime(&field.display_value().to_string()),
    }
}

/// When the picture was taken: EXIF first, file modification time (UTC) otherwise.
pub fn capture_moment(path: &Path) -> Result<CaptureMoment> {
    if let Some(dt) = exif_datetime(path) {
        return Ok(CaptureMoment::from_naive(dt));
    }
    let modified = path.metadata()?.modified()?;
    Ok(CaptureMoment::from_system_time(modified))
}

/// Hash and timestamp a source file so it can be handed to the ingestion pipeline.
pub fn describe_capture(source: &Path) -> Result<CapturedPicture> {
    let hashed_name = hasher::content_address(source)?;
    let moment = capture_moment(source)?;
    Ok(CapturedPicture {
        source: source.to_path_buf(),
        hashed_name,
        name: basename_without_extension(source),
        date: moment.date,
        time: moment.time,
    })
}
