use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use picturebot_core::catalog::Relation;
use picturebot_core::domain::*;
use picturebot_core::Library;

use super::{album_at, file_name};

/// How one flow's records are laid out in the listing table.
trait FlowRow: Relation {
    const HEADER: &'static [&'static str];
    fn album(&self) -> &str;
    fn cells(&self) -> Vec<Cell>;
}

fn optional(path: &Option<PathBuf>) -> Cell {
    match path {
        Some(p) => Cell::new(file_name(p)),
        None => Cell::new("\u{2014}").fg(Color::DarkGrey),
    }
}

impl FlowRow for BaseRecord {
    const HEADER: &'static [&'static str] = &["Name", "Base", "Backup", "Preview", "Date", "Time", "Favorite"];
    fn album(&self) -> &str {
        &self.album
    }
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.name),
            Cell::new(file_name(&self.base)),
            optional(&self.backup),
            optional(&self.preview),
            Cell::new(&self.date),
            Cell::new(&self.time),
            if self.favorited {
                Cell::new("\u{2714}").fg(Color::Green)
            } else {
                Cell::new("")
            },
        ]
    }
}

impl FlowRow for BackupRecord {
    const HEADER: &'static [&'static str] = &["Name", "Backup", "Date", "Time"];
    fn album(&self) -> &str {
        &self.album
    }
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.name),
            Cell::new(file_name(&self.backup)),
            Cell::new(&self.date),
            Cell::new(&self.time),
        ]
    }
}

impl FlowRow for PreviewRecord {
    const HEADER: &'static [&'static str] = &["Name", "Preview", "Base", "Date", "Time"];
    fn album(&self) -> &str {
        &self.album
    }
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.name),
            Cell::new(file_name(&self.preview)),
            Cell::new(file_name(&self.base)),
            Cell::new(&self.date),
            Cell::new(&self.time),
        ]
    }
}

impl FlowRow for EditedRecord {
    const HEADER: &'static [&'static str] = &["Edited", "Preview", "Base"];
    fn album(&self) -> &str {
        &self.album
    }
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(file_name(&self.edited)),
            optional(&self.preview),
            Cell::new(file_name(&self.base)),
        ]
    }
}

impl FlowRow for SocialMediaRecord {
    const HEADER: &'static [&'static str] = &["Social media", "Preview", "Base"];
    fn album(&self) -> &str {
        &self.album
    }
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::new(file_name(&self.social_media)),
            optional(&self.preview),
            Cell::new(file_name(&self.base)),
        ]
    }
}

impl FlowRow for FavoriteRecord {
    const HEADER: &'static [&'static str] = &["Preview", "Base"];
    fn album(&self) -> &str {
        &self.album
    }
    fn cells(&self) -> Vec<Cell> {
        vec![optional(&self.preview), Cell::new(file_name(&self.base))]
    }
}

fn flow_table<R: FlowRow>(records: &[R], with_album: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header: Vec<Cell> = R::HEADER.iter().map(|h| Cell::new(*h)).collect();
    if with_album {
        header.insert(0, Cell::new("Album"));
    }
    table.set_header(header);

    for record in records {
        let mut row = record.cells();
        if with_album {
            row.insert(0, Cell::new(file_name(Path::new(record.album()))));
        }
        table.add_row(row);
    }
    table
}

fn print_flow<R: FlowRow>(library: &Library, album: Option<&str>) -> Result<()> {
    let records = library.records::<R>(album)?;
    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }
    println!("{}", flow_table(&records, album.is_none()));
    println!("  {} record(s)", records.len());
    Ok(())
}

pub fn list(library: &Library, kind: &str, album: Option<&Path>) -> Result<()> {
    let kind: FlowKind = kind.parse()?;
    let album = album.map(album_at).transpose()?.map(|a| a.key());
    let album = album.as_deref();
    match kind {
        FlowKind::Base => print_flow::<BaseRecord>(library, album),
        FlowKind::Backup => print_flow::<BackupRecord>(library, album),
        FlowKind::Preview => print_flow::<PreviewRecord>(library, album),
        FlowKind::Edited => print_flow::<EditedRecord>(library, album),
        FlowKind::SocialMedia => print_flow::<SocialMediaRecord>(library, album),
        FlowKind::Favorite => print_flow::<FavoriteRecord>(library, album),
    }
}

pub fn stats(library: &Library) -> Result<()> {
    let stats = library.stats()?;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Flow"), Cell::new("Records")]);
    for (kind, count) in &stats.counts {
        table.add_row(vec![Cell::new(kind), Cell::new(count)]);
    }
    println!("{table}");
    println!();
    println!("  Run 'picturebot flows <kind>' to list the records of one flow.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(name: &str, favorited: bool) -> BaseRecord {
        BaseRecord {
            collection: "/c".to_string(),
            name: name.to_string(),
            album: "/c/Trip 2024-01-01".to_string(),
            favorited,
            backup: None,
            preview: Some(PathBuf::from("/c/Trip 2024-01-01/preview/h1.jpg")),
            base: PathBuf::from("/c/Trip 2024-01-01/base/h1.jpg"),
            date: "2024-01-01".to_string(),
            time: "10:00:00".to_string(),
        }
    }

    #[test]
    fn test_cells_match_header_width() {
        assert_eq!(base("a", true).cells().len(), BaseRecord::HEADER.len());
        let edited = EditedRecord {
            collection: "/c".to_string(),
            album: "/c/Trip 2024-01-01".to_string(),
            preview: None,
            base: PathBuf::from("/c/Trip 2024-01-01/base/h1.jpg"),
            edited: PathBuf::from("/c/Trip 2024-01-01/edited/h1.tif"),
        };
        assert_eq!(edited.cells().len(), EditedRecord::HEADER.len());
    }

    #[test]
    fn test_flow_table_album_column() {
        let records = vec![base("a", false), base("b", true)];
        let rendered = flow_table(&records, true).to_string();
        assert!(rendered.contains("Album"));
        assert!(rendered.contains("Trip 2024-01-01"));
        assert!(rendered.contains("h1.jpg"));

        let rendered = flow_table(&records, false).to_string();
        assert!(!rendered.contains("Album"));
    }
}
