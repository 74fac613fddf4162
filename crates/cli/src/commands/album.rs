use std::path::Path;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use picturebot_core::domain::{DeleteSummary, FlowKind};
use picturebot_core::Library;

use super::album_at;

pub fn rename(library: &Library, old: &Path, new: &Path, relocate: bool) -> Result<()> {
    let old = album_at(old)?;
    let new = album_at(new)?;
    let touched = if relocate {
        library.relocate_album(&old, &new)?
    } else {
        library.rename_album(&old.key(), &new.key())?
    };
    println!(
        "Renamed album: {} -> {} ({touched} records updated)",
        old.path.display(),
        new.path.display()
    );
    Ok(())
}

pub fn delete(library: &Library, album: &Path) -> Result<()> {
    let album = album_at(album)?;
    let summary = library.delete_album(&album.key())?;
    if summary.total() == 0 {
        println!("No records for album {}", album.path.display());
        return Ok(());
    }
    println!("Deleted album {}", album.path.display());
    println!("{}", summary_table(&summary));
    Ok(())
}

fn summary_rows(summary: &DeleteSummary) -> Vec<(FlowKind, usize)> {
    vec![
        (FlowKind::Base, summary.base),
        (FlowKind::Backup, summary.backup),
        (FlowKind::Preview, summary.preview),
        (FlowKind::Edited, summary.edited),
        (FlowKind::SocialMedia, summary.social_media),
        (FlowKind::Favorite, summary.favorite),
    ]
}

fn summary_table(summary: &DeleteSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Flow"), Cell::new("Removed")]);
    for (kind, removed) in summary_rows(summary) {
        table.add_row(vec![Cell::new(kind), Cell::new(removed)]);
    }
    table
}
