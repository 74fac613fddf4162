use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use picturebot_core::domain::FlowKind;
use picturebot_core::layout::FlowLayout;
use picturebot_core::legacy::{LegacyImport, LegacyReport};
use picturebot_core::Library;

/// Legacy flow directory names: the defaults, overridden by `flow=dir` pairs.
fn legacy_layout(overrides: &[String]) -> Result<FlowLayout> {
    let mut layout = FlowLayout::default();
    for pair in overrides {
        let (flow, dir) = pair
            .split_once('=')
            .with_context(|| format!("expected FLOW=DIR, got {pair}"))?;
        let kind: FlowKind = flow.trim().parse()?;
        let dir = dir.trim();
        if dir.is_empty() || dir.contains('/') {
            bail!("invalid directory name for {kind}: {dir:?}");
        }
        layout.set_dir_name(kind, dir.to_string());
    }
    Ok(layout)
}

pub fn import(library: &Library, album: PathBuf, collection: &Path, dirs: &[String]) -> Result<()> {
    let import = LegacyImport {
        legacy_root: album,
        collection: collection.to_string_lossy().into_owned(),
        layout: legacy_layout(dirs)?,
    };
    let report = library.import_legacy(&import)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &LegacyReport) {
    println!();
    println!("  Imported {}", report.album);
    println!("  --------");
    println!("   Base:         {:>6}     Backup:       {:>6}", report.bases, report.backups);
    println!("   Preview:      {:>6}     Edited:       {:>6}", report.previews, report.edited);
    println!("   Social media: {:>6}     Favorites:    {:>6}", report.social_media, report.favorites);
    if report.missing_backup + report.missing_preview > 0 {
        println!(
            "   Without backup: {}, without preview: {}",
            report.missing_backup, report.missing_preview
        );
    }
    if report.skipped + report.failed > 0 {
        println!("   Already imported: {}, failed: {}", report.skipped, report.failed);
    }
    println!();
}
