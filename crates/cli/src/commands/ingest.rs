use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use picturebot_core::capture::describe_capture;
use picturebot_core::convert::CancelToken;
use picturebot_core::domain::{CapturedPicture, FlowKind};
use picturebot_core::ingest::{IngestProgress, IngestReport};
use picturebot_core::layout::Album;
use picturebot_core::Library;

use super::file_name;

fn active_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {bar:30.cyan/blue} {spinner:.green} {pos:>5}/{len:<5} {prefix:.dim} {msg}",
    )
    .unwrap()
    .progress_chars("━╸─")
}

fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("  {bar:30.green} {prefix:.green} {msg:.dim}").unwrap()
}

fn start_bar(mp: &MultiProgress, len: usize, prefix: &'static str) -> ProgressBar {
    let pb = mp.add(ProgressBar::new(len as u64));
    pb.set_style(active_style());
    pb.set_prefix(prefix);
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

fn finish_bar(pb: ProgressBar, message: String) {
    pb.set_style(done_style());
    pb.set_prefix("done");
    pb.finish_with_message(message);
}

/// Hash and date every file; unreadable files are reported and left out.
fn describe_all(files: &[PathBuf]) -> Vec<CapturedPicture> {
    let mut pictures = Vec::with_capacity(files.len());
    for file in files {
        match describe_capture(file) {
            Ok(picture) => pictures.push(picture),
            Err(e) => eprintln!("  Skipping {}: {e}", file.display()),
        }
    }
    pictures
}

pub fn run(library: &Library, collection: &Path, name: &str, date: &str, files: &[PathBuf]) -> Result<()> {
    let album = Album::new(collection.to_string_lossy(), name, date);
    let pictures = describe_all(files);

    let mp = MultiProgress::new();
    let mut active_pb: Option<ProgressBar> = None;
    let mut current_len = 0;

    mp.println(String::new()).ok();
    mp.println(format!("  Ingesting into {}", album.path.display())).ok();

    let report = library.ingest(
        &album,
        &pictures,
        &CancelToken::new(),
        Some(&mut |progress| match progress {
            IngestProgress::Start { total } => {
                current_len = total;
                active_pb = Some(start_bar(&mp, total, "Copying"));
            }
            IngestProgress::Copied { flow, target } => {
                if let (Some(pb), FlowKind::Base) = (&active_pb, flow) {
                    pb.set_message(file_name(&target));
                    pb.inc(1);
                }
            }
            IngestProgress::Skipped { source } => {
                if let Some(ref pb) = active_pb {
                    pb.set_message(format!("{} already ingested", file_name(&source)));
                    pb.inc(1);
                }
            }
            IngestProgress::Converting { total } => {
                if let Some(pb) = active_pb.take() {
                    finish_bar(pb, format!("Copied {current_len} pictures"));
                }
                current_len = total;
                active_pb = Some(start_bar(&mp, total, "Converting"));
            }
            IngestProgress::Converted { preview } => {
                if let Some(ref pb) = active_pb {
                    pb.set_message(file_name(&preview));
                    pb.inc(1);
                }
            }
            IngestProgress::Failed { source, message } => {
                mp.println(format!("  Failed {}: {message}", file_name(&source))).ok();
                if let Some(ref pb) = active_pb {
                    pb.inc(1);
                }
            }
            IngestProgress::Complete { previews, .. } => {
                if let Some(pb) = active_pb.take() {
                    finish_bar(pb, format!("Converted {previews} previews"));
                }
            }
        }),
    )?;

    mp.println(String::new()).ok();
    mp.println(format!("  {}", summary(&report))).ok();
    mp.println(String::new()).ok();
    Ok(())
}

fn summary(report: &IngestReport) -> String {
    let mut line = format!(
        "Ingested {} pictures, {} previews",
        report.ingested, report.previews
    );
    if report.skipped > 0 {
        line.push_str(&format!(", {} already present", report.skipped));
    }
    if !report.failures.is_empty() {
        line.push_str(&format!(", {} failed", report.failures.len()));
    }
    if report.aborted {
        line.push_str(" (stopped early)");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use picturebot_core::ingest::IngestFailure;

    #[test]
    fn test_summary_clean_run() {
        let report = IngestReport {
            ingested: 3,
            previews: 3,
            ..IngestReport::default()
        };
        assert_eq!(summary(&report), "Ingested 3 pictures, 3 previews");
    }

    #[test]
    fn test_summary_mentions_skips_failures_and_abort() {
        let report = IngestReport {
            ingested: 1,
            previews: 0,
            skipped: 2,
            failures: vec![IngestFailure {
                source: PathBuf::from("/card/a.jpg"),
                flow: FlowKind::Preview,
                message: "boom".to_string(),
            }],
            aborted: true,
        };
        assert_eq!(
            summary(&report),
            "Ingested 1 pictures, 0 previews, 2 already present, 1 failed (stopped early)"
        );
    }

    #[test]
    fn test_describe_all_skips_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let present = tmp.path().join("a.jpg");
        std::fs::write(&present, b"not really a jpeg").unwrap();
        let pictures = describe_all(&[present.clone(), tmp.path().join("missing.jpg")]);
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].source, present);
        assert!(pictures[0].hashed_name.ends_with(".jpg"));
    }
}
