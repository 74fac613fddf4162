use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared flag telling in-flight conversions to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Produces a reduced-quality JPEG preview of `source` at `destination`.
pub trait PreviewConverter: Send + Sync {
    fn convert(&self, source: &Path, quality: u8, destination: &Path, cancel: &CancelToken) -> Result<()>;
}

/// In-process converter built on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageConverter;

impl PreviewConverter for ImageConverter {
    fn convert(&self, source: &Path, quality: u8, destination: &Path, cancel: &CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let img = image::open(source)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let rgb = img.to_rgb8();
        let write = || -> Result<()> {
            let writer = BufWriter::new(File::create(destination)?);
            let mut encoder = JpegEncoder::new_with_quality(writer, quality);
            encoder.encode_image(&rgb)?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(destination);
            return Err(e);
        }
        Ok(())
    }
}

/// Runs ImageMagick: `<program> convert <source> -quality <q> <destination>`.
/// The child is killed when it outlives `timeout` or the token is cancelled.
#[derive(Debug, Clone)]
pub struct MagickConverter {
    pub program: PathBuf,
    pub timeout: Duration,
}

impl MagickConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Check the converter executable can be spawned at all.
    pub fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| Error::ConversionFailed {
                path: self.program.clone(),
                message: format!("converter not available: {e}"),
            })?;
        if !status.success() {
            return Err(Error::ConversionFailed {
                path: self.program.clone(),
                message: format!("converter exited with {status}"),
            });
        }
        Ok(())
    }
}

impl PreviewConverter for MagickConverter {
    fn convert(&self, source: &Path, quality: u8, destination: &Path, cancel: &CancelToken) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!(
            program = %self.program.display(),
            source = %source.display(),
            destination = %destination.display(),
            quality,
            "spawning converter"
        );
        let mut child = Command::new(&self.program)
            .arg("convert")
            .arg(source)
            .arg("-quality")
            .arg(quality.to_string())
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::ConversionFailed {
                path: source.to_path_buf(),
                message: format!("failed to spawn {}: {e}", self.program.display()),
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() || Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                let _ = fs::remove_file(destination);
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                return Err(Error::ConversionTimedOut {
                    path: source.to_path_buf(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(Error::ConversionFailed {
                path: source.to_path_buf(),
                message: format!("{} exited with {status}", self.program.display()),
            });
        }
        if !destination.is_file() {
            return Err(Error::ConversionFailed {
                path: source.to_path_buf(),
                message: format!("no output written to {}", destination.display()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_jpeg(path: &Path) {
        let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_image_converter_writes_jpeg() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source.png");
        image::RgbImage::from_pixel(16, 16, image::Rgb([10, 200, 30]))
            .save(&source)
            .unwrap();
        let dest = tmp.path().join("preview/out.jpg");

        ImageConverter.convert(&source, 70, &dest, &CancelToken::new()).unwrap();

        let decoded = image::open(&dest).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_image_converter_lower_quality_is_smaller() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source.jpg");
        create_jpeg(&source);

        let high = tmp.path().join("high.jpg");
        let low = tmp.path().join("low.jpg");
        ImageConverter.convert(&source, 95, &high, &CancelToken::new()).unwrap();
        ImageConverter.convert(&source, 10, &low, &CancelToken::new()).unwrap();

        let high_len = fs::metadata(&high).unwrap().len();
        let low_len = fs::metadata(&low).unwrap().len();
        assert!(low_len < high_len, "low={low_len} high={high_len}");
    }

    #[test]
    fn test_image_converter_rejects_non_image() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("notes.jpg");
        fs::write(&source, b"definitely not a jpeg").unwrap();
        let dest = tmp.path().join("out.jpg");

        assert!(ImageConverter.convert(&source, 80, &dest, &CancelToken::new()).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_image_converter_honours_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source.jpg");
        create_jpeg(&source);
        let token = CancelToken::new();
        token.cancel();

        let err = ImageConverter
            .convert(&source, 80, &tmp.path().join("out.jpg"), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_magick_converter_missing_program() {
        let tmp = tempfile::tempdir().unwrap();
        let converter = MagickConverter::new("/nonexistent/magick", Duration::from_secs(1));
        let err = converter
            .convert(
                &tmp.path().join("a.jpg"),
                80,
                &tmp.path().join("b.jpg"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ConversionFailed { .. }));
        assert!(converter.check_available().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_magick_converter_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("slow-magick");
        fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let converter = MagickConverter::new(&script, Duration::from_millis(200));
        let started = Instant::now();
        let err = converter
            .convert(
                &tmp.path().join("a.jpg"),
                80,
                &tmp.path().join("b.jpg"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ConversionTimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_magick_converter_requires_output_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("noop-magick");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let converter = MagickConverter::new(&script, Duration::from_secs(5));
        let err = converter
            .convert(
                &tmp.path().join("a.jpg"),
                80,
                &tmp.path().join("b.jpg"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ConversionFailed { .. }));
    }
}
