use std::time::Duration;

use crate::catalog::FlowStore;
use crate::domain::FlowKind;
use crate::error::{Error, Result};
use crate::layout::FlowLayout;

pub const KEY_QUALITY: &str = "conversion.quality";
pub const KEY_TIMEOUT: &str = "conversion.timeout_secs";
pub const KEY_WORKERS: &str = "conversion.workers";
pub const KEY_PROGRAM: &str = "conversion.program";
pub const KEY_IO_POLICY: &str = "ingest.io_policy";
pub const KEY_TIE_BREAK: &str = "legacy.tie_break";

/// What the ingestion pipeline does when copying one picture fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPolicy {
    /// Log the failure, skip the picture, keep going.
    Continue,
    /// Stop the batch. Pictures already processed are kept.
    Abort,
}

/// Which candidate wins when several legacy files correlate with one base picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Last candidate in directory order (historical behaviour).
    LastMatch,
    FirstMatch,
    /// Ambiguous correlations are treated as no correlation.
    Skip,
}

impl TieBreak {
    /// Pick one candidate out of `candidates`, scanned in directory order.
    pub fn pick<T>(&self, mut candidates: Vec<T>) -> Option<T> {
        match self {
            TieBreak::LastMatch => candidates.pop(),
            TieBreak::FirstMatch => candidates.into_iter().next(),
            TieBreak::Skip if candidates.len() == 1 => candidates.pop(),
            TieBreak::Skip => None,
        }
    }
}

/// Engine settings persisted in the catalog's `config` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// JPEG quality of generated previews (1-100).
    pub quality: u8,
    pub conversion_timeout: Duration,
    pub conversion_workers: usize,
    /// External converter executable, invoked as `<program> convert ...`, or
    /// `builtin` for the in-process encoder.
    pub conversion_program: String,
    pub io_policy: IoPolicy,
    pub tie_break: TieBreak,
    pub layout: FlowLayout,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: 80,
            conversion_timeout: Duration::from_secs(120),
            conversion_workers: 4,
            conversion_program: "magick".to_string(),
            io_policy: IoPolicy::Continue,
            tie_break: TieBreak::LastMatch,
            layout: FlowLayout::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults for keys that were never set.
    pub fn load(store: &FlowStore) -> Result<Self> {
        let mut settings = Settings::default();
        for (key, value) in store.list_config()? {
            settings.apply(&key, &value)?;
        }
        Ok(settings)
    }

    /// Validate and persist one setting.
    pub fn set(store: &FlowStore, key: &str, value: &str) -> Result<Self> {
        let mut settings = Settings::load(store)?;
        settings.apply(key, value)?;
        store.set_config(key, value)?;
        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || Error::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            KEY_QUALITY => {
                let quality: u8 = value.parse().map_err(|_| invalid())?;
                if !(1..=100).contains(&quality) {
                    return Err(invalid());
                }
                self.quality = quality;
            }
            KEY_TIMEOUT => {
                let secs: u64 = value.parse().map_err(|_| invalid())?;
                self.conversion_timeout = Duration::from_secs(secs);
            }
            KEY_WORKERS => {
                let workers: usize = value.parse().map_err(|_| invalid())?;
                if workers == 0 {
                    return Err(invalid());
                }
                self.conversion_workers = workers;
            }
            KEY_PROGRAM => {
                if value.trim().is_empty() {
                    return Err(invalid());
                }
                self.conversion_program = value.to_string();
            }
            KEY_IO_POLICY => {
                self.io_policy = match value {
                    "continue" => IoPolicy::Continue,
                    "abort" => IoPolicy::Abort,
                    _ => return Err(invalid()),
                };
            }
            KEY_TIE_BREAK => {
                self.tie_break = match value {
                    "last" => TieBreak::LastMatch,
                    "first" => TieBreak::FirstMatch,
                    "skip" => TieBreak::Skip,
                    _ => return Err(invalid()),
                };
            }
            _ => {
                if let Some(flow) = key.strip_prefix("flow.") {
                    let kind: FlowKind = flow.parse().map_err(|_| invalid())?;
                    if value.is_empty() || value.contains(['/', '\\']) {
                        return Err(invalid());
                    }
                    self.layout.set_dir_name(kind, value.to_string());
                }
                // Anything else (schema_version, ...) is not an engine setting.
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let store = FlowStore::open_in_memory().unwrap();
        let settings = Settings::load(&store).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.quality, 80);
        assert_eq!(settings.tie_break, TieBreak::LastMatch);
    }

    #[test]
    fn test_set_persists_and_reloads() {
        let store = FlowStore::open_in_memory().unwrap();
        Settings::set(&store, KEY_QUALITY, "55").unwrap();
        Settings::set(&store, KEY_TIE_BREAK, "skip").unwrap();
        Settings::set(&store, "flow.social-media", "Instagram").unwrap();

        let settings = Settings::load(&store).unwrap();
        assert_eq!(settings.quality, 55);
        assert_eq!(settings.tie_break, TieBreak::Skip);
        assert_eq!(settings.layout.social_media, "Instagram");
    }

    #[test]
    fn test_invalid_values_rejected_and_not_persisted() {
        let store = FlowStore::open_in_memory().unwrap();
        assert!(matches!(
            Settings::set(&store, KEY_QUALITY, "0"),
            Err(Error::InvalidSetting { .. })
        ));
        assert!(Settings::set(&store, KEY_QUALITY, "abc").is_err());
        assert!(Settings::set(&store, KEY_WORKERS, "0").is_err());
        assert!(Settings::set(&store, KEY_IO_POLICY, "retry").is_err());
        assert!(Settings::set(&store, "flow.preview", "a/b").is_err());
        assert!(Settings::set(&store, "flow.selection", "x").is_err());
        assert_eq!(store.get_config(KEY_QUALITY).unwrap(), None);
    }

    #[test]
    fn test_tie_break_pick() {
        assert_eq!(TieBreak::LastMatch.pick(vec![1, 2, 3]), Some(3));
        assert_eq!(TieBreak::FirstMatch.pick(vec![1, 2, 3]), Some(1));
        assert_eq!(TieBreak::Skip.pick(vec![1, 2, 3]), None);
        assert_eq!(TieBreak::Skip.pick(vec![7]), Some(7));
        assert_eq!(TieBreak::LastMatch.pick(Vec::<i32>::new()), None);
    }
}
