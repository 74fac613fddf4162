use std::sync::{Arc, Mutex};

use tracing::info;

use crate::catalog::FlowStore;
use crate::domain::FlowKind;
use crate::error::Result;
use crate::layout::{Album, FlowLayout};

use super::FlowWatcher;

/// The album currently selected for editing, plus one watcher per watched flow.
///
/// Switching albums cancels every watcher of the previous album before any new
/// watcher starts, so at most one watcher exists per (album, flow) pair.
pub struct Session {
    store: Arc<Mutex<FlowStore>>,
    layout: FlowLayout,
    active: Option<Album>,
    watchers: Vec<FlowWatcher>,
}

impl Session {
    pub fn new(store: Arc<Mutex<FlowStore>>, layout: FlowLayout) -> Self {
        Self {
            store,
            layout,
            active: None,
            watchers: Vec::new(),
        }
    }

    pub fn switch_album(&mut self, album: Album) -> Result<()> {
        self.stop();

        let mut watchers = Vec::new();
        for kind in FlowKind::ALL.into_iter().filter(FlowKind::is_watched) {
            // Watchers already started are dropped, and thereby cancelled, on error.
            watchers.push(FlowWatcher::start(
                Arc::clone(&self.store),
                album.clone(),
                self.layout.clone(),
                kind,
            )?);
        }

        info!(album = %album.key(), watchers = watchers.len(), "album selected");
        self.watchers = watchers;
        self.active = Some(album);
        Ok(())
    }

    pub fn active_album(&self) -> Option<&Album> {
        self.active.as_ref()
    }

    pub fn watchers(&self) -> &[FlowWatcher] {
        &self.watchers
    }

    /// Cancel and join every watcher of the active album.
    pub fn stop(&mut self) {
        for watcher in self.watchers.drain(..) {
            watcher.cancel();
        }
        if let Some(album) = self.active.take() {
            info!(album = %album.key(), "album released");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EditedRecord, PreviewRecord};
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};

    fn preview_for(album: &Album, layout: &FlowLayout, stem: &str) -> PreviewRecord {
        PreviewRecord {
            collection: album.collection.clone(),
            name: stem.to_string(),
            album: album.key(),
            base: album.base_path(layout, &format!("{stem}.jpg")),
            preview: album.preview_path(layout, &format!("{stem}.jpg")),
            date: album.date.clone(),
            time: "10:00:00".to_string(),
        }
    }

    fn wait_for_edited(store: &Arc<Mutex<FlowStore>>, album: &Album, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let found = store
                .lock()
                .unwrap()
                .query_by_album::<EditedRecord>(&album.key())
                .unwrap()
                .len();
            if found == expected || Instant::now() >= deadline {
                return found;
            }
            thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    fn test_switch_album_starts_watched_flows() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(Mutex::new(FlowStore::open_in_memory().unwrap()));
        let mut session = Session::new(Arc::clone(&store), FlowLayout::default());
        let album = Album::new(tmp.path().to_string_lossy(), "Trip", "2024-01-01");

        session.switch_album(album.clone()).unwrap();

        assert_eq!(session.active_album(), Some(&album));
        let kinds: Vec<FlowKind> = session.watchers().iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, vec![FlowKind::Edited, FlowKind::SocialMedia]);
        assert!(album.flow_dir(&FlowLayout::default(), FlowKind::Edited).is_dir());

        session.stop();
        assert!(session.active_album().is_none());
        assert!(session.watchers().is_empty());
    }

    #[test]
    fn test_switching_album_stops_previous_watchers() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = FlowLayout::default();
        let first = Album::new(tmp.path().to_string_lossy(), "First", "2024-01-01");
        let second = Album::new(tmp.path().to_string_lossy(), "Second", "2024-02-01");

        let store = Arc::new(Mutex::new(FlowStore::open_in_memory().unwrap()));
        {
            let guard = store.lock().unwrap();
            guard.insert(&preview_for(&first, &layout, "a")).unwrap();
            guard.insert(&preview_for(&second, &layout, "b")).unwrap();
        }

        let mut session = Session::new(Arc::clone(&store), layout.clone());
        session.switch_album(first.clone()).unwrap();
        session.switch_album(second.clone()).unwrap();
        assert_eq!(session.watchers().len(), 2);

        // The first album is no longer observed.
        fs::write(first.flow_dir(&layout, FlowKind::Edited).join("a.tif"), b"x").unwrap();
        fs::write(second.flow_dir(&layout, FlowKind::Edited).join("b.tif"), b"x").unwrap();

        assert_eq!(wait_for_edited(&store, &second, 1), 1);
        // Give a stray event for the first album time to show up, if one were coming.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(wait_for_edited(&store, &first, 0), 0);
    }
}
