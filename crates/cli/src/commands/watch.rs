use std::io::BufRead;
use std::path::Path;

use anyhow::Result;
use picturebot_core::Library;

use super::album_at;

/// Watch the album's edited and social-media flows until stdin closes or a line is entered.
pub fn run(library: &Library, album: &Path) -> Result<()> {
    let album = album_at(album)?;
    let mut session = library.session();
    session.switch_album(album)?;

    println!();
    for watcher in session.watchers() {
        println!("  Watching {} ({})", watcher.dir().display(), watcher.kind());
    }
    println!();
    println!("  Press Enter to stop.");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    session.stop();
    println!("  Stopped.");
    Ok(())
}
