use std::path::{Path, PathBuf};

use anyhow::Result;
use picturebot_core::domain::{FlowKind, PictureRename};
use picturebot_core::layout::path_key;
use picturebot_core::Library;

use super::album_at;

pub fn rename(library: &Library, album: &Path, preview: PathBuf, name: String) -> Result<()> {
    let album = album_at(album)?;
    let update = PictureRename {
        album: album.key(),
        preview,
        name,
    };
    let renamed = library.rename_picture(&update)?;
    println!("Renamed picture: {}", renamed.display());
    Ok(())
}

pub fn delete(library: &Library, kind: &str, path: &Path, discard: bool) -> Result<()> {
    let kind: FlowKind = kind.parse()?;
    let key = path_key(path);
    let removed = if discard {
        library.discard_picture(kind, &key)?
    } else {
        library.delete_picture(kind, &key)?
    };
    match removed {
        0 => println!("No {kind} record for {}", path.display()),
        n => println!("Removed {n} {kind} record(s) for {}", path.display()),
    }
    Ok(())
}

pub fn favorite(library: &Library, preview: &Path, favorited: bool) -> Result<()> {
    library.set_favorite(preview, favorited)?;
    let verb = if favorited { "Marked" } else { "Unmarked" };
    println!("{verb} favorite: {}", preview.display());
    Ok(())
}
