mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use picturebot_core::Library;
use tracing_subscriber::EnvFilter;

/// Picturebot: keeps a photographer's picture flows and their catalog in step
#[derive(Parser)]
#[command(name = "picturebot", version, about)]
struct Cli {
    /// Path to the catalog database
    #[arg(long, default_value_t = default_catalog_path())]
    catalog: String,

    /// Log every catalog statement
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy pictures into a new or existing album and convert their previews
    Ingest {
        /// Collection directory the album lives in
        #[arg(long)]
        collection: PathBuf,
        /// Album name
        #[arg(long)]
        name: String,
        /// Album date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Pictures to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Record edited and social-media exports of an album until interrupted
    Watch {
        /// Album directory, named "<name> <YYYY-MM-DD>"
        album: PathBuf,
    },
    /// Rename or delete albums
    Album {
        #[command(subcommand)]
        action: AlbumAction,
    },
    /// Rename, delete or favorite single pictures
    Picture {
        #[command(subcommand)]
        action: PictureAction,
    },
    /// Import albums from the legacy directory layout
    Legacy {
        #[command(subcommand)]
        action: LegacyAction,
    },
    /// List the records of one flow
    Flows {
        /// Flow to list (base, backup, preview, edited, social-media, favorites)
        kind: Option<String>,
        /// Restrict to one album directory
        #[arg(long)]
        album: Option<PathBuf>,
    },
    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum AlbumAction {
    /// Rename an album in the catalog
    Rename {
        /// Current album directory
        old: PathBuf,
        /// New album directory
        new: PathBuf,
        /// Also move the directory on disk
        #[arg(long = "move")]
        relocate: bool,
    },
    /// Remove every record of an album
    Delete {
        /// Album directory
        album: PathBuf,
    },
}

#[derive(Subcommand)]
enum PictureAction {
    /// Give a picture a new display name
    Rename {
        /// Album directory
        album: PathBuf,
        /// Current preview file
        preview: PathBuf,
        /// New name
        name: String,
    },
    /// Remove a picture's record from one flow
    Delete {
        /// Flow the picture belongs to
        kind: String,
        /// Path of the picture in that flow
        path: PathBuf,
        /// Also delete the file on disk
        #[arg(long)]
        discard: bool,
    },
    /// Mark or unmark a picture as favorite
    Favorite {
        /// Preview file of the picture
        preview: PathBuf,
        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
enum LegacyAction {
    /// Import one legacy album directory into a collection
    Import {
        /// Legacy album directory, named "<name> <YYYY-MM-DD>"
        album: PathBuf,
        /// Collection directory to import into
        #[arg(long)]
        collection: PathBuf,
        /// Subdirectory names of the legacy flows, as flow=dir (e.g. preview=JPG)
        #[arg(long = "dir", value_name = "FLOW=DIR")]
        dirs: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show one setting
    Get { key: String },
    /// Change one setting
    Set { key: String, value: String },
}

fn default_catalog_path() -> String {
    dirs_path().to_string_lossy().to_string()
}

fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".picturebot").join("catalog.db")
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog_path = PathBuf::from(&cli.catalog);
    if let Some(parent) = catalog_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut library = Library::open(&catalog_path)?;

    match cli.command {
        Commands::Ingest {
            collection,
            name,
            date,
            files,
        } => commands::ingest::run(&library, &collection, &name, &date, &files)?,
        Commands::Watch { album } => commands::watch::run(&library, &album)?,
        Commands::Album { action } => match action {
            AlbumAction::Rename { old, new, relocate } => {
                commands::album::rename(&library, &old, &new, relocate)?
            }
            AlbumAction::Delete { album } => commands::album::delete(&library, &album)?,
        },
        Commands::Picture { action } => match action {
            PictureAction::Rename {
                album,
                preview,
                name,
            } => commands::picture::rename(&library, &album, preview, name)?,
            PictureAction::Delete {
                kind,
                path,
                discard,
            } => commands::picture::delete(&library, &kind, &path, discard)?,
            PictureAction::Favorite { preview, off } => {
                commands::picture::favorite(&library, &preview, !off)?
            }
        },
        Commands::Legacy { action } => match action {
            LegacyAction::Import {
                album,
                collection,
                dirs,
            } => commands::legacy::import(&library, album, &collection, &dirs)?,
        },
        Commands::Flows { kind, album } => match kind {
            Some(kind) => commands::flows::list(&library, &kind, album.as_deref())?,
            None => commands::flows::stats(&library)?,
        },
        Commands::Config { action } => match action {
            None => commands::config::list(&library)?,
            Some(ConfigAction::Get { key }) => commands::config::get(&library, &key)?,
            Some(ConfigAction::Set { key, value }) => {
                commands::config::set(&mut library, &key, &value)?
            }
        },
    }

    Ok(())
}
