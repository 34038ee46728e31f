#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Delve **
//! Command-line front end: create, inspect, lay out and play world stores.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{info, warn};

use delve_engine::settings::{SETTINGS_FILE, remember_store, settings_dir};
use delve_engine::style::GameStyle;
use delve_engine::world::{META_AUTHOR, META_TITLE};
use delve_engine::{DELVE_VERSION, Settings, WorldStore, auto_layout, resolve_startup_store, run_repl};

#[derive(Parser)]
#[command(author, version, about = "Author and play persistent room-and-item adventures.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new store holding the starter world (replaces any file at the path).
    New { path: PathBuf },
    /// Play a store; without a path, reopen the last one used.
    Play { path: Option<PathBuf> },
    /// Assign map coordinates by walking exits from a start room.
    Layout {
        path: PathBuf,
        /// Room to start from (defaults to room 1).
        #[arg(long)]
        start: Option<i64>,
    },
    /// Restore the starting configuration.
    Reset { path: PathBuf },
    /// Save current item placements as the starting configuration.
    Commit { path: PathBuf },
    /// List rooms with their coordinates and exits.
    Rooms { path: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    info!("delve {DELVE_VERSION} starting");
    let cli = Cli::parse();

    match cli.command {
        Commands::New { path } => {
            WorldStore::create(&path).with_context(|| format!("creating store at '{}'", path.display()))?;
            println!("Created {}", path.display());
        },
        Commands::Play { path } => play(path)?,
        Commands::Layout { path, start } => {
            let mut store = open(&path)?;
            let report = auto_layout(&mut store, start)?;
            println!("Placed {} room(s); {} unreached.", report.placed, report.unreached);
        },
        Commands::Reset { path } => {
            open(&path)?.play().clear_game_state()?;
            println!("Game state reset.");
        },
        Commands::Commit { path } => {
            open(&path)?.author().save_as_initial_state()?;
            println!("Current placements saved as the starting state.");
        },
        Commands::Rooms { path } => list_rooms(&open(&path)?)?,
    }
    Ok(())
}

fn open(path: &Path) -> Result<WorldStore> {
    WorldStore::open_at(path).with_context(|| format!("opening store at '{}'", path.display()))
}

fn play(path: Option<PathBuf>) -> Result<()> {
    let mut store = if let Some(path) = path {
        let store = open(&path)?;
        match settings_dir() {
            Some(dir) => {
                if let Err(e) = remember_store(&dir, &path) {
                    warn!("could not remember {} for next time: {e:#}", path.display());
                }
            },
            None => warn!("no settings directory on this platform; {} will not be remembered", path.display()),
        }
        store
    } else {
        let dir = settings_dir().ok_or_else(|| anyhow!("no settings directory on this platform"))?;
        let settings_path = dir.join(SETTINGS_FILE);
        let mut settings = Settings::load_from(&settings_path);
        let store = resolve_startup_store(&mut settings, &dir)?;
        settings.save_to(&settings_path)?;
        store
    };

    let title = store
        .query()
        .metadata(META_TITLE)?
        .unwrap_or_else(|| "Untitled Adventure".to_string());
    println!("{:^60}", title.bright_yellow().underline());
    if let Some(author) = store.query().metadata(META_AUTHOR)? {
        println!("{:^60}", format!("by {author}").italic());
    }

    run_repl(&mut store)
}

fn list_rooms(store: &WorldStore) -> Result<()> {
    for room in store.query().rooms()? {
        let exits: Vec<String> = room.exits().map(|(dir, target)| format!("{dir}->{target}")).collect();
        println!(
            "{:>4}  {:<24} ({:>5}, {:>5})  {}",
            room.id,
            room.name.room_style(),
            room.x,
            room.y,
            exits.join(" ")
        );
    }
    Ok(())
}
