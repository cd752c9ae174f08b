use clap::{Parser, Subcommand};
use lyrebird_common::EntityKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lyrebird")]
#[command(author, version, about = "Music library synchronizer and artwork resolver")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the catalog with the music directories
    Scan {
        /// Output the final status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the latest scan run and catalog totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write stored artwork for an album or artist
    Artwork {
        /// Entity kind: album or artist
        kind: EntityKind,

        /// Canonical identifier
        id: String,

        /// Resize to fit within this many pixels
        #[arg(long)]
        size: Option<u32>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List genres by track count
    Genres,

    /// Search tracks by title, artist, album or genre
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
