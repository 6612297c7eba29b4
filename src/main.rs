// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use media_broker::MediaSourceKind;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "media-broker")]
#[command(about = "Pick a photo from the last shot, the library or the camera")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/media-broker/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a photo and save it
    Pick {
        /// Sources to offer, in order (last-photo, library, camera)
        #[arg(short, long = "source")]
        sources: Vec<MediaSourceKind>,

        /// Re-render the image upright
        #[arg(short, long)]
        normalize: bool,

        /// Ask for every permission before showing the chooser
        #[arg(long)]
        upfront: bool,

        /// Output file path (default: ./photo_TIMESTAMP.EXT)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Request access to sources without picking
    Access {
        /// Sources to request (default: configured inputs)
        #[arg(short, long = "source")]
        sources: Vec<MediaSourceKind>,
    },

    /// Save the newest photo from the library, without any UI
    LastPhoto {
        /// Output file path (default: ./photo_TIMESTAMP.EXT)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show availability and authorization of every source
    Sources,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=media_broker=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Pick {
            sources,
            normalize,
            upfront,
            output,
        } => cli::pick(config, sources, normalize, upfront, output),
        Commands::Access { sources } => cli::request_access(config, sources),
        Commands::LastPhoto { output } => cli::last_photo(config, output),
        Commands::Sources => cli::list_sources(config),
    }
}
