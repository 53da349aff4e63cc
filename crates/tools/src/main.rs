use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tools::{MapConfig, cover, project};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect map projections and tile coverage")]
struct Args {
    /// Map config (JSON); missing fields take their defaults
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Frames to simulate before reporting
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tiles covering the view
    Cover,
    /// Print the GPU projection data of every covering tile
    Project,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MapConfig::load(path)?,
        None => MapConfig::default(),
    };
    info!(
        zoom = config.zoom,
        globe = config.projection.globe_enabled,
        "loaded map config"
    );

    match args.command {
        Command::Cover => {
            let report = cover(&config, args.frames)?;
            info!(tiles = report.tiles.len(), "covering tiles");
            print_json(&report, args.pretty)?;
        }
        Command::Project => {
            let tiles = project(&config, args.frames)?;
            print_json(&tiles, args.pretty)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut out = std::io::stdout().lock();
    writeln!(out, "{payload}")?;
    Ok(())
}
