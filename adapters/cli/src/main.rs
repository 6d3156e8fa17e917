#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays Portal Grid levels in a terminal.

mod level_transfer;
mod play;

use std::{fs, io, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use portal_grid_core::Level;
use portal_grid_system_clock as clock;
use portal_grid_system_session::{ClockMode, Config, Game};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Play Portal Grid chambers in the terminal", version)]
struct Args {
    /// Path to a level JSON file
    #[arg(long, conflicts_with = "code")]
    level: Option<PathBuf>,

    /// Share code of the form portal:v1:<W>x<H>:<payload>
    #[arg(long)]
    code: Option<String>,

    /// Milliseconds between clock ticks
    #[arg(long, default_value_t = 1)]
    tick_ms: u64,

    /// Advance time only through the `t <ticks>` input
    #[arg(long)]
    manual_clock: bool,

    /// Print the share code of the loaded level and exit
    #[arg(long)]
    export_code: bool,
}

/// Entry point for the Portal Grid command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let level = load_level(&args)?;

    if args.export_code {
        println!("{}", level_transfer::encode(&level)?);
        return Ok(());
    }

    let config = if args.manual_clock {
        Config::manual()
    } else {
        Config::new(ClockMode::FreeRunning(clock::Config::new(
            Duration::from_millis(args.tick_ms),
        )))
    };
    let game = Game::start(level, config).context("level cannot be played")?;
    let events = game.subscribe();

    let input = io::BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    let outcome = play::run(&game, &events, input, &mut stdout)?;
    info!(?outcome, "goodbye");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_level(args: &Args) -> Result<Level> {
    match (&args.level, &args.code) {
        (Some(path), _) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read level file {}", path.display()))?;
            let level = parse_level(&json)
                .with_context(|| format!("failed to parse level file {}", path.display()))?;
            info!(path = %path.display(), "level loaded");
            Ok(level)
        }
        (None, Some(code)) => level_transfer::decode(code).context("invalid share code"),
        (None, None) => bail!("either --level or --code is required"),
    }
}

fn parse_level(json: &str) -> Result<Level> {
    Ok(serde_json::from_str(json)?)
}
