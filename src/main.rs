mod display;
mod highscore;
mod logic;
mod session;
mod structs;

use std::env;
use std::fs::File;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use crate::highscore::{show_highscore, HighScoreFile};
use crate::logic::run_game;
use crate::structs::Args;

/// `RUST_LOG` directives, `info` when none are given.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

/// Logs go to a file because stdout is the game screen.
fn init_logging(args: &Args) -> anyhow::Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("failed to create log file: {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default()))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    tracing::debug!(?args, "parsed arguments");

    if args.show_highscore {
        show_highscore(&HighScoreFile::new(&args.path))?;
        return Ok(());
    }
    run_game(&args)
}
