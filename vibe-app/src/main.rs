//! Vibe - playlist audio-feature analytics
//!
//! Reads a track/feature list, runs tempo, mood and genre analyses and keeps
//! a browsable history of past runs. Results are printed as JSON on stdout;
//! logs go to stderr.

mod commands;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::Cli;
use config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(cli, config, &mut out)
}
