//! CLI interface for p2p-rates
//!
//! Provides subcommands for:
//! - `run`: Start the rate watcher
//! - `fetch`: One-shot page fetch (no polling)
//! - `config`: Show effective configuration

mod fetch;
mod run;

pub use fetch::FetchArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "p2p-rates")]
#[command(about = "Terminal watcher for Bybit P2P USDT/RUB buy offers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the rate watcher
    Run(RunArgs),
    /// Fetch one page of listings and exit
    Fetch(FetchArgs),
    /// Show effective configuration
    Config,
}
