pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::store::DEFAULT_LIST_LIMIT;

#[derive(Parser)]
#[command(name = "secnews")]
#[command(about = "Security advisory and news feed aggregator", long_about = None)]
pub struct Cli {
    /// Path to the configuration file (default: ~/.config/secnews/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and the HTTP server
    Serve {
        /// Address to listen on, overriding `server.bind`
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run one refresh cycle and print the report
    Refresh,
    /// List configured sources
    Sources,
    /// List stored items, newest first
    List {
        /// Maximum number of items (clamped to 1..=500)
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// Number of items to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
}
