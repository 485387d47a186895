use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `agentcored`: the core runtime for an interactive coding agent — turn
/// engine, streaming state machine, permission arbiter, event bus, and
/// session store, exposed over HTTP/SSE.
#[derive(Parser, Debug)]
#[command(name = "agentcored", version, about)]
pub struct Cli {
    /// Path to an explicit config file, applied on top of the layered
    /// search-path config (`--config` overrides everything else).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Emit debug-level logs to stderr instead of the default info level.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP/SSE server (the default when no subcommand is given).
    Serve {
        /// Override the bind address from config, e.g. `0.0.0.0:4096`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the fully merged configuration and exit.
    ShowConfig,
}
