//! Command-line interface definitions.
//!
//! Defines the CLI structure for the `portalink` binary using `clap`. Each
//! subcommand maps onto one service operation.

mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use run::execute;

/// Talk to a portal server from the command line
#[derive(Parser, Debug)]
#[command(name = "portalink")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Use the foreground (high priority) queue
    #[arg(long, global = true)]
    pub foreground: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the portalink CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a data item and print it
    Fetch {
        /// Topic to fetch
        topic: String,
    },

    /// Send a JSON payload for a topic
    Send {
        /// Topic to send
        topic: String,
        /// Payload as JSON text
        json: String,
    },

    /// Upload a file to a server path
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Destination relative to the session, e.g. /line/logupload?filename=x.zip
        dest: String,
    },

    /// Print changes on topics until interrupted
    Watch {
        /// Topics to watch
        #[arg(required = true)]
        topics: Vec<String>,
    },
}
