// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skipper")]
#[command(about = "Tag, verify, and roll out service releases to a compose stack")]
#[command(version)]
pub struct Cli {
    /// Path to skipper.yml (default: discovered in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by release commands.
#[derive(Args, Clone, Debug)]
pub struct ReleaseOpts {
    /// Retry a conflicting tag once with the next free patch version
    #[arg(long)]
    pub auto_bump: bool,

    /// How long to wait for images to be published (e.g. 20m)
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Break an existing deploy lock
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a skipper.yml template for the langgraph + mcpserver stack
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Release one service: tag, verify, deploy
    Release {
        /// Service name from skipper.yml
        service: String,

        /// Version to release (v1.2.3 or 1.2.3)
        version: String,

        #[command(flatten)]
        opts: ReleaseOpts,
    },

    /// Release several services together as one atomic batch
    ReleaseBatch {
        /// Releases as service:version pairs
        #[arg(required = true, value_name = "SERVICE:VERSION")]
        items: Vec<String>,

        #[command(flatten)]
        opts: ReleaseOpts,
    },

    /// Show a batch (latest when no id is given) and the active snapshot
    Status {
        /// Batch id or unique prefix
        batch: Option<String>,
    },

    /// Redeploy a previously committed snapshot
    Rollback {
        /// Revision to restore
        revision: String,

        /// Break an existing deploy lock
        #[arg(long)]
        force: bool,
    },

    /// List committed snapshots
    History,

    /// Suggest the next free version for a service
    Suggest {
        /// Service name from skipper.yml
        service: String,
    },
}
