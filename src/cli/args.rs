use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pricecraft")]
#[command(about = "Price handmade projects, offline first, with optional workspace sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file (PRICECRAFT_* variables override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace passphrase; unlocks editing for this run
    #[arg(short, long, global = true, env = "PRICECRAFT_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the suggested price of every project, or of one
    Quote {
        /// Project slug
        project: Option<String>,
    },

    /// Write a JSON backup of the local state
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace the local state with a JSON backup
    Import {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Print the share link of the bound workspace
    Share {
        /// Issue a new share token first, invalidating old links
        #[arg(long)]
        rotate: bool,
    },

    /// Bind from a share link (if given) and push local changes
    Sync {
        /// Share link carrying a workspace token
        #[arg(long)]
        url: Option<String>,
    },

    /// Replace local state with the workspace's remote state
    Pull,

    /// Create a workspace from the local data (needs --passphrase)
    Create,

    /// Join a workspace with edit rights (needs --passphrase)
    Join {
        /// Share token or workspace id
        token: String,
    },

    /// Follow a workspace view-only
    View {
        /// Share token or workspace id
        token: String,
    },

    /// Leave the workspace, keeping local data
    SignOut,

    /// Wipe all local data and leave the workspace
    Reset,
}
