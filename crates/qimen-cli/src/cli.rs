//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Qimen - Points-metered Qimen Dunjia divination service
#[derive(Parser)]
#[command(name = "qimen")]
#[command(about = "Self-hosted Qimen Dunjia divination backend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "qimen.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set QIMEN_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },

    /// Print the chart for a timestamp (defaults to now)
    Chart {
        /// RFC 3339 timestamp, e.g. 2024-06-01T14:30:00-07:00
        #[arg(long)]
        at: Option<String>,
    },

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: Option<UsersAction>,
    },

    /// LLM backend utilities
    Llm {
        #[command(subcommand)]
        action: LlmAction,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List all accounts
    List,

    /// Register a new account
    Add {
        /// Email address
        #[arg(long)]
        email: String,

        /// Password (minimum 6 characters)
        #[arg(long)]
        password: String,
    },

    /// Show one account with its ledger history
    Show {
        /// User id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LlmAction {
    /// Send a test prompt to the configured backend
    Test {
        /// Prompt to send
        #[arg(long, default_value = "Answer with one word: is the gateway reachable?")]
        prompt: String,
    },
}
