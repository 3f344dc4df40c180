//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vyapar - Feasibility scores for small businesses in India
#[derive(Parser)]
#[command(name = "vyapar")]
#[command(about = "Score a small-business idea for an Indian city and budget", long_about = None)]
#[command(version)]
pub struct Cli {
    /// History database path
    #[arg(long, default_value = "vyapar.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the history database is encrypted using SQLCipher.
    /// Set VYAPAR_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Allowed CORS origin (repeatable; default is same-origin only)
        #[arg(long = "origin")]
        origins: Vec<String>,

        /// Do not keep a history of analyses
        #[arg(long)]
        no_history: bool,
    },

    /// Analyze a business idea
    Analyze {
        /// The business idea, in plain words
        #[arg(short, long)]
        idea: String,

        /// Neighborhood and/or city (e.g. "Koramangala, Bangalore")
        #[arg(short, long)]
        location: Option<String>,

        /// Budget in rupees; accepts "15 lakhs", "2.5 Cr", "5l", "₹50,000"
        #[arg(short, long)]
        budget: Option<String>,

        /// Scoring strategy override: weighted or ensemble
        #[arg(long)]
        strategy: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Do not save the result to history
        #[arg(long)]
        no_save: bool,

        /// History owner
        #[arg(long, default_value = "anonymous")]
        user: String,
    },

    /// Show recent analyses
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Show one stored analysis in full
        #[arg(long)]
        id: Option<i64>,

        /// History owner
        #[arg(long, default_value = "anonymous")]
        user: String,
    },

    /// Parse a budget string into rupees
    Budget {
        /// Budget text, e.g. "15 lakhs"
        text: String,
    },

    /// Classify an idea and location without calling the AI backend
    Classify {
        /// The business idea
        #[arg(short, long)]
        idea: String,

        /// Neighborhood and/or city
        #[arg(short, long)]
        location: Option<String>,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },

    /// Inspect reference tables and model routing
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the content of a prompt
    Show {
        /// Prompt ID (e.g. discover_factors)
        id: String,
    },

    /// Print the override directory
    Path,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show loaded reference documents, model routing and override paths
    Show,
}
