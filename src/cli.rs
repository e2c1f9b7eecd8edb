//! Command line of the `jobtrack` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Durable follow-up tracking for job applications.
#[derive(Debug, Parser)]
#[command(name = "jobtrack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = jobtrack::config::CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit an application and track it until it finishes.
    Run {
        /// JSON or TOML file with company, role, job_description, resume,
        /// user_email and optional deadline_weeks.
        #[arg(long)]
        file: PathBuf,
    },

    /// Resume every unfinished application found in the store.
    Resume,

    /// Show the current status of an application from its journal.
    Status {
        application_id: String,

        /// Print the generated cover letter as well.
        #[arg(long, default_value_t = false)]
        content: bool,
    },

    /// List every tracked application.
    List,

    /// Run a compressed lifecycle (seconds instead of weeks) with a scripted update.
    Demo,
}
