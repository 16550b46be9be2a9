//! HERON operator CLI.
//!
//! Answers "why can't this person get in?" from the command line, using the
//! same validator and policy engine as the web front end.
//!
//! # Quick Start
//!
//! ```bash
//! # Where would a browser be sent to log in?
//! heron login-url https://heron.example.edu/
//!
//! # Walk one user through every entitlement check
//! heron check bill.student --fixtures medcenter.toml
//!
//! # Review the oversight committee's decisions
//! heron decisions --fixtures medcenter.toml
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

/// HERON - access decisions for the research-data repository.
#[derive(Parser)]
#[command(name = "heron")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding heron.toml and heron.local.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a capability for a user and run every repository check.
    Check {
        /// Directory user id (e.g. john.smith).
        user: String,

        /// Directory and oversight snapshot (TOML).
        #[arg(short, long)]
        fixtures: PathBuf,

        /// Evaluate as of this date instead of today (YYYY-MM-DD).
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// List aggregated oversight decisions and their verdicts.
    Decisions {
        /// Directory and oversight snapshot (TOML).
        #[arg(short, long)]
        fixtures: PathBuf,

        /// Evaluate as of this date instead of today (YYYY-MM-DD).
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Print the CAS login URL for a service.
    LoginUrl {
        /// Service URL CAS should return the browser to.
        service: Url,
    },

    /// Validate a service ticket against the configured CAS server.
    Validate {
        /// Service ticket (ST-...).
        ticket: String,

        /// Service URL the ticket was issued for.
        #[arg(short, long)]
        service: Url,
    },

    /// Show the effective configuration (secret redacted).
    Config {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Text)]
        format: ConfigFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Text,
    Toml,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    let config = commands::load_config(&cli.project)?;

    match cli.command {
        Commands::Check {
            user,
            fixtures,
            as_of,
        } => commands::check::run(&config, &user, &fixtures, as_of),
        Commands::Decisions { fixtures, as_of } => {
            commands::decisions::run(&config, &fixtures, as_of)
        }
        Commands::LoginUrl { service } => commands::cas::login_url(&config, &service),
        Commands::Validate { ticket, service } => {
            commands::cas::validate(&config, &ticket, &service)
        }
        Commands::Config { format } => commands::config::show(&config, format),
    }
}
