//! Bayward - server profile reconciliation
//!
//! Usage:
//!   bayward present --data profile.json   # Create or update a profile
//!   bayward compliant --name web-01       # Remediate template compliance
//!   bayward absent --name web-01          # Delete a profile
//!   bayward merge --existing a.json --desired b.json

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bayward_core::compare::{normalize, profiles_equivalent};
use bayward_core::config::load_config;
use bayward_core::document::{ProfileDocument, keys, parse_document};
use bayward_core::merge::merge;
use bayward_core::prelude::{
    DesiredState, Outcome, ProfileReconciler, ReconcileSettings, RestProfileService,
};

/// Environment variable naming an additional, more verbose log file.
const LOGFILE_ENV: &str = "LOGFILE";

#[derive(Parser)]
#[command(name = "bayward")]
#[command(about = "Server profile reconciliation", long_about = None)]
struct Cli {
    /// Path to bayward.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the profile, or update it to match the desired document
    Present {
        /// Desired profile as JSON ("-" reads stdin)
        #[arg(long)]
        data: PathBuf,
    },

    /// Remediate a profile's compliance with its template
    Compliant {
        /// Profile name
        #[arg(long)]
        name: String,
    },

    /// Delete a profile
    #[command(alias = "rm")]
    Absent {
        /// Profile name
        #[arg(long)]
        name: String,
    },

    /// Merge two profile documents offline and report whether they differ
    Merge {
        /// Profile as currently stored
        #[arg(long)]
        existing: PathBuf,

        /// Desired profile
        #[arg(long)]
        desired: PathBuf,
    },
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    run_cli(cli)
}

fn init_tracing() -> Result<()> {
    let console = fmt::layer().with_writer(std::io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "bayward=info,warn".into()),
    );

    let logfile = match std::env::var_os(LOGFILE_ENV) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {}", Path::new(&path).display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new("bayward=debug,info")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(logfile)
        .init();

    Ok(())
}

fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Present { data } => {
            let desired = read_document(&data)?;
            reconcile(cli.config.as_deref(), DesiredState::Present, desired, cli.format)
        }
        Commands::Compliant { name } => reconcile(
            cli.config.as_deref(),
            DesiredState::Compliant,
            named(name),
            cli.format,
        ),
        Commands::Absent { name } => reconcile(
            cli.config.as_deref(),
            DesiredState::Absent,
            named(name),
            cli.format,
        ),
        Commands::Merge { existing, desired } => run_merge(&existing, &desired, cli.format),
    }
}

fn reconcile(
    config_path: Option<&Path>,
    state: DesiredState,
    desired: ProfileDocument,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::debug!(url = %config.appliance.url, ?state, "Connecting to appliance");
    let service = RestProfileService::connect(&config.appliance)
        .context("Failed to set up appliance client")?;
    let reconciler =
        ProfileReconciler::new(&service, ReconcileSettings::from_config(&config.allocation));

    let outcome = reconciler.run(state, desired)?;
    print_outcome(&outcome, format)
}

fn run_merge(existing: &Path, desired: &Path, format: OutputFormat) -> Result<()> {
    let existing = read_document(existing)?;
    let desired = read_document(desired)?;

    let merged = merge(&existing, &desired)?;
    let changed = !profiles_equivalent(&normalize(&existing), &normalize(&merged));

    match format {
        OutputFormat::Table => {
            if changed {
                println!("✓ Desired profile differs from existing");
            } else {
                println!("• Existing profile already matches");
            }
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "changed": changed,
                "merged": merged,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn print_outcome(outcome: &Outcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let marker = if outcome.changed { "✓" } else { "•" };
            println!("{} {}", marker, outcome.message);

            if let Some(facts) = &outcome.facts {
                let field = |key: &str| {
                    facts
                        .server_profile
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or("-")
                        .to_string()
                };
                println!("  Name:      {}", field(keys::NAME));
                println!("  URI:       {}", field(keys::URI));
                println!("  Hardware:  {}", field(keys::SERVER_HARDWARE_URI));
                if let Some(serial) = &facts.serial_number {
                    println!("  Serial:    {}", serial);
                }
                if let Some(compliance) = facts
                    .server_profile
                    .get(keys::TEMPLATE_COMPLIANCE)
                    .and_then(Value::as_str)
                {
                    println!("  Template:  {}", compliance);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> Result<ProfileDocument> {
    let text = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read profile from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?
    };

    parse_document(&text).with_context(|| format!("Invalid profile: {}", path.display()))
}

fn named(name: String) -> ProfileDocument {
    let mut document = Map::new();
    document.insert(keys::NAME.to_string(), Value::String(name));
    document
}
