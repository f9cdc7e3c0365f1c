//! atlas-kb CLI - Browse relationships in a threat knowledge base

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use atlas_kb::config;
use atlas_kb::index::Match;
use commands::{Direction, OutputFormat, Session};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "atlas-kb")]
#[command(version)]
#[command(about = "Relationship browser for typed, cross-referencing threat knowledge bases")]
#[command(long_about = r#"
atlas-kb loads a knowledge base document (tactics, techniques, mitigations,
case studies) and answers relationship queries over it:
  • What does a record reference
  • What references a record, including sub-technique groupings
  • Which case studies use a tactic or technique in their procedure

Example usage:
  atlas-kb --dataset ATLAS.yaml list --type tactics
  atlas-kb show AML.T0000
  atlas-kb find --type techniques --attr tactics --contains AML.TA0002
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset document (overrides the config file)
    #[arg(short, long, global = true)]
    dataset: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List records, optionally of one type group
    List {
        /// Type group (e.g. tactics, techniques, case-studies)
        #[arg(short = 't', long = "type", conflicts_with = "kind")]
        group: Option<String>,

        /// Object type tag (e.g. tactic, technique, case-study)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Find records of a type group by attribute value
    Find {
        /// Type group to search
        #[arg(short = 't', long = "type")]
        group: String,

        /// Attribute to test
        #[arg(short, long)]
        attr: String,

        /// Attribute equals this value
        #[arg(long, conflicts_with = "contains", required_unless_present = "contains")]
        equals: Option<String>,

        /// Attribute contains this value (substring or list member)
        #[arg(long)]
        contains: Option<String>,
    },

    /// Show every record related to a record
    Show {
        /// Record id
        id: String,
    },

    /// Show records a record references
    Refs {
        /// Record id
        id: String,
    },

    /// Show records referencing a record
    Inbound {
        /// Record id
        id: String,
    },

    /// Show statistics about the loaded dataset
    Stats,

    /// Write a config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Reload the dataset whenever it changes
    Watch {
        /// Record whose relationships are re-printed after each reload
        id: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    if let Commands::Init { force } = cli.command {
        return commands::run_init(&config_path, cli.dataset.as_deref(), force);
    }

    let config = config::load_config(Some(&config_path))?.unwrap_or_default();
    let dataset_path = cli
        .dataset
        .clone()
        .or_else(|| config.dataset.as_ref().map(PathBuf::from))
        .unwrap_or_else(config::default_dataset_path);

    tracing::debug!("Using dataset {}", dataset_path.display());
    let session = Session::open(&dataset_path, config.resolver_options(), cli.format)?;

    match cli.command {
        Commands::List { group, kind } => commands::run_list(&session, group.as_deref(), kind.as_deref()),
        Commands::Find { group, attr, equals, contains } => {
            let predicate = match (&equals, &contains) {
                (Some(value), _) => Match::Equals(value),
                (None, Some(value)) => Match::Contains(value),
                (None, None) => anyhow::bail!("one of --equals or --contains is required"),
            };
            commands::run_find(&session, &group, &attr, predicate)
        }
        Commands::Show { id } => commands::run_relations(&session, &id, Direction::Related),
        Commands::Refs { id } => commands::run_relations(&session, &id, Direction::Outbound),
        Commands::Inbound { id } => commands::run_relations(&session, &id, Direction::Inbound),
        Commands::Stats => commands::run_stats(&session),
        Commands::Watch { id } => commands::run_watch(&session, id.as_deref()),
        // Handled above, before the dataset is loaded
        Commands::Init { .. } => Ok(()),
    }
}
