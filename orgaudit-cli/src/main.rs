//! OrgAudit CLI - inspect org metadata datasets and their cache
//!
//! Runs the static scanner and dependency views over local files, runs
//! datasets against recorded query results, and administers the dataset
//! cache.

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use config::OrgAuditConfig;
use output::OutputFormat;

/// Audit org metadata: code scans, dependency views and cached datasets.
#[derive(Parser)]
#[command(name = "orgaudit")]
#[command(author, version)]
#[command(about = "Audit org metadata: code scans, dependency views and cached datasets")]
#[command(propagate_version = true)]
#[command(after_help = "Examples:
  orgaudit scan classes/AccountService.cls
  orgaudit deps edges.json 01p000000000001
  orgaudit run apex-classes permission-sets --fixtures rows.json
  orgaudit cache list")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (overrides config default)
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the static checks over one source file
    Scan {
        /// File to scan
        file: String,

        /// Treat the file as markup (pages, components)
        #[arg(long)]
        markup: bool,
    },

    /// Show what an entity uses and what references it
    Deps {
        /// JSON file holding an array of dependency edges
        edges: String,

        /// Entity id (15 or 18 characters)
        id: String,

        /// Build an adjacency index instead of scanning the edge list
        #[arg(long)]
        indexed: bool,
    },

    /// Run datasets against recorded query results
    Run {
        /// Dataset aliases (apex-classes, permission-sets, object-fields, dependencies)
        #[arg(required = true)]
        aliases: Vec<String>,

        /// JSON file mapping object names to row arrays
        #[arg(long)]
        fixtures: String,

        /// Object API name for object-fields
        #[arg(long)]
        object: Option<String>,
    },

    /// Inspect or clear the dataset cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached datasets
    #[command(visible_alias = "ls")]
    List,

    /// Remove one cached dataset
    #[command(visible_alias = "rm")]
    Remove {
        /// Cache key
        name: String,
    },

    /// Remove every cached dataset
    Clear,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = OrgAuditConfig::load(std::path::Path::new("."));

    // CLI flag > config default > Table
    let format = cli.format.unwrap_or_else(|| {
        config
            .default_format()
            .and_then(|f| f.parse().ok())
            .unwrap_or(OutputFormat::Table)
    });

    if let Some(use_color) = config.use_color() {
        colored::control::set_override(use_color);
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            println!();
            return Ok(());
        }
    };

    match command {
        Commands::Scan { file, markup } => commands::scan::run(&file, markup, format).await,
        Commands::Deps { edges, id, indexed } => {
            commands::deps::run(&edges, &id, indexed, format).await
        }
        Commands::Run {
            aliases,
            fixtures,
            object,
        } => commands::run::run(&aliases, &fixtures, object.as_deref(), &config, format).await,
        Commands::Cache { action } => {
            let action = match &action {
                CacheCommand::List => commands::cache::CacheAction::List,
                CacheCommand::Remove { name } => commands::cache::CacheAction::Remove(name),
                CacheCommand::Clear => commands::cache::CacheAction::Clear,
            };
            commands::cache::run(action, &config, format).await
        }
    }
}
