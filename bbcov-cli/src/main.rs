//! bbcov command line
//!
//! # Commands
//!
//! - `bbcov verify` - Check a build layout without writing anything
//! - `bbcov template` - Write all-false coverage stores for a build layout
//! - `bbcov merge` - OR-merge one coverage store into another

mod app;

use std::path::PathBuf;

use anyhow::Result;
use bbcov_runtime::RuntimeConfig;
use clap::{Parser, Subcommand};

use app::{AppConfig, OutputFormat};

/// bbcov - basic-block coverage stores
#[derive(Parser, Debug)]
#[command(name = "bbcov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a build layout for names that cannot be stored
    Verify {
        /// Build layout JSON
        layout: PathBuf,
    },

    /// Verify a build layout, then overwrite each listed file's store with
    /// an all-false template
    ///
    /// Prints the written store paths. Nothing is written if verification fails.
    Template {
        /// Build layout JSON
        layout: PathBuf,
    },

    /// OR-merge the store SOURCE into the store TARGET
    Merge {
        source: PathBuf,
        target: PathBuf,

        /// Hold TARGET's lock file while merging (also enabled by BBCOV_LOCK)
        #[arg(long)]
        lock: bool,
    },
}

impl From<&Cli> for AppConfig {
    fn from(cli: &Cli) -> Self {
        let mut runtime = RuntimeConfig::from_env();
        if let Commands::Merge { lock: true, .. } = cli.command {
            runtime.lock = true;
        }
        Self {
            format: cli.format,
            runtime,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    app::init_tracing(cli.verbose);
    let config = AppConfig::from(&cli);

    match &cli.command {
        Commands::Verify { layout } => app::verify(&config, layout),
        Commands::Template { layout } => app::template(&config, layout).map(|_| ()),
        Commands::Merge { source, target, .. } => app::merge(&config, source, target).map(|_| ()),
    }
}
