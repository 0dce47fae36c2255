pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "celebra",
    about = "Celebra operator CLI",
    long_about = "Operate the Celebra booking backend: migrations, config inspection, readiness checks, catalog and quote previews.",
    after_help = "Examples:\n  celebra doctor --json\n  celebra config\n  celebra quote --selection selection.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bring the database schema up to the version bundled with this build.
    Migrate,
    /// Print every setting with where its value came from; secrets are masked.
    Config,
    /// Check config, gateway keys, database reachability and schema version.
    Doctor {
        /// Print the report as JSON instead of a checklist.
        #[arg(long)]
        json: bool,
    },
    /// Validate a service catalog and count its entries.
    Catalog {
        /// Catalog JSON file; defaults to the built-in catalog.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Price a saved selection and print the quote as JSON.
    Quote {
        /// SelectionState JSON file.
        #[arg(long)]
        selection: PathBuf,
        /// Catalog JSON file; defaults to the built-in catalog.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

impl Command {
    fn execute(self) -> CommandResult {
        match self {
            Self::Migrate => commands::migrate::run(),
            Self::Config => CommandResult { exit_code: 0, output: commands::config::run() },
            Self::Doctor { json } => {
                CommandResult { exit_code: 0, output: commands::doctor::run(json) }
            }
            Self::Catalog { file } => commands::catalog::run(file.as_deref()),
            Self::Quote { selection, catalog } => {
                commands::quote::run(&selection, catalog.as_deref())
            }
        }
    }
}

pub fn run() -> ExitCode {
    let result = Cli::parse().command.execute();
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
