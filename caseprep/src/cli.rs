// caseprep/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use caseprep_common::config::Config;
use caseprep_common::error::Result;
use clap::{ArgAction, Parser, Subcommand};

pub mod install;
pub mod list;
pub mod status;
pub mod validate;

use crate::cli::install::InstallArgs;
use crate::cli::list::ListArgs;
use crate::cli::validate::ValidateArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "caseprep", bin_name = "caseprep")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory for the per-run log file.
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a selection of tools from the catalog
    Install(InstallArgs),
    /// Show the tools the catalog offers
    List(ListArgs),
    /// Check a catalog file without installing anything
    Validate(ValidateArgs),
}

impl Command {
    /// Runs the subcommand and yields the process exit code.
    pub async fn run(&self, config: &Config) -> Result<i32> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Validate(command) => command.run(config).await,
        }
    }
}
