// caseprep/src/cli/validate.rs
use std::path::PathBuf;

use caseprep_common::catalog::Catalog;
use caseprep_common::config::Config;
use caseprep_common::error::Result;
use caseprep_common::model::InstallerSpec;
use caseprep_core::installer::builtin;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Catalog file to check; defaults to the configured catalog
    catalog: Option<PathBuf>,
}

impl ValidateArgs {
    pub async fn run(&self, config: &Config) -> Result<i32> {
        let catalog_path = self
            .catalog
            .clone()
            .unwrap_or_else(|| config.catalog_path.clone());
        let catalog = match Catalog::load(&catalog_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                eprintln!(
                    "{}: {} is not a usable catalog: {:#}",
                    "Invalid".red().bold(),
                    catalog_path.display(),
                    e
                );
                return Ok(1);
            }
        };

        // Structural validation passed at load time; cross-check builtin
        // references so a typo fails here rather than mid-run.
        let mut problems = 0;
        for tool in catalog.tools() {
            if let InstallerSpec::Builtin { function, .. } = &tool.installer {
                if !builtin::registry().contains(function) {
                    eprintln!(
                        "{}: tool '{}' references unknown builtin function '{}' (known: {})",
                        "Invalid".red().bold(),
                        tool.id,
                        function,
                        builtin::registry().names().join(", ")
                    );
                    problems += 1;
                }
            }
        }

        if problems > 0 {
            return Ok(1);
        }

        println!(
            "{} {} ({} tools in {} categories)",
            "Valid:".green().bold(),
            catalog_path.display(),
            catalog.tools().count(),
            catalog.categories.len()
        );
        Ok(0)
    }
}
