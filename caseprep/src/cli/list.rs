// caseprep/src/cli/list.rs
use std::path::PathBuf;

use caseprep_common::catalog::Catalog;
use caseprep_common::config::Config;
use caseprep_common::error::Result;
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Use an alternate catalog file
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Only show tools installed by default
    #[arg(long)]
    defaults: bool,
}

impl ListArgs {
    pub async fn run(&self, config: &Config) -> Result<i32> {
        let catalog_path = self
            .catalog
            .clone()
            .unwrap_or_else(|| config.catalog_path.clone());
        let catalog = Catalog::load(&catalog_path)?;

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Category").style_spec("b"),
            Cell::new("Id").style_spec("b"),
            Cell::new("Name").style_spec("b"),
            Cell::new("Installer").style_spec("b"),
            Cell::new("Default").style_spec("b"),
        ]));

        let mut count = 0;
        for category in &catalog.categories {
            for tool in &category.items {
                if self.defaults && !tool.default {
                    continue;
                }
                table.add_row(Row::new(vec![
                    Cell::new(&category.name),
                    Cell::new(&tool.id),
                    Cell::new(&tool.name),
                    Cell::new(tool.installer.kind()),
                    Cell::new(if tool.default { "yes" } else { "" }),
                ]));
                count += 1;
            }
        }

        if count == 0 {
            println!("{}", "The catalog offers no matching tools".yellow());
            return Ok(0);
        }

        table.printstd();
        println!("{count} tools available");
        Ok(0)
    }
}
