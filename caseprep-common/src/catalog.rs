// caseprep-common/src/catalog.rs
//! Loading and validation of the tool catalog (`tools.json`).
//!
//! Loading is pure: it reads the source document and nothing else. Every
//! structural problem is reported as `MalformedCatalog` before any
//! installation is attempted.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CaseprepError, Result};
use crate::model::ToolSpec;

/// One named group of tools. Grouping is display-only; execution order is
/// document order across all categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| {
            CaseprepError::MalformedCatalog(format!(
                "cannot read catalog {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(raw)
            .map_err(|e| CaseprepError::MalformedCatalog(e.to_string()))?;
        catalog.validate()?;
        debug!("Catalog loaded: {} tools", catalog.tools().count());
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for tool in self.tools() {
            if tool.id.trim().is_empty() {
                return Err(CaseprepError::MalformedCatalog(format!(
                    "tool '{}' has an empty id",
                    tool.name
                )));
            }
            if tool.name.trim().is_empty() {
                return Err(CaseprepError::MalformedCatalog(format!(
                    "tool '{}' has an empty name",
                    tool.id
                )));
            }
            if !seen.insert(tool.id.as_str()) {
                return Err(CaseprepError::MalformedCatalog(format!(
                    "duplicate tool id '{}'",
                    tool.id
                )));
            }
            tool.installer.validate().map_err(|msg| {
                CaseprepError::MalformedCatalog(format!("tool '{}': {msg}", tool.id))
            })?;
        }
        Ok(())
    }

    /// All tools across categories, in document order.
    pub fn tools(&self) -> impl Iterator<Item = &ToolSpec> {
        self.categories.iter().flat_map(|c| c.items.iter())
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.tools().map(|t| t.id.clone()).collect()
    }

    pub fn default_tool_ids(&self) -> Vec<String> {
        self.tools()
            .filter(|t| t.default)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&ToolSpec> {
        self.tools().find(|t| t.id == id)
    }
}
