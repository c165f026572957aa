// caseprep-common/src/model/action.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Scope of a persistent environment-variable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathScope {
    #[default]
    User,
    Machine,
}

impl PathScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathScope::User => "User",
            PathScope::Machine => "Machine",
        }
    }
}

/// Side effect applied after a tool's files exist on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PostInstallAction {
    AddToPath {
        dir: PathBuf,
        #[serde(default)]
        scope: PathScope,
    },
    CreateShortcut {
        target: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dir: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
    },
    PinTaskbar {
        target: PathBuf,
    },
    SetRegistryValue {
        key: String,
        name: String,
        value: String,
    },
}

impl PostInstallAction {
    pub fn describe(&self) -> String {
        match self {
            PostInstallAction::AddToPath { dir, scope } => {
                format!("add {} to {} PATH", dir.display(), scope.as_str())
            }
            PostInstallAction::CreateShortcut { target, .. } => {
                format!("create shortcut for {}", target.display())
            }
            PostInstallAction::PinTaskbar { target } => {
                format!("pin {} to taskbar", target.display())
            }
            PostInstallAction::SetRegistryValue { key, name, .. } => {
                format!("set registry value {key}\\{name}")
            }
        }
    }
}
