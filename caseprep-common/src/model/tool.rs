// caseprep-common/src/model/tool.rs
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::action::PostInstallAction;

/// Immutable descriptor of one installable unit from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Included when the user accepts the default selection.
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub installer: InstallerSpec,
    #[serde(default)]
    pub post_install: Vec<PostInstallAction>,
}

/// The strategy used to materialize a tool on disk. Exactly three variants;
/// adding another backend is a reviewable code change, not a plugin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "installer", rename_all = "snake_case")]
pub enum InstallerSpec {
    /// Delegates to the Chocolatey package manager, keyed by package name.
    Chocolatey {
        package: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    /// Dot-sources a PowerShell script under the installers directory and
    /// invokes the named entry-point function.
    PowershellScript {
        script: PathBuf,
        function: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<String>,
    },
    /// Invokes an in-process routine from the builtin registry.
    Builtin {
        function: String,
        #[serde(default)]
        args: BTreeMap<String, String>,
    },
}

impl InstallerSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            InstallerSpec::Chocolatey { .. } => "chocolatey",
            InstallerSpec::PowershellScript { .. } => "powershell_script",
            InstallerSpec::Builtin { .. } => "builtin",
        }
    }

    /// Structural validation beyond what serde enforces: the declared
    /// parameters must be non-empty for the declared kind.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            InstallerSpec::Chocolatey { package, version } => {
                if package.trim().is_empty() {
                    return Err("chocolatey installer requires a non-empty 'package'".into());
                }
                if version.as_deref().is_some_and(|v| v.trim().is_empty()) {
                    return Err("chocolatey 'version' must be non-empty when present".into());
                }
            }
            InstallerSpec::PowershellScript { script, function, .. } => {
                if script.as_os_str().is_empty() {
                    return Err("powershell_script installer requires a 'script' path".into());
                }
                if function.trim().is_empty() {
                    return Err("powershell_script installer requires a 'function' name".into());
                }
            }
            InstallerSpec::Builtin { function, .. } => {
                if function.trim().is_empty() {
                    return Err("builtin installer requires a 'function' id".into());
                }
            }
        }
        Ok(())
    }
}
