use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tool settings read from `appconf.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AppconfSettings {
    #[serde(default)]
    pub project: ProjectSettings,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub forwarding: ForwardingSettings,
}

impl AppconfSettings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        let settings = toml::from_str::<Self>(&text)
            .with_context(|| format!("failed to parse TOML settings: {}", path.display()))?;
        Ok(settings)
    }

    /// Like [`Self::load_from_file`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectSettings {
    pub org_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportSettings {
    #[serde(default)]
    pub prefer_legacy: bool,
    pub runtime_api_host: Option<String>,
    pub flat_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForwardingSettings {
    pub dist_dir: Option<PathBuf>,
    /// Field kinds per destination, e.g. `[forwarding.destinations.splunk_hec]`.
    #[serde(default)]
    pub destinations: BTreeMap<String, BTreeMap<String, SettingKind>>,
}

/// Whether a destination setting is stored in the structured file or the flat secrets file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    #[default]
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "password")]
    Secret,
}
