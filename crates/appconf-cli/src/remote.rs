use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::debug;

use appconf_core::{writer, SettingKind};
use appconf_forwarding::{
    DestinationInfo, DestinationSetting, ForwardingService, DEFAULT_DESTINATION,
};

/// A forwarding service backed by a local JSON file.
///
/// The file holds the applied `{ <destination>: settings }` mapping; when it
/// does not exist the default destination is considered applied. Field
/// schemas come from `[forwarding.destinations]` in `appconf.toml`.
#[derive(Debug, Clone)]
pub struct FileService {
    path: PathBuf,
    schemas: BTreeMap<String, BTreeMap<String, SettingKind>>,
}

impl FileService {
    pub fn new(
        path: impl Into<PathBuf>,
        schemas: BTreeMap<String, BTreeMap<String, SettingKind>>,
    ) -> Self {
        Self {
            path: path.into(),
            schemas,
        }
    }
}

fn default_state() -> Value {
    let mut state = Map::new();
    state.insert(DEFAULT_DESTINATION.to_string(), Value::Object(Map::new()));
    Value::Object(state)
}

impl ForwardingService for FileService {
    fn get(&self) -> Result<Value> {
        if !self.path.exists() {
            debug!("{} absent, default destination applied", self.path.display());
            return Ok(default_state());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read '{}'", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse '{}'", self.path.display()))
    }

    fn set_destination(&mut self, destination: &str, settings: &Map<String, Value>) -> Result<Value> {
        if destination != DEFAULT_DESTINATION && !self.schemas.contains_key(destination) {
            bail!("unsupported log forwarding destination '{destination}'");
        }
        let mut state = Map::new();
        state.insert(destination.to_string(), Value::Object(settings.clone()));
        let state = Value::Object(state);

        let mut content = serde_json::to_string_pretty(&state)?;
        content.push('\n');
        writer::write_atomic(&self.path, &content)?;
        Ok(state)
    }

    fn supported_destinations(&self) -> Result<Vec<DestinationInfo>> {
        let names = std::iter::once(DEFAULT_DESTINATION).chain(
            self.schemas
                .keys()
                .map(String::as_str)
                .filter(|name| *name != DEFAULT_DESTINATION),
        );
        Ok(names
            .map(|value| DestinationInfo {
                value: value.to_string(),
                name: value.replace('_', " "),
            })
            .collect())
    }

    fn destination_settings(&self, destination: &str) -> Result<Vec<DestinationSetting>> {
        match self.schemas.get(destination) {
            Some(fields) => Ok(fields
                .iter()
                .map(|(name, kind)| DestinationSetting::new(name.clone(), *kind))
                .collect()),
            None if destination == DEFAULT_DESTINATION => Ok(Vec::new()),
            None => bail!("unsupported log forwarding destination '{destination}'"),
        }
    }
}
