use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use appconf_core::SettingKind;

/// A destination the remote service can forward logs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationInfo {
    /// Identifier used as the configuration key.
    pub value: String,
    /// Human readable name.
    pub name: String,
}

/// One field a destination accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSetting {
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: SettingKind,
}

impl DestinationSetting {
    pub fn new(name: impl Into<String>, kind: SettingKind) -> Self {
        let name = name.into();
        Self {
            message: name.clone(),
            name,
            kind,
        }
    }
}

/// The remote side holding the applied log forwarding configuration.
pub trait ForwardingService {
    /// Returns the applied configuration as `{ <destination>: settings }`.
    fn get(&self) -> Result<Value>;

    /// Applies a destination and returns the service's response.
    fn set_destination(&mut self, destination: &str, settings: &Map<String, Value>) -> Result<Value>;

    fn supported_destinations(&self) -> Result<Vec<DestinationInfo>>;

    /// The field schema for one destination.
    fn destination_settings(&self, destination: &str) -> Result<Vec<DestinationSetting>>;
}
