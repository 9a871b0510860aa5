use std::collections::BTreeMap;

use serde_json::{Map, Value};

use appconf_core::{FlatDocument, SettingKind};

use crate::error::ForwardingError;
use crate::service::DestinationSetting;

/// The destination used when none is configured.
pub const DEFAULT_DESTINATION: &str = "adobe_io_runtime";

/// Server-maintained settings that never count as a difference.
pub const IGNORED_SETTINGS: &[&str] = &["updated_at"];

/// A log forwarding destination and its settings.
///
/// Equality treats every default configuration as equal and ignores the
/// volatile fields in [`IGNORED_SETTINGS`].
#[derive(Debug, Clone, Default)]
pub struct ForwardingConfig {
    destination: Option<String>,
    settings: Map<String, Value>,
}

impl ForwardingConfig {
    pub fn new(destination: Option<String>, settings: Map<String, Value>) -> Self {
        Self {
            destination,
            settings,
        }
    }

    /// Reads `{ <destination>: { ...settings } }`.
    ///
    /// An absent payload is the default configuration. A mapping must hold
    /// exactly one destination.
    pub fn from_structured(payload: Option<&Value>) -> Result<Self, ForwardingError> {
        let map = match payload {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ForwardingError::Malformed),
        };

        if map.len() != 1 {
            return Err(ForwardingError::DestinationCount(map.len()));
        }
        let Some((destination, settings)) = map.iter().next() else {
            return Err(ForwardingError::DestinationCount(0));
        };
        let settings = match settings {
            Value::Object(settings) => settings.clone(),
            Value::Null => Map::new(),
            _ => return Err(ForwardingError::MalformedSettings(destination.clone())),
        };
        Ok(Self::new(Some(destination.clone()), settings))
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// The destination name, falling back to [`DEFAULT_DESTINATION`].
    pub fn destination_or_default(&self) -> &str {
        self.destination().unwrap_or(DEFAULT_DESTINATION)
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn is_defined(&self) -> bool {
        self.destination.is_some()
    }

    pub fn is_default(&self) -> bool {
        matches!(self.destination(), None | Some(DEFAULT_DESTINATION))
    }

    /// `{ <destination>: settings }`, or an empty mapping when undefined.
    pub fn to_structured(&self) -> Value {
        let mut map = Map::new();
        if let Some(destination) = &self.destination {
            map.insert(destination.clone(), Value::Object(self.settings.clone()));
        }
        Value::Object(map)
    }

    /// Resolves every secret-kind setting through `lookup`.
    ///
    /// Keys are `<DESTINATION>__<FIELD>` upper-cased. All missing keys are
    /// reported together.
    pub fn with_secrets<F>(
        &self,
        schema: &[DestinationSetting],
        lookup: F,
    ) -> Result<Self, ForwardingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(destination) = self.destination().filter(|_| !self.is_default()) else {
            return Ok(self.clone());
        };

        let mut settings = self.settings.clone();
        let mut missing = Vec::new();
        for setting in schema.iter().filter(|s| s.kind == SettingKind::Secret) {
            let key = secret_key(destination, &setting.name);
            match lookup(&key) {
                Some(value) => {
                    settings.insert(setting.name.clone(), Value::String(value));
                }
                None => missing.push(key),
            }
        }

        if !missing.is_empty() {
            return Err(ForwardingError::MissingSecrets(missing));
        }
        Ok(Self::new(self.destination.clone(), settings))
    }

    /// Splits settings into the plain part and a flat document of secrets
    /// keyed by [`secret_key`].
    pub fn split_settings(&self, schema: &[DestinationSetting]) -> (Map<String, Value>, FlatDocument) {
        let destination = self.destination_or_default();
        let mut plain = Map::new();
        let mut secrets = FlatDocument::new();
        for (name, value) in &self.settings {
            let is_secret = schema
                .iter()
                .any(|s| s.name == *name && s.kind == SettingKind::Secret);
            if is_secret {
                secrets.insert(secret_key(destination, name), value.clone());
            } else {
                plain.insert(name.clone(), value.clone());
            }
        }
        (plain, secrets)
    }

    fn comparable_settings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.settings
            .iter()
            .filter(|(name, _)| !IGNORED_SETTINGS.contains(&name.as_str()))
    }
}

impl PartialEq for ForwardingConfig {
    fn eq(&self, other: &Self) -> bool {
        if self.is_default() && other.is_default() {
            return true;
        }
        if self.destination != other.destination {
            return false;
        }
        let ours = self.comparable_settings().collect::<BTreeMap<_, _>>();
        let theirs = other.comparable_settings().collect::<BTreeMap<_, _>>();
        ours == theirs
    }
}

/// The environment key holding a secret destination field.
pub fn secret_key(destination: &str, field: &str) -> String {
    format!("{destination}__{field}").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn settings(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn splunk_schema() -> Vec<DestinationSetting> {
        vec![
            DestinationSetting::new("host", SettingKind::Text),
            DestinationSetting::new("hec_token", SettingKind::Secret),
            DestinationSetting::new("password", SettingKind::Secret),
        ]
    }

    #[test]
    fn equality_ignores_volatile_fields() {
        let a = ForwardingConfig::new(
            Some("dest".into()),
            settings(json!({"a": "1", "updated_at": "T1"})),
        );
        let b = ForwardingConfig::new(
            Some("dest".into()),
            settings(json!({"a": "1", "updated_at": "T2"})),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn default_states_are_equal() {
        let undefined = ForwardingConfig::new(None, Map::new());
        let named = ForwardingConfig::new(Some(DEFAULT_DESTINATION.into()), Map::new());
        let named_with_settings =
            ForwardingConfig::new(Some(DEFAULT_DESTINATION.into()), settings(json!({"x": 1})));
        assert_eq!(undefined, named);
        assert_eq!(undefined, named_with_settings);
    }

    #[test]
    fn different_destinations_or_values_differ() {
        let a = ForwardingConfig::new(Some("a".into()), settings(json!({"k": "1"})));
        let b = ForwardingConfig::new(Some("b".into()), settings(json!({"k": "1"})));
        let c = ForwardingConfig::new(Some("a".into()), settings(json!({"k": "2"})));
        let d = ForwardingConfig::new(Some("a".into()), settings(json!({"k": "1", "extra": "x"})));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, ForwardingConfig::default());
    }

    #[test]
    fn from_structured_requires_exactly_one_destination() {
        assert_eq!(
            ForwardingConfig::from_structured(None).unwrap(),
            ForwardingConfig::default()
        );
        let err = ForwardingConfig::from_structured(Some(&json!({}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration has 0 destinations. Exactly one must be defined."
        );
        let err = ForwardingConfig::from_structured(Some(&json!({"a": {}, "b": {}}))).unwrap_err();
        assert_eq!(err, ForwardingError::DestinationCount(2));

        let config =
            ForwardingConfig::from_structured(Some(&json!({"splunk_hec": {"host": "h"}}))).unwrap();
        assert_eq!(config.destination(), Some("splunk_hec"));
        assert_eq!(config.settings()["host"], "h");
        assert!(config.is_defined());
        assert!(!config.is_default());
    }

    #[test]
    fn from_structured_rejects_non_mapping_settings() {
        let err = ForwardingConfig::from_structured(Some(&json!({"a": "nope"}))).unwrap_err();
        assert_eq!(err, ForwardingError::MalformedSettings("a".into()));
        let err = ForwardingConfig::from_structured(Some(&json!(["a"]))).unwrap_err();
        assert_eq!(err, ForwardingError::Malformed);
    }

    #[test]
    fn hydration_reports_every_missing_secret() {
        let config =
            ForwardingConfig::new(Some("splunk_hec".into()), settings(json!({"host": "h"})));
        let env = HashMap::from([("SPLUNK_HEC__HEC_TOKEN".to_string(), "tok".to_string())]);

        let err = config
            .with_secrets(&splunk_schema(), |key| env.get(key).cloned())
            .unwrap_err();
        assert_eq!(
            err,
            ForwardingError::MissingSecrets(vec!["SPLUNK_HEC__PASSWORD".to_string()])
        );

        let empty: HashMap<String, String> = HashMap::new();
        let err = config
            .with_secrets(&splunk_schema(), |key| empty.get(key).cloned())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SPLUNK_HEC__HEC_TOKEN"));
        assert!(message.contains("SPLUNK_HEC__PASSWORD"));
    }

    #[test]
    fn hydration_fills_secret_fields() {
        let config =
            ForwardingConfig::new(Some("splunk_hec".into()), settings(json!({"host": "h"})));
        let hydrated = config
            .with_secrets(&splunk_schema(), |key| Some(format!("value-of-{key}")))
            .unwrap();
        assert_eq!(hydrated.settings()["host"], "h");
        assert_eq!(hydrated.settings()["hec_token"], "value-of-SPLUNK_HEC__HEC_TOKEN");
        assert_eq!(hydrated.settings()["password"], "value-of-SPLUNK_HEC__PASSWORD");
    }

    #[test]
    fn default_config_needs_no_secrets() {
        let config = ForwardingConfig::new(Some(DEFAULT_DESTINATION.into()), Map::new());
        let hydrated = config.with_secrets(&splunk_schema(), |_| None).unwrap();
        assert_eq!(hydrated.destination(), Some(DEFAULT_DESTINATION));
    }

    #[test]
    fn split_separates_secret_fields() {
        let config = ForwardingConfig::new(
            Some("splunk_hec".into()),
            settings(json!({"host": "h", "hec_token": "tok", "index": "main"})),
        );
        let (plain, secrets) = config.split_settings(&splunk_schema());
        assert_eq!(Value::Object(plain), json!({"host": "h", "index": "main"}));
        assert_eq!(secrets.get_str("SPLUNK_HEC__HEC_TOKEN").as_deref(), Some("tok"));
        assert_eq!(secrets.len(), 1);
    }
}
