use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use appconf_core::writer::{self, ConfigWriter, WriteReport};
use appconf_core::{NoPrompt, StructuredDocument, WritePolicy};

use crate::checksum::{self, CHECKSUM_FILE};
use crate::config::ForwardingConfig;
use crate::service::{DestinationInfo, DestinationSetting, ForwardingService};

const LOG_FORWARDING_KEY: &str = "log_forwarding";

/// Reconciles the locally declared log forwarding configuration with the
/// one applied on the remote service.
///
/// Nothing is cached between calls: the local side is read from the
/// structured document, the remote side from the service.
pub struct LogForwarding<S> {
    project_dir: PathBuf,
    dist_dir: PathBuf,
    project: StructuredDocument,
    service: S,
}

impl<S: ForwardingService> LogForwarding<S> {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        dist_dir: impl Into<PathBuf>,
        project: StructuredDocument,
        service: S,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            dist_dir: dist_dir.into(),
            project,
            service,
        }
    }

    /// Reads the structured file from `project_dir`.
    pub fn load(project_dir: &Path, dist_dir: impl Into<PathBuf>, service: S) -> Result<Self> {
        let project = writer::read_structured(project_dir)?;
        Ok(Self::new(project_dir, dist_dir, project, service))
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn project(&self) -> &StructuredDocument {
        &self.project
    }

    pub fn checksum_path(&self) -> PathBuf {
        self.project_dir.join(&self.dist_dir).join(CHECKSUM_FILE)
    }

    /// Reads `project.workspace.log_forwarding` from the structured document.
    pub fn get_local_config(&self) -> Result<ForwardingConfig> {
        let declared = self
            .project
            .get("project")
            .and_then(|project| project.get("workspace"))
            .and_then(|workspace| workspace.get(LOG_FORWARDING_KEY));
        ForwardingConfig::from_structured(declared)
            .context("invalid local log forwarding configuration")
    }

    pub fn get_local_config_with_secrets<F>(&self, lookup: F) -> Result<ForwardingConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let local = self.get_local_config()?;
        let schema = self.schema_for(&local)?;
        Ok(local.with_secrets(&schema, lookup)?)
    }

    #[instrument(skip(self))]
    pub fn get_server_config(&self) -> Result<ForwardingConfig> {
        let remote = self
            .service
            .get()
            .context("failed to fetch log forwarding configuration")?;
        ForwardingConfig::from_structured(Some(&remote))
            .context("invalid remote log forwarding configuration")
    }

    /// Applies `config` remotely, then records its checksum as the last applied state.
    #[instrument(skip(self, config))]
    pub fn update_server_config(&mut self, config: &ForwardingConfig) -> Result<Value> {
        let destination = config.destination_or_default();
        let response = self
            .service
            .set_destination(destination, config.settings())
            .with_context(|| format!("failed to apply log forwarding destination '{destination}'"))?;

        let path = self.checksum_path();
        checksum::write_checksum(&path, &checksum::compute_checksum(config))?;
        info!("log forwarding destination '{destination}' applied");
        Ok(response)
    }

    /// Persists `config` locally: plain settings into the structured file,
    /// secret settings into the flat file. Both files are merged.
    #[instrument(skip(self, config))]
    pub fn update_local_config(&mut self, config: &ForwardingConfig) -> Result<WriteReport> {
        let destination = config.destination_or_default().to_string();
        let schema = self.schema_for(config)?;
        let (plain, secrets) = config.split_settings(&schema);

        let mut project = match self.project.get("project") {
            Some(Value::Object(project)) => project.clone(),
            _ => Map::new(),
        };
        let mut workspace = project
            .get("workspace")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut forwarding = Map::new();
        forwarding.insert(destination, Value::Object(plain));
        workspace.insert(LOG_FORWARDING_KEY.to_string(), Value::Object(forwarding));
        project.insert("workspace".to_string(), Value::Object(workspace));

        let mut structured = StructuredDocument::new();
        structured.insert("project".to_string(), Value::Object(project));

        let mut prompter = NoPrompt;
        let mut config_writer =
            ConfigWriter::new(&self.project_dir, WritePolicy::merge(), &mut prompter);
        let report = config_writer.write(&structured, &secrets)?;

        self.project = writer::read_structured(&self.project_dir)?;
        Ok(report)
    }

    /// True when the secret-hydrated local configuration differs from the
    /// last applied one, or when no usable checksum was recorded.
    #[instrument(skip(self, lookup))]
    pub fn is_local_config_changed<F>(&self, lookup: F) -> Result<bool>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(stored) = checksum::read_checksum(&self.checksum_path()) else {
            debug!("no recorded checksum, assuming local configuration changed");
            return Ok(true);
        };
        let local = self.get_local_config_with_secrets(lookup)?;
        Ok(stored != checksum::compute_checksum(&local))
    }

    pub fn supported_destinations(&self) -> Result<Vec<DestinationInfo>> {
        self.service.supported_destinations()
    }

    pub fn destination_settings(&self, destination: &str) -> Result<Vec<DestinationSetting>> {
        self.service.destination_settings(destination)
    }

    fn schema_for(&self, config: &ForwardingConfig) -> Result<Vec<DestinationSetting>> {
        match config.destination() {
            Some(destination) if !config.is_default() => self
                .service
                .destination_settings(destination)
                .with_context(|| format!("failed to fetch settings for destination '{destination}'")),
            _ => Ok(Vec::new()),
        }
    }
}
