use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use appconf_core::constants::{FLAT_PREFIX, FLAT_SEPARATOR};
use appconf_core::writer::{self, WriteReport};
use appconf_core::{codec, flatten, FlatDocument, Prompter, StructuredDocument, WritePolicy};

use crate::credentials::{self, Credential, CredentialEntry};

const DETAILS_POINTER: &str = "/project/workspace/details";
const ORG_ID_POINTER: &str = "/project/org/ims_org_id";

/// Caller-supplied import parameters.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Organization id for credentials that lack one. Falls back to `project.org.ims_org_id`.
    pub org_id: Option<String>,
    pub prefer_legacy: bool,
    pub runtime_api_host: Option<String>,
    pub flat_prefix: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            org_id: None,
            prefer_legacy: false,
            runtime_api_host: None,
            flat_prefix: FLAT_PREFIX.to_string(),
        }
    }
}

/// The document pair produced from a workspace payload.
#[derive(Debug, Clone)]
pub struct ImportedConfig {
    /// The payload with secrets removed and credentials reduced to references.
    pub structured: StructuredDocument,
    /// Runtime and credential secrets in flattened form.
    pub flat: FlatDocument,
    pub active: Option<CredentialEntry>,
}

/// Splits a workspace payload into its secret-free and secret-bearing parts.
#[instrument(skip_all)]
pub fn import_workspace(payload: StructuredDocument, options: &ImportOptions) -> Result<ImportedConfig> {
    let mut root = Value::Object(payload);

    let org_id = options
        .org_id
        .clone()
        .or_else(|| root.pointer(ORG_ID_POINTER).and_then(Value::as_str).map(str::to_string));

    let mut credentials: Vec<Credential> = match root.pointer(&format!("{DETAILS_POINTER}/credentials")) {
        Some(Value::Array(items)) => serde_json::from_value(Value::Array(items.clone()))
            .context("workspace credentials are malformed")?,
        _ => Vec::new(),
    };
    debug!("workspace has {} credential(s)", credentials.len());

    let active = credentials::select_active(&mut credentials, org_id.as_deref(), options.prefer_legacy);
    let references = credentials::to_references(&credentials);

    let mut secrets = Map::new();
    if let Some(runtime) = runtime_secrets(&root, options.runtime_api_host.as_deref()) {
        secrets.insert("runtime".to_string(), Value::Object(runtime));
    }
    if let Some(active) = &active {
        let mut contexts = Map::new();
        contexts.insert(active.name.clone(), Value::Object(active.fields.clone()));
        secrets.insert("ims".to_string(), json!({ "contexts": contexts }));
    }
    let flat = flatten(&secrets, &options.flat_prefix, FLAT_SEPARATOR)
        .context("cannot flatten workspace secrets")?;

    if let Some(Value::Object(details)) = root.pointer_mut(DETAILS_POINTER) {
        if details.contains_key("credentials") {
            details.insert(
                "credentials".to_string(),
                Value::Object(credentials::references_document(&references)),
            );
        }
        strip_namespace_auth(details);
    }

    let Value::Object(structured) = root else {
        bail!("workspace payload root is not a mapping");
    };
    Ok(ImportedConfig {
        structured,
        flat,
        active,
    })
}

/// Parses a payload in any supported format and imports it.
pub fn import_text(text: &str, options: &ImportOptions) -> Result<ImportedConfig> {
    let (payload, format) = codec::parse(text)?;
    debug!("payload parsed as {format}");
    import_workspace(payload, options)
}

/// Imports a payload and writes the `.aio`/`.env` pair into `target_dir`.
#[instrument(skip(text, options, prompter))]
pub fn import_and_write(
    text: &str,
    target_dir: &Path,
    options: &ImportOptions,
    policy: WritePolicy,
    prompter: &mut dyn Prompter,
) -> Result<WriteReport> {
    let imported = import_text(text, options)?;
    let report = writer::write(&imported.structured, &imported.flat, target_dir, policy, prompter)?;
    info!(
        "import complete: structured={}, flat={}",
        report.structured.as_str(),
        report.flat.as_str()
    );
    Ok(report)
}

fn runtime_secrets(root: &Value, api_host: Option<&str>) -> Option<Map<String, Value>> {
    let namespace = root
        .pointer(&format!("{DETAILS_POINTER}/runtime/namespaces/0"))?
        .as_object()?;

    let mut runtime = Map::new();
    if let Some(name) = namespace.get("name") {
        runtime.insert("namespace".to_string(), name.clone());
    }
    if let Some(auth) = namespace.get("auth") {
        runtime.insert("auth".to_string(), auth.clone());
    }
    if let Some(host) = api_host {
        runtime.insert("apihost".to_string(), Value::String(host.to_string()));
    }
    Some(runtime)
}

fn strip_namespace_auth(details: &mut Map<String, Value>) {
    let Some(Value::Array(namespaces)) = details
        .get_mut("runtime")
        .and_then(|runtime| runtime.get_mut("namespaces"))
    else {
        return;
    };
    for namespace in namespaces.iter_mut().filter_map(Value::as_object_mut) {
        namespace.remove("auth");
    }
}
