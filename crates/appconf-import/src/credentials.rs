use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Field holding the organization id inside a credential's auth block.
pub const ORG_ID_FIELD: &str = "ims_org_id";

/// The integration type a workspace credential was created with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Legacy service account (JWT).
    Service,
    OAuthServerToServer,
    /// A service account being migrated; carries both auth blocks.
    OAuthServerToServerMigrate,
    Other(String),
}

impl CredentialKind {
    pub fn parse(integration_type: &str) -> Self {
        match integration_type {
            "service" => Self::Service,
            "oauth_server_to_server" => Self::OAuthServerToServer,
            "oauth_server_to_server_migrate" => Self::OAuthServerToServerMigrate,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Service => "service",
            Self::OAuthServerToServer => "oauth_server_to_server",
            Self::OAuthServerToServerMigrate => "oauth_server_to_server_migrate",
            Self::Other(other) => other,
        }
    }
}

impl Display for CredentialKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential as it appears in a workspace payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub integration_type: String,
    #[serde(default)]
    pub jwt: Option<Map<String, Value>>,
    #[serde(default)]
    pub oauth_server_to_server: Option<Map<String, Value>>,
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        CredentialKind::parse(&self.integration_type)
    }

    /// The legacy auth block, if this credential can act as a legacy credential.
    fn legacy_block(&self) -> Option<&Map<String, Value>> {
        match self.kind() {
            CredentialKind::Service | CredentialKind::OAuthServerToServerMigrate => {
                self.jwt.as_ref()
            }
            _ => None,
        }
    }

    /// The OAuth server-to-server block, if this credential can act as one.
    fn oauth_block(&self) -> Option<&Map<String, Value>> {
        match self.kind() {
            CredentialKind::OAuthServerToServer | CredentialKind::OAuthServerToServerMigrate => {
                self.oauth_server_to_server.as_ref()
            }
            _ => None,
        }
    }

    /// The display name with spaces replaced, usable as a map key.
    pub fn reference_name(&self) -> String {
        self.name.replace(' ', "_")
    }
}

/// Which auth block of a credential is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFlavor {
    Legacy,
    OAuth,
}

/// The single credential whose secret material gets emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialEntry {
    pub id: Value,
    pub name: String,
    pub kind: CredentialKind,
    pub flavor: AuthFlavor,
    /// The selected auth block, secrets included.
    pub fields: Map<String, Value>,
}

impl CredentialEntry {
    fn from_credential(credential: &Credential, flavor: AuthFlavor, fields: &Map<String, Value>) -> Self {
        Self {
            id: credential.id.clone(),
            name: credential.reference_name(),
            kind: credential.kind(),
            flavor,
            fields: fields.clone(),
        }
    }
}

/// A secret-free summary of a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialReference {
    pub id: Value,
    pub name: String,
    pub kind: CredentialKind,
}

impl CredentialReference {
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "integration_type": self.kind.as_str(),
        })
    }
}

/// Fills in a missing organization id on every legacy or OAuth auth block.
///
/// Existing values are never replaced.
pub fn enrich_org_id(credentials: &mut [Credential], org_id: &str) {
    for credential in credentials.iter_mut() {
        let kind = credential.kind();
        let blocks = [
            (
                matches!(kind, CredentialKind::Service | CredentialKind::OAuthServerToServerMigrate),
                credential.jwt.as_mut(),
            ),
            (
                matches!(
                    kind,
                    CredentialKind::OAuthServerToServer | CredentialKind::OAuthServerToServerMigrate
                ),
                credential.oauth_server_to_server.as_mut(),
            ),
        ];
        for (applies, block) in blocks {
            let Some(block) = block.filter(|_| applies) else {
                continue;
            };
            if !block.contains_key(ORG_ID_FIELD) {
                debug!("setting {ORG_ID_FIELD} on credential '{}'", credential.name);
                block.insert(ORG_ID_FIELD.to_string(), Value::String(org_id.to_string()));
            }
        }
    }
}

/// Picks the credential whose secrets are emitted.
///
/// When both a legacy and an OAuth server-to-server credential exist, the
/// legacy one wins only if `prefer_legacy` is set. Returns `None` when no
/// credential carries usable auth material.
pub fn select_active(
    credentials: &mut [Credential],
    org_id: Option<&str>,
    prefer_legacy: bool,
) -> Option<CredentialEntry> {
    if let Some(org_id) = org_id {
        enrich_org_id(credentials, org_id);
    }

    let legacy = credentials
        .iter()
        .find_map(|c| c.legacy_block().map(|block| (c, block)));
    let oauth = credentials
        .iter()
        .find_map(|c| c.oauth_block().map(|block| (c, block)));

    let (credential, flavor, block) = match (legacy, oauth) {
        (Some((c, block)), Some(_)) if prefer_legacy => (c, AuthFlavor::Legacy, block),
        (_, Some((c, block))) => (c, AuthFlavor::OAuth, block),
        (Some((c, block)), None) => (c, AuthFlavor::Legacy, block),
        (None, None) => {
            debug!("no service credential found in workspace");
            return None;
        }
    };

    debug!(
        "selected credential '{}' ({}, {:?})",
        credential.name,
        credential.kind(),
        flavor
    );
    Some(CredentialEntry::from_credential(credential, flavor, block))
}

pub fn to_reference(credential: &Credential) -> CredentialReference {
    CredentialReference {
        id: credential.id.clone(),
        name: credential.reference_name(),
        kind: credential.kind(),
    }
}

pub fn to_references(credentials: &[Credential]) -> Vec<CredentialReference> {
    credentials.iter().map(to_reference).collect()
}

/// Builds `{ <name>: { id, integration_type } }` from references.
///
/// Names are the map keys, so of two credentials sharing a name the later one is kept.
pub fn references_document(references: &[CredentialReference]) -> Map<String, Value> {
    let mut document = Map::new();
    for reference in references {
        if let Some(previous) = document.insert(reference.name.clone(), reference.to_value()) {
            warn!(
                "credential name '{}' is used more than once; reference {} replaces {}",
                reference.name,
                reference.id,
                previous["id"]
            );
        }
    }
    document
}
