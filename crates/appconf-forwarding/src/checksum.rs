use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use appconf_core::writer;

use crate::config::ForwardingConfig;

/// The checksum file name inside the build output directory.
pub const CHECKSUM_FILE: &str = "log-forwarding-config.sha256";

/// Computes a deterministic SHA256 digest of a configuration.
///
/// Keys are sorted at every level so the digest does not depend on the
/// order settings were read in.
pub fn compute_checksum(config: &ForwardingConfig) -> String {
    let canonical = canonicalize(&config.to_structured());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Reads a stored digest. Missing or corrupt content yields `None`.
pub fn read_checksum(path: &Path) -> Option<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("checksum {} unavailable: {}", path.display(), e);
            return None;
        }
    };

    let digest = content.trim();
    if digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digest.to_ascii_lowercase())
    } else {
        warn!("ignoring corrupt checksum in {}", path.display());
        None
    }
}

pub fn write_checksum(path: &Path, digest: &str) -> Result<()> {
    writer::write_atomic(path, digest)?;
    debug!("checksum: wrote {} to {}", digest, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ForwardingConfig {
        ForwardingConfig::from_structured(Some(&value)).unwrap()
    }

    #[test]
    fn calculates_deterministic_hash() {
        let a = config(json!({"splunk_hec": {"host": "h", "port": "8088"}}));
        let b = config(json!({"splunk_hec": {"port": "8088", "host": "h"}}));

        let hash = compute_checksum(&a);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_checksum(&a));
        assert_eq!(hash, compute_checksum(&b));

        let changed = config(json!({"splunk_hec": {"host": "h2", "port": "8088"}}));
        assert_ne!(hash, compute_checksum(&changed));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dist").join(CHECKSUM_FILE);
        let digest = compute_checksum(&ForwardingConfig::default());

        assert_eq!(read_checksum(&path), None);
        write_checksum(&path, &digest).unwrap();
        assert_eq!(read_checksum(&path), Some(digest));
    }

    #[test]
    fn corrupt_checksum_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHECKSUM_FILE);
        std::fs::write(&path, "not a digest").unwrap();
        assert_eq!(read_checksum(&path), None);
    }
}
