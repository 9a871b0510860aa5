use serde_json::{Map, Value};
use thiserror::Error;

use crate::flat::FlatDocument;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlattenError {
    #[error("flatten separator must not be empty")]
    EmptySeparator,
    /// A nested key starting with the separator cannot be told apart from a
    /// parent key ending with it once escaped. The same holds for an empty
    /// nested key holding a mapping.
    #[error("key '{key}' under '{parent}' cannot be flattened unambiguously with separator '{separator}'")]
    AmbiguousKey {
        parent: String,
        key: String,
        separator: String,
    },
}

/// Flattens a nested document into `prefix + escaped path` keys.
///
/// Nested mappings recurse with `separator` joining segments. Arrays are
/// stored as one compact JSON string and never recursed into. Every
/// separator occurring inside a source key is doubled.
pub fn flatten(
    doc: &Map<String, Value>,
    prefix: &str,
    separator: &str,
) -> Result<FlatDocument, FlattenError> {
    if separator.is_empty() {
        return Err(FlattenError::EmptySeparator);
    }
    let mut out = FlatDocument::new();
    flatten_into(doc, prefix, separator, None, &mut out)?;
    Ok(out)
}

fn flatten_into(
    doc: &Map<String, Value>,
    prefix: &str,
    separator: &str,
    parent: Option<&str>,
    out: &mut FlatDocument,
) -> Result<(), FlattenError> {
    for (key, value) in doc {
        if let Some(parent) = parent {
            let empty_branch = key.is_empty() && value.is_object();
            if key.starts_with(separator) || empty_branch {
                return Err(FlattenError::AmbiguousKey {
                    parent: parent.to_string(),
                    key: key.clone(),
                    separator: separator.to_string(),
                });
            }
        }

        let flat_key = format!("{prefix}{}", escape(key, separator));
        match value {
            Value::Object(nested) => {
                let nested_prefix = format!("{flat_key}{separator}");
                flatten_into(nested, &nested_prefix, separator, Some(key), out)?;
            }
            Value::Array(_) => {
                out.insert(flat_key, Value::String(value.to_string()));
            }
            leaf => {
                out.insert(flat_key, leaf.clone());
            }
        }
    }
    Ok(())
}

/// Doubles every occurrence of `separator` inside `key`.
pub fn escape(key: &str, separator: &str) -> String {
    key.replace(separator, &separator.repeat(2))
}

/// Recovers the key path of a flattened key.
///
/// Returns `None` when `flat_key` does not start with `prefix`. A doubled
/// separator is read as a literal, a single one as a segment boundary.
pub fn unflatten_key(flat_key: &str, prefix: &str, separator: &str) -> Option<Vec<String>> {
    let mut rest = flat_key.strip_prefix(prefix)?;
    if separator.is_empty() {
        return Some(vec![rest.to_string()]);
    }

    let doubled = separator.repeat(2);
    let mut segments = Vec::new();
    let mut current = String::new();
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix(doubled.as_str()) {
            current.push_str(separator);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(separator) {
            segments.push(std::mem::take(&mut current));
            rest = tail;
        } else {
            let ch = rest.chars().next()?;
            current.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    segments.push(current);
    Some(segments)
}
