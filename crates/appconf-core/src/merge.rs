use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::{self, CodecError, Format, StructuredDocument};
use crate::flat::{classify, Line};

/// Which merge algorithm applies to a destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Nested JSON/YAML; merged one level deep.
    Structured,
    /// `KEY=value` lines; merged line by line.
    Flat,
}

/// Merges existing file content with new content.
///
/// Structured output is always pretty-printed JSON.
pub fn merge(old: &str, new: &str, kind: DocumentKind) -> Result<String, CodecError> {
    match kind {
        DocumentKind::Flat => Ok(merge_flat(old, new)),
        DocumentKind::Structured => {
            let (old_doc, _) = codec::parse(old)?;
            let (new_doc, _) = codec::parse(new)?;
            codec::serialize(&merge_structured(old_doc, new_doc), Format::Json)
        }
    }
}

/// Shallow union: top-level keys of `new` replace those of `old` wholesale.
///
/// Nested mappings are not merged recursively.
pub fn merge_structured(old: StructuredDocument, new: StructuredDocument) -> StructuredDocument {
    let mut merged: Map<String, Value> = old;
    for (key, value) in new {
        merged.insert(key, value);
    }
    merged
}

enum Slot {
    Comment(String),
    Blank,
    Key(String),
}

/// Replays `old` then `new` lines; the last assignment of a key wins.
///
/// Keys keep the position of their first appearance. Comments are kept once
/// each; blank lines are kept only from `old`.
pub fn merge_flat(old: &str, new: &str) -> String {
    let mut slots = Vec::new();
    let mut values: HashMap<String, String> = HashMap::new();
    let mut seen_comments = HashSet::new();

    for (source, keep_blank) in [(old, true), (new, false)] {
        for line in source.lines() {
            match classify(line) {
                Line::Comment(comment) => {
                    if seen_comments.insert(comment.to_string()) {
                        slots.push(Slot::Comment(comment.to_string()));
                    }
                }
                Line::Blank => {
                    if keep_blank {
                        slots.push(Slot::Blank);
                    }
                }
                Line::Pair(key, value) => {
                    if values.insert(key.to_string(), value.to_string()).is_none() {
                        slots.push(Slot::Key(key.to_string()));
                    }
                }
                Line::Invalid(text) => debug!("dropping unparseable flat line: {text}"),
            }
        }
    }

    while matches!(slots.last(), Some(Slot::Blank)) {
        slots.pop();
    }

    let mut out = String::new();
    for slot in &slots {
        match slot {
            Slot::Comment(comment) => out.push_str(comment),
            Slot::Blank => {}
            Slot::Key(key) => {
                out.push_str(key);
                out.push('=');
                out.push_str(values.get(key).map(String::as_str).unwrap_or_default());
            }
        }
        out.push('\n');
    }
    if out.is_empty() {
        out.push('\n');
    }
    out
}
