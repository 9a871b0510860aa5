use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// A nested configuration document. The root is always a mapping.
pub type StructuredDocument = Map<String, Value>;

/// The on-disk syntax a structured document was read from or is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(CodecError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Cannot parse {0}")]
    Parse(Format),
    #[error("Cannot serialize {0}")]
    Serialize(Format),
    #[error("unknown document format '{0}'")]
    UnknownFormat(String),
}

/// Parses a structured document, detecting its format from the content.
///
/// Content starting with `{` is read as relaxed JSON (comments and trailing
/// commas allowed); anything else is read as YAML. Empty content yields an
/// empty JSON document.
pub fn parse(content: &str) -> Result<(StructuredDocument, Format), CodecError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok((Map::new(), Format::Json));
    }

    let (value, format) = if trimmed.starts_with('{') {
        let value = json5::from_str::<Value>(trimmed).map_err(|e| {
            debug!("json parse failure: {e}");
            CodecError::Parse(Format::Json)
        })?;
        (value, Format::Json)
    } else {
        let value = serde_yaml::from_str::<Value>(trimmed).map_err(|e| {
            debug!("yaml parse failure: {e}");
            CodecError::Parse(Format::Yaml)
        })?;
        (value, Format::Yaml)
    };

    match value {
        Value::Object(map) => Ok((map, format)),
        // A YAML file holding only comments parses to null.
        Value::Null => Ok((Map::new(), format)),
        other => {
            debug!("document root is not a mapping: {other}");
            Err(CodecError::Parse(format))
        }
    }
}

/// Parses raw bytes, rejecting content that is not UTF-8 as a JSON parse failure.
pub fn parse_bytes(bytes: &[u8]) -> Result<(StructuredDocument, Format), CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::Parse(Format::Json))?;
    parse(text)
}

/// Pretty-prints a document. JSON output uses a two-space indent and ends with a newline.
pub fn serialize(doc: &StructuredDocument, format: Format) -> Result<String, CodecError> {
    match format {
        Format::Json => {
            let mut text =
                serde_json::to_string_pretty(doc).map_err(|_| CodecError::Serialize(format))?;
            text.push('\n');
            Ok(text)
        }
        Format::Yaml => serde_yaml::to_string(doc).map_err(|_| CodecError::Serialize(format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_content_is_empty_json_document() {
        let (doc, format) = parse("  \n\t ").expect("empty content should parse");
        assert!(doc.is_empty());
        assert_eq!(format, Format::Json);
    }

    #[test]
    fn parses_relaxed_json() {
        let text = r#"
        {
            // a comment
            "a": "x",
            'b': { "c": ["y", "z",], },
        }
        "#;
        let (doc, format) = parse(text).expect("relaxed json should parse");
        assert_eq!(format, Format::Json);
        assert_eq!(Value::Object(doc), json!({"a": "x", "b": {"c": ["y", "z"]}}));
    }

    #[test]
    fn parses_yaml() {
        let text = "a: 1\nb:\n  c: hello\n";
        let (doc, format) = parse(text).expect("yaml should parse");
        assert_eq!(format, Format::Yaml);
        assert_eq!(Value::Object(doc), json!({"a": 1, "b": {"c": "hello"}}));
    }

    #[test]
    fn comment_only_yaml_is_empty() {
        let (doc, format) = parse("# nothing here\n").expect("comment-only yaml should parse");
        assert!(doc.is_empty());
        assert_eq!(format, Format::Yaml);
    }

    #[test]
    fn malformed_json_reports_format_only() {
        let err = parse("{ \"a\": ").expect_err("must fail");
        assert!(matches!(err, CodecError::Parse(Format::Json)));
        assert_eq!(err.to_string(), "Cannot parse json");
    }

    #[test]
    fn malformed_yaml_reports_format_only() {
        let err = parse("a: [1, 2\nb: : :").expect_err("must fail");
        assert_eq!(err.to_string(), "Cannot parse yaml");
    }

    #[test]
    fn scalar_root_is_rejected() {
        let err = parse("just a string").expect_err("must fail");
        assert!(matches!(err, CodecError::Parse(Format::Yaml)));
    }

    #[test]
    fn serialize_json_is_pretty() {
        let (doc, _) = parse(r#"{"a":{"b":"c"}}"#).unwrap();
        let text = serialize(&doc, Format::Json).unwrap();
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": \"c\"\n  }\n}\n");
    }

    #[test]
    fn serialize_preserves_key_order() {
        let (doc, _) = parse(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let text = serialize(&doc, Format::Json).unwrap();
        let z = text.find("\"z\"").unwrap();
        let a = text.find("\"a\"").unwrap();
        let m = text.find("\"m\"").unwrap();
        assert!(z < a && a < m);
    }

    #[test]
    fn format_from_str() {
        assert_eq!(Format::from_str("yml").unwrap(), Format::Yaml);
        assert!(Format::from_str("toml").is_err());
    }
}
