use serde_json::{Map, Value};

/// A single-level `KEY=value` document, plus comment lines that precede the entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatDocument {
    comments: Vec<String>,
    entries: Map<String, Value>,
}

impl FlatDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry. Leaves are stored unconverted; see [`render_value`].
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns the rendered string form of an entry.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(render_value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads an existing flat file. Values are kept verbatim as strings.
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::new();
        for line in text.lines() {
            match classify(line) {
                Line::Comment(comment) => doc.push_comment(comment),
                Line::Pair(key, value) => {
                    doc.insert(key, Value::String(value.to_string()));
                }
                Line::Blank | Line::Invalid(_) => {}
            }
        }
        doc
    }

    /// Renders the document as `KEY=value` lines with one trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for comment in &self.comments {
            out.push_str(comment);
            out.push('\n');
        }
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(&render_value(value));
            out.push('\n');
        }
        out
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FlatDocument {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut doc = Self::new();
        for (key, value) in iter {
            doc.insert(key, value);
        }
        doc
    }
}

/// Stringifies a flat leaf: strings verbatim, null as empty, everything else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One line of a flat file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Comment(&'a str),
    Blank,
    /// Split on the first `=`; later `=` belong to the value. Both sides are trimmed.
    Pair(&'a str, &'a str),
    /// Neither a comment nor an assignment.
    Invalid(&'a str),
}

pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if trimmed.starts_with('#') {
        return Line::Comment(trimmed);
    }
    match line.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Line::Pair(key.trim(), value.trim()),
        _ => Line::Invalid(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_lines() {
        assert_eq!(classify("# hi"), Line::Comment("# hi"));
        assert_eq!(classify("   "), Line::Blank);
        assert_eq!(classify("A=b=c"), Line::Pair("A", "b=c"));
        assert_eq!(classify("A="), Line::Pair("A", ""));
        assert_eq!(classify("  A =  b c \t"), Line::Pair("A", "b c"));
        assert_eq!(classify("A= x=y "), Line::Pair("A", "x=y"));
        assert_eq!(classify("=oops"), Line::Invalid("=oops"));
        assert_eq!(classify("novalue"), Line::Invalid("novalue"));
    }

    #[test]
    fn renders_leaves() {
        let doc: FlatDocument = [
            ("S", json!("text")),
            ("N", json!(3)),
            ("B", json!(true)),
            ("Z", Value::Null),
            ("A", json!(["x", 1])),
        ]
        .into_iter()
        .collect();
        assert_eq!(doc.render(), "S=text\nN=3\nB=true\nZ=\nA=[\"x\",1]\n");
    }

    #[test]
    fn parse_keeps_comments_and_values() {
        let doc = FlatDocument::parse("# header\n\nA=1\nB=x=y\n");
        assert_eq!(doc.comments(), ["# header".to_string()]);
        assert_eq!(doc.get_str("A").as_deref(), Some("1"));
        assert_eq!(doc.get_str("B").as_deref(), Some("x=y"));
        assert_eq!(doc.len(), 2);
    }
}
