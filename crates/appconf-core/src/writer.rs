use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::codec::{self, Format, StructuredDocument};
use crate::conflict::{ConflictDecision, ConflictResolver, Prompter, WritePolicy};
use crate::constants::{FLAT_FILE, STRUCTURED_FILE};
use crate::flat::FlatDocument;
use crate::merge::{self, DocumentKind};

/// What happened to one destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    Created,
    Overwritten,
    Merged,
    Skipped,
}

impl WriteOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Overwritten => "overwritten",
            Self::Merged => "merged",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub structured: WriteOutcome,
    pub flat: WriteOutcome,
}

/// Persists the structured/flat file pair under one directory.
pub struct ConfigWriter<'a> {
    target_dir: PathBuf,
    resolver: ConflictResolver<'a>,
}

impl<'a> ConfigWriter<'a> {
    pub fn new(
        target_dir: impl Into<PathBuf>,
        policy: WritePolicy,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            target_dir: target_dir.into(),
            resolver: ConflictResolver::new(policy, prompter),
        }
    }

    pub fn structured_path(&self) -> PathBuf {
        self.target_dir.join(STRUCTURED_FILE)
    }

    pub fn flat_path(&self) -> PathBuf {
        self.target_dir.join(FLAT_FILE)
    }

    /// Writes both files. Each one is resolved on its own, so aborting one
    /// does not prevent the other from being written.
    pub fn write(
        &mut self,
        structured: &StructuredDocument,
        flat: &FlatDocument,
    ) -> Result<WriteReport> {
        let structured = self.write_structured(structured)?;
        let flat = self.write_flat(flat)?;
        Ok(WriteReport { structured, flat })
    }

    pub fn write_structured(&mut self, doc: &StructuredDocument) -> Result<WriteOutcome> {
        let content = codec::serialize(doc, Format::Json)?;
        let path = self.structured_path();
        self.write_file(&path, &content, DocumentKind::Structured)
    }

    pub fn write_flat(&mut self, doc: &FlatDocument) -> Result<WriteOutcome> {
        let content = doc.render();
        let path = self.flat_path();
        self.write_file(&path, &content, DocumentKind::Flat)
    }

    #[instrument(skip(self, content))]
    fn write_file(
        &mut self,
        path: &Path,
        content: &str,
        kind: DocumentKind,
    ) -> Result<WriteOutcome> {
        let outcome = match self.resolver.resolve(path)? {
            Some(ConflictDecision::Abort) => {
                info!("left {} unchanged", path.display());
                return Ok(WriteOutcome::Skipped);
            }
            Some(ConflictDecision::Merge) => {
                let existing = fs::read_to_string(path)
                    .with_context(|| format!("failed to read '{}'", path.display()))?;
                let merged = merge::merge(&existing, content, kind)
                    .with_context(|| format!("failed to merge into '{}'", path.display()))?;
                write_atomic(path, &merged)?;
                WriteOutcome::Merged
            }
            Some(ConflictDecision::Overwrite) => {
                write_atomic(path, content)?;
                WriteOutcome::Overwritten
            }
            None => {
                create_new(path, content)?;
                WriteOutcome::Created
            }
        };
        debug!("{} {}", path.display(), outcome.as_str());
        Ok(outcome)
    }
}

/// Writes the document pair to the fixed file names under `target_dir`.
pub fn write(
    structured: &StructuredDocument,
    flat: &FlatDocument,
    target_dir: &Path,
    policy: WritePolicy,
    prompter: &mut dyn Prompter,
) -> Result<WriteReport> {
    ConfigWriter::new(target_dir, policy, prompter).write(structured, flat)
}

/// Replaces `path` with `content` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = stage(path, content)?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

/// Creates `path` with `content`, failing if it already exists.
pub fn create_new(path: &Path, content: &str) -> Result<()> {
    let tmp = stage(path, content)?;
    tmp.persist_noclobber(path)
        .map_err(|e| e.error)
        .with_context(|| format!("refusing to overwrite '{}'", path.display()))?;
    Ok(())
}

fn stage(path: &Path, content: &str) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory '{}'", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to stage write in '{}'", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .with_context(|| format!("failed to stage write for '{}'", path.display()))?;
    Ok(tmp)
}

/// Loads the structured file from `dir`; a missing file is an empty document.
pub fn read_structured(dir: &Path) -> Result<StructuredDocument> {
    let path = dir.join(STRUCTURED_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => {
            let (doc, _) = codec::parse(&text)
                .with_context(|| format!("failed to load '{}'", path.display()))?;
            Ok(doc)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(StructuredDocument::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read '{}'", path.display())),
    }
}

/// Loads the flat file from `dir`; a missing file is an empty document.
pub fn read_flat(dir: &Path) -> Result<FlatDocument> {
    let path = dir.join(FLAT_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(FlatDocument::parse(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(FlatDocument::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read '{}'", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::NoPrompt;
    use anyhow::anyhow;
    use serde_json::{json, Value};

    fn structured(value: Value) -> StructuredDocument {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn flat(pairs: &[(&str, &str)]) -> FlatDocument {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn fresh_directory_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = write(
            &structured(json!({"project": {"name": "demo"}})),
            &flat(&[("AIO_runtime_auth", "s3cret")]),
            dir.path(),
            WritePolicy::default(),
            &mut NoPrompt,
        )
        .unwrap();

        assert_eq!(report.structured, WriteOutcome::Created);
        assert_eq!(report.flat, WriteOutcome::Created);
        let aio = fs::read_to_string(dir.path().join(".aio")).unwrap();
        assert_eq!(aio, "{\n  \"project\": {\n    \"name\": \"demo\"\n  }\n}\n");
        let env = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert_eq!(env, "AIO_runtime_auth=s3cret\n");
    }

    #[test]
    fn existing_file_without_decision_is_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "KEEP=1\n").unwrap();

        let err = write(
            &structured(json!({})),
            &flat(&[("A", "b")]),
            dir.path(),
            WritePolicy::default(),
            &mut NoPrompt,
        )
        .unwrap_err();

        let io = err.downcast_ref::<std::io::Error>().expect("io error source");
        assert_eq!(io.kind(), ErrorKind::AlreadyExists);
        assert_eq!(
            fs::read_to_string(dir.path().join(".env")).unwrap(),
            "KEEP=1\n"
        );
    }

    #[test]
    fn abort_leaves_bytes_unchanged_and_other_file_proceeds() {
        let dir = tempfile::tempdir().unwrap();
        let original = "{ \"mine\": true, }";
        fs::write(dir.path().join(".aio"), original).unwrap();
        fs::write(dir.path().join(".env"), "OLD=1\n").unwrap();

        let mut answers = vec![2usize, 1usize].into_iter();
        let mut prompter = |_: &str, _: &[&str]| -> anyhow::Result<usize> {
            answers.next().ok_or_else(|| anyhow!("asked too often"))
        };
        let report = write(
            &structured(json!({"project": {}})),
            &flat(&[("NEW", "2")]),
            dir.path(),
            WritePolicy::interactive(),
            &mut prompter,
        )
        .unwrap();

        assert_eq!(report.structured, WriteOutcome::Skipped);
        assert_eq!(report.flat, WriteOutcome::Overwritten);
        assert_eq!(fs::read_to_string(dir.path().join(".aio")).unwrap(), original);
        assert_eq!(fs::read_to_string(dir.path().join(".env")).unwrap(), "NEW=2\n");
    }

    #[test]
    fn merge_policy_merges_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".aio"), "{\"a\": \"1\", \"b\": \"2\"}").unwrap();
        fs::write(dir.path().join(".env"), "# mine\nUSER=me\nA=old\n").unwrap();

        let report = write(
            &structured(json!({"b": "3", "c": "4"})),
            &flat(&[("A", "new")]),
            dir.path(),
            WritePolicy::merge(),
            &mut NoPrompt,
        )
        .unwrap();

        assert_eq!(report.structured, WriteOutcome::Merged);
        assert_eq!(report.flat, WriteOutcome::Merged);
        assert_eq!(
            Value::Object(read_structured(dir.path()).unwrap()),
            json!({"a": "1", "b": "3", "c": "4"})
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(".env")).unwrap(),
            "# mine\nUSER=me\nA=new\n"
        );
    }

    #[test]
    fn merge_policy_on_missing_file_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = NoPrompt;
        let mut writer = ConfigWriter::new(dir.path(), WritePolicy::merge(), &mut prompter);
        let outcome = writer.write_flat(&flat(&[("A", "1")])).unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
    }

    #[test]
    fn readers_treat_missing_files_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_structured(dir.path()).unwrap().is_empty());
        assert!(read_flat(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
