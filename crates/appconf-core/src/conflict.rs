use std::path::Path;

use anyhow::{bail, Result};
use tracing::{debug, instrument};

/// How an existing destination file is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictDecision {
    Overwrite,
    Merge,
    /// Leave the file untouched. Not an error.
    Abort,
}

impl ConflictDecision {
    /// Choices offered by the interactive prompt, in display order.
    pub const CHOICES: [ConflictDecision; 3] = [Self::Merge, Self::Overwrite, Self::Abort];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Merge => "merge",
            Self::Abort => "abort",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Overwrite => "Overwrite",
            Self::Merge => "Merge",
            Self::Abort => "Abort",
        }
    }
}

/// Caller-selected handling for destinations that already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritePolicy {
    pub overwrite: bool,
    pub merge: bool,
    pub interactive: bool,
}

impl WritePolicy {
    pub fn merge() -> Self {
        Self {
            merge: true,
            ..Self::default()
        }
    }

    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    /// The decision implied by flags alone. `merge` takes precedence over `overwrite`.
    pub fn explicit_decision(&self) -> Option<ConflictDecision> {
        if self.merge {
            Some(ConflictDecision::Merge)
        } else if self.overwrite {
            Some(ConflictDecision::Overwrite)
        } else {
            None
        }
    }
}

/// Presents a single-choice question and returns the index of the chosen option.
pub trait Prompter {
    fn choose_one(&mut self, message: &str, options: &[&str]) -> Result<usize>;
}

impl<F> Prompter for F
where
    F: FnMut(&str, &[&str]) -> Result<usize>,
{
    fn choose_one(&mut self, message: &str, options: &[&str]) -> Result<usize> {
        self(message, options)
    }
}

/// A prompter for non-interactive runs; any attempt to ask is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn choose_one(&mut self, message: &str, _options: &[&str]) -> Result<usize> {
        bail!("cannot ask '{message}' without an interactive terminal")
    }
}

/// Decides how to treat an existing destination.
pub struct ConflictResolver<'a> {
    policy: WritePolicy,
    prompter: &'a mut dyn Prompter,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(policy: WritePolicy, prompter: &'a mut dyn Prompter) -> Self {
        Self { policy, prompter }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Returns `None` when no explicit decision applies: either the
    /// destination does not exist yet, or the policy is non-interactive
    /// without flags, in which case the write must not clobber anything.
    #[instrument(skip(self))]
    pub fn resolve(&mut self, destination: &Path) -> Result<Option<ConflictDecision>> {
        if !destination.exists() {
            debug!("{} does not exist, fresh write", destination.display());
            return Ok(None);
        }

        if let Some(decision) = self.policy.explicit_decision() {
            debug!("using flag decision '{}'", decision.as_str());
            return Ok(Some(decision));
        }

        if !self.policy.interactive {
            return Ok(None);
        }

        let labels = ConflictDecision::CHOICES.map(ConflictDecision::label);
        let message = format!(
            "{} already exists. Merge, overwrite or abort?",
            destination.display()
        );
        let index = self.prompter.choose_one(&message, &labels)?;
        match ConflictDecision::CHOICES.get(index) {
            Some(decision) => {
                debug!("user chose '{}'", decision.as_str());
                Ok(Some(*decision))
            }
            None => bail!("invalid choice {index} for '{}'", destination.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "A=1\n").unwrap();
        (dir, path)
    }

    #[test]
    fn missing_destination_needs_no_decision() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompter = NoPrompt;
        let mut resolver = ConflictResolver::new(WritePolicy::interactive(), &mut prompter);
        let decision = resolver.resolve(&dir.path().join("absent")).unwrap();
        assert_eq!(decision, None);
    }

    #[test]
    fn flags_are_honored_without_prompting() {
        let (_dir, path) = existing_file();
        let mut prompter = NoPrompt;
        let policy = WritePolicy {
            overwrite: true,
            interactive: true,
            ..WritePolicy::default()
        };
        let mut resolver = ConflictResolver::new(policy, &mut prompter);
        assert_eq!(
            resolver.resolve(&path).unwrap(),
            Some(ConflictDecision::Overwrite)
        );
    }

    #[test]
    fn merge_flag_beats_overwrite_flag() {
        let policy = WritePolicy {
            overwrite: true,
            merge: true,
            interactive: false,
        };
        assert_eq!(policy.explicit_decision(), Some(ConflictDecision::Merge));
    }

    #[test]
    fn interactive_choice_maps_to_decision() {
        let (_dir, path) = existing_file();
        let mut asked = Vec::new();
        let mut prompter = |message: &str, options: &[&str]| -> Result<usize> {
            asked.push(message.to_string());
            assert_eq!(options, ["Merge", "Overwrite", "Abort"]);
            Ok(2)
        };
        let mut resolver = ConflictResolver::new(WritePolicy::interactive(), &mut prompter);
        assert_eq!(resolver.resolve(&path).unwrap(), Some(ConflictDecision::Abort));
        drop(resolver);
        assert_eq!(asked.len(), 1);
        assert!(asked[0].contains("already exists"));
    }

    #[test]
    fn out_of_range_choice_is_an_error() {
        let (_dir, path) = existing_file();
        let mut prompter = |_: &str, _: &[&str]| -> Result<usize> { Ok(7) };
        let mut resolver = ConflictResolver::new(WritePolicy::interactive(), &mut prompter);
        assert!(resolver.resolve(&path).is_err());
    }

    #[test]
    fn non_interactive_without_flags_defers_to_exclusive_create() {
        let (_dir, path) = existing_file();
        let mut prompter = NoPrompt;
        let mut resolver = ConflictResolver::new(WritePolicy::default(), &mut prompter);
        assert_eq!(resolver.resolve(&path).unwrap(), None);
    }
}
