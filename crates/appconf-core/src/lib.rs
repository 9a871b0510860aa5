//! Core document handling for appconf.
//!
//! This crate parses and serializes structured configuration, flattens it
//! into `KEY=value` form, merges new content into existing files and writes
//! the `.aio`/`.env` pair with conflict-aware semantics.

pub mod codec;
pub mod config;
pub mod conflict;
pub mod constants;
pub mod flat;
pub mod flatten;
pub mod merge;
pub mod writer;

pub use codec::{CodecError, Format, StructuredDocument};
pub use config::{AppconfSettings, SettingKind};
pub use conflict::{ConflictDecision, ConflictResolver, NoPrompt, Prompter, WritePolicy};
pub use flat::FlatDocument;
pub use flatten::{flatten, unflatten_key, FlattenError};
pub use merge::{merge, DocumentKind};
pub use writer::{ConfigWriter, WriteOutcome, WriteReport};
