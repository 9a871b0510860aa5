//! Workspace payload import for appconf.
//!
//! Selects the active credential, reduces every credential to a secret-free
//! reference and produces the structured/flat document pair.

pub mod credentials;
pub mod workspace;

pub use credentials::{
    select_active, to_references, AuthFlavor, Credential, CredentialEntry, CredentialKind,
    CredentialReference,
};
pub use workspace::{import_and_write, import_text, import_workspace, ImportOptions, ImportedConfig};
