//! Log forwarding reconciliation for appconf.
//!
//! Compares the destination declared in the project's structured file with
//! the one applied on the runtime service, hydrates secret settings from an
//! environment lookup and tracks the last applied state with a checksum.

pub mod checksum;
pub mod config;
pub mod error;
pub mod forwarding;
pub mod service;

pub use config::{secret_key, ForwardingConfig, DEFAULT_DESTINATION, IGNORED_SETTINGS};
pub use error::ForwardingError;
pub use forwarding::LogForwarding;
pub use service::{DestinationInfo, DestinationSetting, ForwardingService};
