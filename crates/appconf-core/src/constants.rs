//! Constants used across the appconf workspace.

/// The filename for the structured (secret-free) project configuration.
pub const STRUCTURED_FILE: &str = ".aio";

/// The filename for the flat `KEY=value` secrets file.
pub const FLAT_FILE: &str = ".env";

/// The filename for the tool's own settings.
pub const SETTINGS_FILE: &str = "appconf.toml";

/// Namespace prefix and separator for flattened keys.
pub const FLAT_PREFIX: &str = "AIO_";
pub const FLAT_SEPARATOR: &str = "_";

/// Build output directory holding generated state such as checksums.
pub const DIST_DIR: &str = "dist";
