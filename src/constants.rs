// src/constants.rs

/// Name of the directory used for siteshell configuration and aliases.
pub const APP_DIR: &str = "siteshell";

/// The name of the global configuration file (inside the config directory).
pub const SETTINGS_FILENAME: &str = "siteshell.toml";

/// Environment variable that overrides the location of the settings file.
pub const SETTINGS_ENV_VAR: &str = "SITESHELL_CONFIG";

/// A file holding several ungrouped aliases, one top-level table each.
pub const ALIASES_FILENAME: &str = "aliases.toml";

/// Suffix of a group file: `GROUP.aliases.toml`.
pub const GROUP_FILE_SUFFIX: &str = ".aliases.toml";

/// Suffix of a single-alias file: `NAME.alias.toml`.
pub const SINGLE_FILE_SUFFIX: &str = ".alias.toml";

/// How deep alias directories are scanned.
pub const MAX_ALIAS_SCAN_DEPTH: usize = 4;

/// Guard for parent chains and path token expansion.
pub const MAX_RECURSION_DEPTH: usize = 32;

/// Used when neither the record nor the settings name ssh options.
pub const DEFAULT_SSH_OPTIONS: &str = "-o PasswordAuthentication=no";

/// Program used to open remote connections.
pub const DEFAULT_SSH_BINARY: &str = "ssh";

/// Program used for file transfers.
pub const DEFAULT_RSYNC_BINARY: &str = "rsync";

/// Flags passed to rsync when no `mode` option is set.
pub const DEFAULT_RSYNC_MODE: &str = "akz";

/// Script executed on the remote host when `%drush-script` is not set.
pub const DEFAULT_REMOTE_SCRIPT: &str = "drush";

/// Files directory of a site relative to its root, unless `%files` overrides it.
pub const DEFAULT_FILES_PATH: &str = "%root/sites/default/files";

/// Flag that asks a dispatched process to answer with a JSON payload.
pub const BACKEND_FLAG: &str = "--backend";

/// `error_status` used when a call fails without a more specific code.
pub const GENERIC_ERROR_STATUS: i32 = 1;
