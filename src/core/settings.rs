// src/core/settings.rs

use crate::core::alias_loader::DuplicatePolicy;
use crate::core::dispatch::DispatchSettings;
use crate::core::paths::{self, PathError};
use crate::constants::{DEFAULT_REMOTE_SCRIPT, DEFAULT_SSH_BINARY};
use crate::models::OptionMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing TOML in '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Path(#[from] PathError),
}

/// `alias-path` may be a single separated string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AliasPathSetting {
    Joined(String),
    List(Vec<String>),
}

impl Default for AliasPathSetting {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl AliasPathSetting {
    pub fn entries(&self) -> Vec<String> {
        match self {
            Self::Joined(raw) => paths::split_alias_path(raw),
            Self::List(list) => list.iter().flat_map(|raw| paths::split_alias_path(raw)).collect(),
        }
    }
}

/// Contents of `siteshell.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    pub alias_path: AliasPathSetting,
    pub duplicate_aliases: DuplicatePolicy,
    pub ssh_binary: Option<String>,
    pub ssh_options: Option<String>,
    pub rsync_binary: Option<String>,
    pub remote_script: Option<String>,
    /// Wall-clock limit for remote invocations, in seconds.
    pub timeout: Option<u64>,
    /// Browser command for `browse`; `false` or `"0"` prints the URL only.
    pub browser: Option<Value>,
    pub options: OptionMap,
    pub command_specific: BTreeMap<String, OptionMap>,
}

impl Settings {
    /// Loads settings from `explicit`, else from the default location. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), SettingsError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (paths::get_settings_path()?, false),
        };

        if !required && !path.exists() {
            log::debug!("No settings file at '{}'; using defaults", path.display());
            return Ok((Self::default(), None));
        }

        let settings = Self::from_file(&path)?;
        Ok((settings, Some(path)))
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::TomlParse {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            ssh_binary: self
                .ssh_binary
                .clone()
                .unwrap_or_else(|| DEFAULT_SSH_BINARY.to_string()),
            ssh_options: self.ssh_options.clone(),
            remote_script: self
                .remote_script
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_SCRIPT.to_string()),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_full_settings_file() {
        let content = r#"
alias-path = "/a;/b"
duplicate-aliases = "first"
ssh-options = "-F /etc/ssh/alt"
remote-script = "/usr/local/bin/drush"
timeout = 30
browser = "firefox"

[options]
verbose = true

[command-specific.sql-sync]
no-cache = true
"#;
        let settings = Settings::from_toml(content, Path::new("siteshell.toml")).unwrap();
        assert_eq!(settings.alias_path.entries(), vec!["/a", "/b"]);
        assert_eq!(settings.duplicate_aliases, DuplicatePolicy::First);
        assert_eq!(settings.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.options.get("verbose"), Some(&json!(true)));
        assert_eq!(
            settings.command_specific["sql-sync"].get("no-cache"),
            Some(&json!(true))
        );

        let dispatch = settings.dispatch_settings();
        assert_eq!(dispatch.ssh_binary, "ssh");
        assert_eq!(dispatch.remote_script, "/usr/local/bin/drush");
        assert_eq!(dispatch.ssh_options.as_deref(), Some("-F /etc/ssh/alt"));
    }

    #[test]
    fn test_alias_path_as_list_and_empty_defaults() {
        let settings = Settings::from_toml("alias-path = ['/x', '/y']\ntimeout = 0\n", Path::new("s.toml")).unwrap();
        assert_eq!(settings.alias_path.entries(), vec!["/x", "/y"]);
        assert_eq!(settings.timeout(), None);
        assert_eq!(settings.duplicate_aliases, DuplicatePolicy::Error);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ssh-binary = '/opt/ssh'").unwrap();
        file.flush().unwrap();

        let (settings, path) = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.ssh_binary.as_deref(), Some("/opt/ssh"));
        assert_eq!(path.as_deref(), Some(file.path()));

        assert!(matches!(
            Settings::load(Some(Path::new("/definitely/missing.toml"))),
            Err(SettingsError::Read { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        assert!(matches!(
            Settings::from_toml("timeout = 'soon'", Path::new("bad.toml")),
            Err(SettingsError::TomlParse { .. })
        ));
    }
}
