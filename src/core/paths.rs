// src/core/paths.rs

use crate::constants::{APP_DIR, SETTINGS_ENV_VAR, SETTINGS_FILENAME};
use anyhow::{Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
}

/// Returns `<config_dir>/siteshell` without creating it.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(PathError::ConfigDirNotFound)
}

/// Location of the settings file: `$SITESHELL_CONFIG`, else the config directory.
pub fn get_settings_path() -> Result<PathBuf, PathError> {
    if let Ok(explicit) = env::var(SETTINGS_ENV_VAR)
        && !explicit.trim().is_empty()
    {
        return Ok(expand_path(&explicit).unwrap_or_else(|_| PathBuf::from(explicit)));
    }
    get_config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", raw, e))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Splits an `alias-path` value. Semicolons always separate entries; colons do too
/// except on Windows, where they belong to drive letters.
pub fn split_alias_path(raw: &str) -> Vec<String> {
    let separators: &[char] = if cfg!(target_os = "windows") {
        &[';']
    } else {
        &[';', ':']
    };
    raw.split(separators)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// The fixed alias locations, highest precedence first. Each one is its own tier.
pub fn default_alias_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if !cfg!(target_os = "windows") {
        locations.push(PathBuf::from("/etc").join(APP_DIR));
    }

    if let Ok(exe) = env::current_exe()
        && let Some(install_dir) = exe.parent()
    {
        locations.push(install_dir.to_path_buf());
        locations.push(install_dir.join("aliases"));
    }

    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(format!(".{}", APP_DIR)));
    }

    if let Ok(config_dir) = get_config_dir() {
        locations.push(config_dir);
    }

    locations
}

/// Alias locations that belong to a bootstrapped site root.
pub fn site_alias_locations(root: &Path) -> Vec<PathBuf> {
    let mut locations = vec![
        root.join("drush").join("sites"),
        root.join("sites").join("all").join("drush"),
    ];
    if let Some(parent) = root.parent() {
        locations.push(parent.join("drush").join("sites"));
    }
    locations
}

/// Whether `dir` is the root of a Drupal installation.
pub fn is_site_root(dir: &Path) -> bool {
    dir.join("core").join("lib").join("Drupal.php").is_file()
        || dir.join("includes").join("bootstrap.inc").is_file()
}

/// Walks up from `start` looking for a site root. A `web/` or `docroot/`
/// subdirectory of a project is also recognised.
pub fn find_site_root(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if is_site_root(dir) {
            return Some(dunce::simplified(dir).to_path_buf());
        }
        for nested in ["web", "docroot"] {
            let candidate = dir.join(nested);
            if is_site_root(&candidate) {
                return Some(dunce::simplified(&candidate).to_path_buf());
            }
        }
    }
    None
}
