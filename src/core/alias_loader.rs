//! # Alias Loader
//!
//! Discovers alias files along a tiered search path and turns them into an
//! [`AliasIndex`]: every alias name mapped to the definitions that declare it, in
//! discovery order.
//!
//! Three file shapes are recognised:
//!
//! - `aliases.toml`: every top-level table is one alias, `@name`.
//! - `GROUP.aliases.toml`: every top-level table is one alias, reachable as
//!   `@GROUP.name` and `@name`. `@GROUP` itself is an implicit site list of all
//!   members in declaration order.
//! - `NAME.alias.toml`: the whole file is the single alias `@NAME`.
//!
//! Earlier tiers shadow later ones. Two files of the same tier declaring the same
//! name are reported according to the [`DuplicatePolicy`].

use crate::constants::{
    ALIASES_FILENAME, GROUP_FILE_SUFFIX, MAX_ALIAS_SCAN_DEPTH, SINGLE_FILE_SUFFIX,
};
use crate::core::alias_resolver::AliasError;
use crate::core::cache::{self, Fingerprint};
use crate::core::paths;
use crate::core::token::{parse_token, parse_token_list};
use crate::models::{AliasDefinition, AliasToken};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What to do when one tier declares the same alias in two files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Refuse to pick and report `AliasError::Ambiguous`.
    #[default]
    Error,
    /// Take the file found first (configuration order, then file name order).
    First,
}

/// A group of locations with equal precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTier {
    pub label: String,
    pub locations: Vec<PathBuf>,
}

/// The ordered tiers an alias is looked up in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    tiers: Vec<SearchTier>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tier; empty tiers are ignored.
    pub fn push_tier(&mut self, label: impl Into<String>, locations: Vec<PathBuf>) {
        if locations.is_empty() {
            return;
        }
        self.tiers.push(SearchTier {
            label: label.into(),
            locations,
        });
    }

    /// The standard search path: the explicit `alias-path` entries as one tier, then
    /// every default location as its own tier, then the bootstrapped site's
    /// directories.
    pub fn standard(explicit: &[String], site_root: Option<&Path>) -> Self {
        let mut search_path = Self::new();

        let explicit_locations = explicit
            .iter()
            .map(|raw| paths::expand_path(raw).unwrap_or_else(|_| PathBuf::from(raw)))
            .collect();
        search_path.push_tier("alias-path", explicit_locations);

        for location in paths::default_alias_locations() {
            let label = location.display().to_string();
            search_path.push_tier(label, vec![location]);
        }

        if let Some(root) = site_root {
            search_path.push_tier("site", paths::site_alias_locations(root));
        }

        search_path
    }

    pub fn tiers(&self) -> &[SearchTier] {
        &self.tiers
    }

    /// Finds every alias file on the path and computes the search path fingerprint.
    pub fn discover(&self) -> (Vec<DiscoveredFile>, String) {
        let mut fingerprint = Fingerprint::new();
        let mut files = Vec::new();

        for (tier, search_tier) in self.tiers.iter().enumerate() {
            for location in &search_tier.locations {
                fingerprint.add_location(location);

                if location.is_file() {
                    if classify(location).is_some() {
                        fingerprint.add_file(location);
                        files.push(DiscoveredFile {
                            path: location.clone(),
                            tier,
                        });
                    }
                    continue;
                }
                if !location.is_dir() {
                    continue;
                }

                for entry in WalkDir::new(location)
                    .max_depth(MAX_ALIAS_SCAN_DEPTH)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    let path = entry.path();
                    if entry.file_type().is_file() && classify(path).is_some() {
                        fingerprint.add_file(path);
                        files.push(DiscoveredFile {
                            path: path.to_path_buf(),
                            tier,
                        });
                    }
                }
            }
        }

        (files, fingerprint.finish())
    }
}

/// An alias file found on the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub tier: usize,
}

/// The kind of alias file, derived from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileKind {
    Ungrouped,
    Group(String),
    Single(String),
}

fn classify(path: &Path) -> Option<FileKind> {
    let file_name = path.file_name()?.to_str()?;
    if file_name == ALIASES_FILENAME {
        return Some(FileKind::Ungrouped);
    }
    if let Some(group) = file_name.strip_suffix(GROUP_FILE_SUFFIX)
        && !group.is_empty()
    {
        return Some(FileKind::Group(group.to_string()));
    }
    if let Some(name) = file_name.strip_suffix(SINGLE_FILE_SUFFIX)
        && !name.is_empty()
    {
        return Some(FileKind::Single(name.to_string()));
    }
    None
}

/// One definition and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasEntry {
    pub definition: AliasDefinition,
    pub file: PathBuf,
    pub tier: usize,
}

/// All alias definitions on a search path, keyed by `name` or `group.name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasIndex {
    entries: BTreeMap<String, Vec<AliasEntry>>,
}

impl AliasIndex {
    /// Loads every discovered file. A file that cannot be read or parsed aborts the load.
    pub fn load(files: &[DiscoveredFile]) -> Result<Self, AliasError> {
        let mut index = Self::default();
        for file in files {
            log::debug!(
                "Loading alias file '{}' (tier {}, modified {:?})",
                file.path.display(),
                file.tier,
                cache::modified_time(&file.path)
            );
            index.load_file(file)?;
        }
        Ok(index)
    }

    fn load_file(&mut self, file: &DiscoveredFile) -> Result<(), AliasError> {
        let Some(kind) = classify(&file.path) else {
            return Ok(());
        };
        let content = fs::read_to_string(&file.path)?;
        let table: Map<String, Value> =
            toml::from_str(&content).map_err(|e| AliasError::TomlParse {
                path: file.path.display().to_string(),
                source: e,
            })?;

        match kind {
            FileKind::Single(name) => {
                validate_name(&name, &file.path)?;
                let definition = definition_from_map(&name, table, &file.path)?;
                self.insert(name, definition, file);
            }
            FileKind::Ungrouped => {
                for (name, value) in table {
                    let options = expect_table(&name, value, &file.path)?;
                    validate_name(&name, &file.path)?;
                    let definition = definition_from_map(&name, options, &file.path)?;
                    self.insert(name, definition, file);
                }
            }
            FileKind::Group(group) => {
                validate_name(&group, &file.path)?;
                let mut members = Vec::new();
                for (name, value) in table {
                    let options = expect_table(&name, value, &file.path)?;
                    validate_name(&name, &file.path)?;
                    let definition = definition_from_map(&name, options, &file.path)?;
                    members.push(AliasToken::new(Some(&group), &name));
                    self.insert(format!("{}.{}", group, name), definition.clone(), file);
                    self.insert(name, definition, file);
                }
                self.insert(group, AliasDefinition::SiteList { members }, file);
            }
        }
        Ok(())
    }

    fn insert(&mut self, key: String, definition: AliasDefinition, file: &DiscoveredFile) {
        self.entries.entry(key).or_default().push(AliasEntry {
            definition,
            file: file.path.clone(),
            tier: file.tier,
        });
    }

    /// Finds the definition that wins for `key`.
    ///
    /// The first tier declaring the name wins. If that tier declares it in more than
    /// one file, `policy` decides.
    pub fn lookup(
        &self,
        key: &str,
        policy: DuplicatePolicy,
    ) -> Result<Option<&AliasEntry>, AliasError> {
        let Some(candidates) = self.entries.get(key) else {
            return Ok(None);
        };
        let Some(winner) = candidates.first() else {
            return Ok(None);
        };

        let mut rival_files: Vec<&Path> = Vec::new();
        for candidate in candidates.iter().filter(|c| c.tier == winner.tier) {
            if !rival_files.contains(&candidate.file.as_path()) {
                rival_files.push(&candidate.file);
            }
        }

        if rival_files.len() > 1 {
            match policy {
                DuplicatePolicy::Error => {
                    return Err(AliasError::Ambiguous {
                        name: format!("@{}", key),
                        files: rival_files
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
                DuplicatePolicy::First => {
                    log::debug!(
                        "Alias '@{}' is declared in {} files of one tier; using '{}'.",
                        key,
                        rival_files.len(),
                        winner.file.display()
                    );
                }
            }
        }

        if candidates.len() > 1 {
            log::trace!(
                "Alias '@{}' shadowed {} later definition(s).",
                key,
                candidates.len() - 1
            );
        }
        Ok(Some(winner))
    }

    /// Every known alias name, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_name(name: &str, file: &Path) -> Result<(), AliasError> {
    parse_token(&format!("@{}", name)).map(|_| ()).map_err(|_| {
        AliasError::InvalidDefinition {
            name: name.to_string(),
            message: format!("invalid alias name in '{}'", file.display()),
        }
    })
}

fn expect_table(name: &str, value: Value, file: &Path) -> Result<Map<String, Value>, AliasError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AliasError::InvalidDefinition {
            name: name.to_string(),
            message: format!("expected a table in '{}'", file.display()),
        }),
    }
}

/// Splits the structural keys (`parent`, `site-list`) from the options of one alias.
fn definition_from_map(
    name: &str,
    mut options: Map<String, Value>,
    file: &Path,
) -> Result<AliasDefinition, AliasError> {
    let invalid = |message: String| AliasError::InvalidDefinition {
        name: name.to_string(),
        message: format!("{} in '{}'", message, file.display()),
    };

    if let Some(list) = options.remove("site-list") {
        let members = token_list_from_value(&list)
            .ok_or_else(|| invalid("'site-list' must be a string or a list of strings".into()))??;
        if !options.is_empty() {
            log::warn!(
                "Alias '@{}' has a site-list; its other keys are ignored.",
                name
            );
        }
        return Ok(AliasDefinition::SiteList { members });
    }

    let parents = match options.remove("parent") {
        Some(value) => token_list_from_value(&value)
            .ok_or_else(|| invalid("'parent' must be a string or a list of strings".into()))??,
        None => Vec::new(),
    };

    Ok(AliasDefinition::Site { options, parents })
}

/// `"@a,@b"` or `["@a", "@b"]`. `None` when the value has another shape.
fn token_list_from_value(value: &Value) -> Option<Result<Vec<AliasToken>, AliasError>> {
    match value {
        Value::String(s) => Some(parse_token_list(s)),
        Value::Array(items) => {
            let mut joined = Vec::with_capacity(items.len());
            for item in items {
                joined.push(item.as_str()?);
            }
            Some(parse_token_list(&joined.join(",")))
        }
        _ => None,
    }
}
