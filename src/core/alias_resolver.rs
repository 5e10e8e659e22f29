//! # Alias Resolver
//!
//! Turns alias tokens into flattened [`SiteRecord`]s.
//!
//! A [`ResolverContext`] owns everything resolution needs across one process: the
//! search path, the loaded [`AliasIndex`] (reloaded whenever the search path
//! fingerprint changes), a per-token record cache and the `site-alias-alter` hook
//! registry.
//!
//! Parent chains are flattened depth-first. For `parent = "@a,@b"` the merge order
//! is `@a`, then `@b`, then the alias itself, so the child beats every parent and
//! a later parent beats an earlier one. Nested tables are merged key by key.

use crate::constants::MAX_RECURSION_DEPTH;
use crate::core::alias_loader::{AliasIndex, DuplicatePolicy, SearchPath};
use crate::core::hooks::{HookRegistry, SITE_ALIAS_ALTER};
use crate::core::token::parse_token;
use crate::models::{AliasDefinition, AliasToken, SiteRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AliasError {
    #[error("Malformed alias token '{0}'. Expected '@name' or '@group.name'.")]
    MalformedToken(String),
    #[error("Alias '{0}' was not found on the alias search path.")]
    NotFound(String),
    #[error("Circular parent chain detected: {}", .cycle.join(" -> "))]
    CyclicParent { cycle: Vec<String> },
    #[error("Alias '{name}' is defined more than once with the same precedence: {files}")]
    Ambiguous { name: String, files: String },
    #[error("Alias '{0}' names several sites and cannot be used as a single target.")]
    MultipleTargets(String),
    #[error("No site is bootstrapped. '@self' needs --root or a working directory inside a site.")]
    NotBootstrapped,
    #[error("Maximum parent depth ({depth}) exceeded while resolving '{name}'.")]
    MaxDepth { depth: usize, name: String },
    #[error("Invalid alias definition for '{name}': {message}")]
    InvalidDefinition { name: String, message: String },
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing TOML in '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

type AliasResult<T> = Result<T, AliasError>;

/// The site this process was started in, found from `--root` or the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSite {
    pub root: PathBuf,
    pub uri: String,
}

/// Resolution state for one process.
#[derive(Debug)]
pub struct ResolverContext {
    search_path: SearchPath,
    policy: DuplicatePolicy,
    bootstrap: Option<BootstrapSite>,
    hooks: HookRegistry,
    index: Option<(String, Arc<AliasIndex>)>,
    records: HashMap<(String, String), SiteRecord>,
}

impl ResolverContext {
    pub fn new(search_path: SearchPath, policy: DuplicatePolicy) -> Self {
        Self {
            search_path,
            policy,
            bootstrap: None,
            hooks: HookRegistry::new(),
            index: None,
            records: HashMap::new(),
        }
    }

    pub fn with_bootstrap(mut self, site: Option<BootstrapSite>) -> Self {
        self.bootstrap = site;
        self
    }

    pub fn bootstrap(&self) -> Option<&BootstrapSite> {
        self.bootstrap.as_ref()
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Parses and resolves a raw token.
    pub fn resolve_str(&mut self, raw: &str) -> AliasResult<SiteRecord> {
        let token = parse_token(raw)?;
        self.resolve(&token)
    }

    /// Resolves a single-target token to its flattened record.
    pub fn resolve(&mut self, token: &AliasToken) -> AliasResult<SiteRecord> {
        if token.is_none() {
            return Ok(SiteRecord::none());
        }
        if token.is_sites() {
            return Err(AliasError::MultipleTargets(token.to_string()));
        }
        if token.is_self() {
            return self.resolve_self();
        }
        self.resolve_named(token)
    }

    /// Resolves any token to the list of sites it stands for. Groups and site lists
    /// expand to their members, `@sites` to every site below the bootstrapped root.
    pub fn resolve_targets(&mut self, token: &AliasToken) -> AliasResult<Vec<SiteRecord>> {
        if token.is_sites() || token.is_self() || token.is_none() {
            return self.expand_special(token);
        }
        let (fingerprint, index) = self.current_index()?;
        let mut stack = Vec::new();
        self.expand_targets(token, &index, &fingerprint, &mut stack)
    }

    fn expand_special(&mut self, token: &AliasToken) -> AliasResult<Vec<SiteRecord>> {
        if token.is_sites() {
            let root = self
                .bootstrap
                .as_ref()
                .map(|site| site.root.clone())
                .ok_or(AliasError::NotBootstrapped)?;
            return self.resolve_all(&root);
        }
        Ok(vec![self.resolve(token)?])
    }

    fn expand_targets(
        &mut self,
        token: &AliasToken,
        index: &AliasIndex,
        fingerprint: &str,
        stack: &mut Vec<String>,
    ) -> AliasResult<Vec<SiteRecord>> {
        if token.is_sites() || token.is_self() || token.is_none() {
            return self.expand_special(token);
        }

        let label = token.to_string();
        check_stack(stack, &label)?;

        let entry = index
            .lookup(&token.key(), self.policy)?
            .ok_or_else(|| AliasError::NotFound(label.clone()))?;

        match &entry.definition {
            AliasDefinition::Site { .. } => Ok(vec![self.resolve_in(index, fingerprint, token)?]),
            AliasDefinition::SiteList { members } => {
                stack.push(label);
                let mut records = Vec::new();
                for member in members {
                    records.extend(self.expand_targets(member, index, fingerprint, stack)?);
                }
                stack.pop();
                Ok(records)
            }
        }
    }

    /// One record per `sites/<dir>/settings.php` below `root`, `sites/all` excluded,
    /// sorted by directory name.
    pub fn resolve_all(&self, root: &Path) -> AliasResult<Vec<SiteRecord>> {
        let sites_dir = root.join("sites");
        if !sites_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs: Vec<String> = fs::read_dir(&sites_dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join("settings.php").is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| name != "all")
            .collect();
        dirs.sort();

        let root_str = root.display().to_string();
        Ok(dirs
            .into_iter()
            .map(|dir| {
                let mut record = SiteRecord {
                    name: format!("@sites.{}", dir),
                    root: root_str.clone(),
                    uri: dir,
                    ..Default::default()
                };
                self.hooks.alter(SITE_ALIAS_ALTER, &mut record);
                record
            })
            .collect())
    }

    /// Every alias name visible on the search path.
    pub fn alias_names(&mut self) -> AliasResult<Vec<String>> {
        let (_, index) = self.current_index()?;
        Ok(index.names())
    }

    /// Returns the current index, reloading it if any alias file changed.
    fn current_index(&mut self) -> AliasResult<(String, Arc<AliasIndex>)> {
        let (files, fingerprint) = self.search_path.discover();

        if let Some((cached, index)) = &self.index
            && *cached == fingerprint
        {
            return Ok((fingerprint, Arc::clone(index)));
        }

        log::debug!(
            "Loading {} alias file(s) (fingerprint {})",
            files.len(),
            fingerprint
        );
        let index = Arc::new(AliasIndex::load(&files)?);
        self.records.retain(|(_, fp), _| *fp == fingerprint);
        self.index = Some((fingerprint.clone(), Arc::clone(&index)));
        Ok((fingerprint, index))
    }

    fn resolve_named(&mut self, token: &AliasToken) -> AliasResult<SiteRecord> {
        let (fingerprint, index) = self.current_index()?;
        self.resolve_in(&index, &fingerprint, token)
    }

    /// Resolves `token` against an index that is already loaded.
    fn resolve_in(
        &mut self,
        index: &AliasIndex,
        fingerprint: &str,
        token: &AliasToken,
    ) -> AliasResult<SiteRecord> {
        let cache_key = (token.key(), fingerprint.to_string());
        if let Some(record) = self.records.get(&cache_key) {
            log::trace!("Cache hit for '{}'", token);
            return Ok(record.clone());
        }

        let entry = index
            .lookup(&token.key(), self.policy)?
            .ok_or_else(|| AliasError::NotFound(token.to_string()))?;
        if let AliasDefinition::SiteList { .. } = entry.definition {
            return Err(AliasError::MultipleTargets(token.to_string()));
        }

        let mut stack = Vec::new();
        let merged = flatten_chain(index, self.policy, token, &mut stack)?;
        let mut record = record_from_map(token, merged)?;
        self.hooks.alter(SITE_ALIAS_ALTER, &mut record);

        self.records.insert(cache_key, record.clone());
        Ok(record)
    }

    /// `@self` comes from the bootstrapped site alone; a matching alias only adds to
    /// it. Alias files that fail to load leave the plain record.
    fn resolve_self(&mut self) -> AliasResult<SiteRecord> {
        let bootstrap = self.bootstrap.clone().ok_or(AliasError::NotBootstrapped)?;
        let loaded = match self.current_index() {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                log::debug!("Building '@self' without alias files: {}", e);
                None
            }
        };

        let mut record = SiteRecord::default();
        if let Some((fingerprint, index)) = &loaded {
            let cache_key = ("self".to_string(), fingerprint.clone());
            if let Some(cached) = self.records.get(&cache_key) {
                return Ok(cached.clone());
            }
            if let Some(matching) = self.find_alias_for(&bootstrap, index, fingerprint) {
                log::debug!("'@self' matches alias '{}'", matching.name);
                record = matching;
            }
        }
        record.name = "@self".to_string();
        record.root = bootstrap.root.display().to_string();
        record.uri = bootstrap.uri.clone();
        self.hooks.alter(SITE_ALIAS_ALTER, &mut record);

        if let Some((fingerprint, _)) = loaded {
            self.records
                .insert(("self".to_string(), fingerprint), record.clone());
        }
        Ok(record)
    }

    /// The first local alias (in name order) whose root is the bootstrapped root and
    /// whose uri is empty or equal to the bootstrapped uri.
    fn find_alias_for(
        &mut self,
        bootstrap: &BootstrapSite,
        index: &AliasIndex,
        fingerprint: &str,
    ) -> Option<SiteRecord> {
        for name in index.names() {
            let Ok(token) = parse_token(&format!("@{}", name)) else {
                continue;
            };
            let record = match self.resolve_in(index, fingerprint, &token) {
                Ok(record) => record,
                Err(e) => {
                    log::trace!("Skipping '{}' while matching '@self': {}", token, e);
                    continue;
                }
            };
            if record.remote_host().is_some() || record.root.is_empty() {
                continue;
            }
            let uri_matches = record.uri.is_empty() || record.uri == bootstrap.uri;
            if uri_matches && same_path(Path::new(&record.root), &bootstrap.root) {
                return Some(record);
            }
        }
        None
    }
}

fn check_stack(stack: &[String], label: &str) -> AliasResult<()> {
    if let Some(start) = stack.iter().position(|seen| seen == label) {
        let mut cycle: Vec<String> = stack.iter().skip(start).cloned().collect();
        cycle.push(label.to_string());
        return Err(AliasError::CyclicParent { cycle });
    }
    if stack.len() >= MAX_RECURSION_DEPTH {
        return Err(AliasError::MaxDepth {
            depth: MAX_RECURSION_DEPTH,
            name: label.to_string(),
        });
    }
    Ok(())
}

/// Merges the parent chain of `token` into one option table.
fn flatten_chain(
    index: &AliasIndex,
    policy: DuplicatePolicy,
    token: &AliasToken,
    stack: &mut Vec<String>,
) -> AliasResult<Map<String, Value>> {
    let label = token.to_string();
    check_stack(stack, &label)?;

    let entry = index
        .lookup(&token.key(), policy)?
        .ok_or_else(|| AliasError::NotFound(label.clone()))?;

    let (options, parents) = match &entry.definition {
        AliasDefinition::Site { options, parents } => (options, parents),
        AliasDefinition::SiteList { .. } => {
            return Err(AliasError::InvalidDefinition {
                name: label,
                message: "a site list cannot be used as a parent".to_string(),
            });
        }
    };

    stack.push(label);
    let mut merged = Map::new();
    for parent in parents {
        let inherited = flatten_chain(index, policy, parent, stack)?;
        deep_merge(&mut merged, inherited);
    }
    deep_merge(&mut merged, options.clone());
    stack.pop();

    Ok(merged)
}

/// Overlays `overlay` onto `base`. Tables present on both sides merge key by key;
/// anything else in `overlay` replaces the value in `base`.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match value {
            Value::Object(incoming) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => deep_merge(existing, incoming),
                _ => {
                    base.insert(key, Value::Object(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn record_from_map(token: &AliasToken, merged: Map<String, Value>) -> AliasResult<SiteRecord> {
    let mut record: SiteRecord =
        serde_json::from_value(Value::Object(merged)).map_err(|e| {
            AliasError::InvalidDefinition {
                name: token.to_string(),
                message: e.to_string(),
            }
        })?;
    record.name = token.to_string();
    Ok(record)
}

fn same_path(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| {
        fs::canonicalize(p)
            .map(|c| dunce::simplified(&c).to_path_buf())
            .unwrap_or_else(|_| p.to_path_buf())
    };
    canonical(a) == canonical(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    fn context_for(dir: &Path) -> ResolverContext {
        let mut search_path = SearchPath::new();
        search_path.push_tier("alias-path", vec![dir.to_path_buf()]);
        ResolverContext::new(search_path, DuplicatePolicy::Error)
    }

    fn fixture(files: &[(&str, &str)]) -> TempDir {
        let temp = tempdir().unwrap();
        for (name, content) in files {
            fs::write(temp.path().join(name), content).unwrap();
        }
        temp
    }

    #[test]
    fn test_group_member_scenario() {
        let temp = fixture(&[(
            "mysite.aliases.toml",
            "[dev]\nroot = '/path/to/drupal'\nuri = 'dev.mydrupalsite.com'\n",
        )]);
        let mut context = context_for(temp.path());

        let record = context.resolve_str("@mysite.dev").unwrap();
        assert_eq!(record.name, "@mysite.dev");
        assert_eq!(record.root, "/path/to/drupal");
        assert_eq!(record.uri, "dev.mydrupalsite.com");
        assert_eq!(record.remote_host(), None);

        let bare = context.resolve_str("@dev").unwrap();
        assert_eq!(bare.root, record.root);
    }

    #[test]
    fn test_multiple_parents_later_wins_child_wins_all() {
        let temp = fixture(&[(
            "aliases.toml",
            r#"
[server]
remote-host = "mystagingserver.myisp.com"
remote-user = "publisher"
ssh-options = "-p 2222"
verbose = "server"

[dev]
root = "/path/to/drupal"
uri = "dev.mydrupalsite.com"
verbose = "dev"

[live]
parent = "@server,@dev"
uri = "mydrupalsite.com"
"#,
        )]);
        let mut context = context_for(temp.path());

        let live = context.resolve_str("@live").unwrap();
        assert_eq!(live.remote_host(), Some("mystagingserver.myisp.com"));
        assert_eq!(live.remote_user.as_deref(), Some("publisher"));
        assert_eq!(live.root, "/path/to/drupal");
        assert_eq!(live.uri, "mydrupalsite.com");
        assert_eq!(live.options.get("verbose"), Some(&json!("dev")));
        assert!(!live.options.contains_key("parent"));
    }

    #[test]
    fn test_nested_tables_deep_merge() {
        let temp = fixture(&[(
            "aliases.toml",
            r#"
[base.command-specific.sql-sync]
no-cache = true
structure-tables-key = "common"

[child]
parent = "@base"

[child.command-specific.sql-sync]
structure-tables-key = "custom"
"#,
        )]);
        let mut context = context_for(temp.path());

        let child = context.resolve_str("@child").unwrap();
        let sql_sync = child.command_specific.get("sql-sync").unwrap();
        assert_eq!(sql_sync.get("no-cache"), Some(&json!(true)));
        assert_eq!(sql_sync.get("structure-tables-key"), Some(&json!("custom")));
    }

    #[test]
    fn test_cyclic_parents_fail() {
        let temp = fixture(&[(
            "aliases.toml",
            "[a]\nparent = '@b'\n\n[b]\nparent = '@a'\n",
        )]);
        let mut context = context_for(temp.path());

        match context.resolve_str("@a") {
            Err(AliasError::CyclicParent { cycle }) => {
                assert_eq!(cycle, vec!["@a", "@b", "@a"]);
            }
            other => panic!("expected CyclicParent, got {:?}", other),
        }
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let temp = fixture(&[("loop.alias.toml", "parent = '@loop'\n")]);
        let mut context = context_for(temp.path());
        assert!(matches!(
            context.resolve_str("@loop"),
            Err(AliasError::CyclicParent { .. })
        ));
    }

    #[test]
    fn test_missing_alias_and_parent() {
        let temp = fixture(&[("orphan.alias.toml", "parent = '@ghost'\n")]);
        let mut context = context_for(temp.path());

        match context.resolve_str("@nowhere") {
            Err(AliasError::NotFound(name)) => assert_eq!(name, "@nowhere"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        match context.resolve_str("@orphan") {
            Err(AliasError::NotFound(name)) => assert_eq!(name, "@ghost"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let temp = fixture(&[(
            "aliases.toml",
            "[dev]\nroot = '/a'\nuri = 'a.example'\nremote-host = 'h'\n",
        )]);
        let mut context = context_for(temp.path());

        let first = context.resolve_str("@dev").unwrap();
        let second = context.resolve_str("@dev").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_is_invalidated_when_files_change() {
        let temp = fixture(&[("dev.alias.toml", "root = '/a'\n")]);
        let mut context = context_for(temp.path());
        assert_eq!(context.resolve_str("@dev").unwrap().root, "/a");

        fs::write(temp.path().join("dev.alias.toml"), "root = '/somewhere/else'\n").unwrap();
        assert_eq!(context.resolve_str("@dev").unwrap().root, "/somewhere/else");
    }

    #[test]
    fn test_special_tokens() {
        let temp = fixture(&[]);
        let mut context = context_for(temp.path());

        let none = context.resolve_str("@none").unwrap();
        assert_eq!(none.name, "@none");
        assert!(none.root.is_empty());

        assert!(matches!(
            context.resolve_str("@self"),
            Err(AliasError::NotBootstrapped)
        ));
        assert!(matches!(
            context.resolve_str("@sites"),
            Err(AliasError::MultipleTargets(_))
        ));
        assert!(matches!(
            context.resolve_str("mysite"),
            Err(AliasError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_self_merges_matching_local_alias() {
        let site = tempdir().unwrap();
        let root = dunce::simplified(&fs::canonicalize(site.path()).unwrap()).to_path_buf();
        let content = format!(
            "[local]\nroot = '{}'\nuri = 'default'\nverbose = true\n\n[other]\nroot = '/elsewhere'\n",
            root.display()
        );
        let aliases = fixture(&[("aliases.toml", content.as_str())]);

        let mut context = context_for(aliases.path()).with_bootstrap(Some(BootstrapSite {
            root: root.clone(),
            uri: "default".to_string(),
        }));

        let record = context.resolve_str("@self").unwrap();
        assert_eq!(record.name, "@self");
        assert_eq!(record.root, root.display().to_string());
        assert_eq!(record.options.get("verbose"), Some(&json!(true)));

        // Matching walked the loaded index: every cached record shares its fingerprint.
        let fingerprint = context.index.as_ref().map(|(fp, _)| fp.clone()).unwrap();
        let keys: Vec<&(String, String)> = context.records.keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|(_, fp)| *fp == fingerprint));
    }

    #[test]
    fn test_self_survives_a_broken_alias_file() {
        let site = tempdir().unwrap();
        let aliases = fixture(&[("broken.alias.toml", "root = \n")]);
        let mut context = context_for(aliases.path()).with_bootstrap(Some(BootstrapSite {
            root: site.path().to_path_buf(),
            uri: "default".to_string(),
        }));

        let record = context.resolve_str("@self").unwrap();
        assert_eq!(record.name, "@self");
        assert_eq!(record.root, site.path().display().to_string());
        assert_eq!(record.uri, "default");

        assert!(matches!(
            context.resolve_str("@broken"),
            Err(AliasError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_groups_expand_to_members() {
        let temp = fixture(&[
            (
                "mysite.aliases.toml",
                "[dev]\nroot = '/dev'\n\n[live]\nroot = '/live'\nremote-host = 'web1'\n",
            ),
            ("aliases.toml", "[everything]\nsite-list = '@mysite,@solo'\n\n[solo]\nroot = '/solo'\n"),
        ]);
        let mut context = context_for(temp.path());

        let names: Vec<String> = context
            .resolve_targets(&parse_token("@everything").unwrap())
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["@mysite.dev", "@mysite.live", "@solo"]);

        assert!(matches!(
            context.resolve_str("@mysite"),
            Err(AliasError::MultipleTargets(_))
        ));

        let single = context.resolve_targets(&parse_token("@solo").unwrap()).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_group_members_keep_declaration_order() {
        let temp = fixture(&[(
            "shop.aliases.toml",
            "[zeta]\nroot = '/zeta'\n\n[alpha]\nroot = '/alpha'\n\n[mid]\nroot = '/mid'\n",
        )]);
        let mut context = context_for(temp.path());

        let names: Vec<String> = context
            .resolve_targets(&parse_token("@shop").unwrap())
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["@shop.zeta", "@shop.alpha", "@shop.mid"]);
    }

    #[test]
    fn test_site_list_cycles_are_detected() {
        let temp = fixture(&[(
            "aliases.toml",
            "[a]\nsite-list = '@b'\n\n[b]\nsite-list = '@a'\n",
        )]);
        let mut context = context_for(temp.path());
        assert!(matches!(
            context.resolve_targets(&parse_token("@a").unwrap()),
            Err(AliasError::CyclicParent { .. })
        ));
    }

    #[test]
    fn test_resolve_all_lists_site_directories() {
        let root = tempdir().unwrap();
        for dir in ["default", "all", "b.example.com", "empty"] {
            fs::create_dir_all(root.path().join("sites").join(dir)).unwrap();
        }
        for dir in ["default", "all", "b.example.com"] {
            fs::write(root.path().join("sites").join(dir).join("settings.php"), "<?php").unwrap();
        }

        let aliases = fixture(&[]);
        let mut context = context_for(aliases.path()).with_bootstrap(Some(BootstrapSite {
            root: root.path().to_path_buf(),
            uri: "default".to_string(),
        }));

        let uris: Vec<String> = context
            .resolve_targets(&parse_token("@sites").unwrap())
            .unwrap()
            .into_iter()
            .map(|r| r.uri)
            .collect();
        assert_eq!(uris, vec!["b.example.com", "default"]);
    }

    #[test]
    fn test_alter_hooks_run_once_per_fresh_record() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let temp = fixture(&[("dev.alias.toml", "root = '/a'\n")]);
        let mut context = context_for(temp.path());
        context.hooks_mut().on(SITE_ALIAS_ALTER, |record| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            record.uri = "altered.example".to_string();
        });

        assert_eq!(context.resolve_str("@dev").unwrap().uri, "altered.example");
        context.resolve_str("@dev").unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_field_types_are_reported() {
        let temp = fixture(&[("dev.alias.toml", "remote-port = 'twenty-two'\n")]);
        let mut context = context_for(temp.path());
        assert!(matches!(
            context.resolve_str("@dev"),
            Err(AliasError::InvalidDefinition { .. })
        ));
    }
}
