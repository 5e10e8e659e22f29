// src/core/path_aliases.rs

use crate::constants::{DEFAULT_FILES_PATH, MAX_RECURSION_DEPTH};
use crate::models::{SiteRecord, TargetOs};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use thiserror::Error;

lazy_static! {
    // `%files`, `%dump-dir`, `%drush-script`, ...
    static ref PATH_TOKEN_RE: Regex = Regex::new(r"%[A-Za-z][A-Za-z0-9_-]*").expect("path token regex is valid");
}

/// Tokens whose value is a command rather than a path; never made absolute.
const COMMAND_TOKENS: &[&str] = &["%drush-script"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathAliasError {
    #[error("Unknown path alias '{token}' for site '{site}'.")]
    Unknown { token: String, site: String },
    #[error("Circular path alias detected: {}", .chain.join(" -> "))]
    Cyclic { chain: Vec<String> },
    #[error("Maximum path alias depth ({0}) exceeded.")]
    MaxDepth(usize),
}

/// How a token gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathValue {
    Literal(String),
    /// Deferred read of the record's root.
    Root,
    /// A string that mentions other tokens.
    Template(String),
}

/// Lazily evaluates the `%token` path aliases of one site record.
#[derive(Debug, Clone, Copy)]
pub struct PathAliasResolver<'a> {
    site: &'a SiteRecord,
    remote_script: &'a str,
}

impl<'a> PathAliasResolver<'a> {
    pub fn new(site: &'a SiteRecord, remote_script: &'a str) -> Self {
        Self {
            site,
            remote_script,
        }
    }

    fn lookup(&self, token: &str) -> Option<PathValue> {
        if token == "%root" {
            return Some(PathValue::Root);
        }
        if let Some(value) = self.site.path_aliases.get(token) {
            return Some(if PATH_TOKEN_RE.is_match(value) {
                PathValue::Template(value.clone())
            } else {
                PathValue::Literal(value.clone())
            });
        }
        match token {
            "%files" => Some(PathValue::Template(DEFAULT_FILES_PATH.to_string())),
            "%drush-script" => Some(PathValue::Literal(self.remote_script.to_string())),
            _ => None,
        }
    }

    /// Resolves a single token such as `%files`.
    pub fn resolve(&self, token: &str) -> Result<String, PathAliasError> {
        let mut stack = Vec::new();
        self.resolve_inner(token, &mut stack)
    }

    fn resolve_inner(&self, token: &str, stack: &mut Vec<String>) -> Result<String, PathAliasError> {
        if let Some(start) = stack.iter().position(|seen| seen == token) {
            let mut chain: Vec<String> = stack.iter().skip(start).cloned().collect();
            chain.push(token.to_string());
            return Err(PathAliasError::Cyclic { chain });
        }
        if stack.len() >= MAX_RECURSION_DEPTH {
            return Err(PathAliasError::MaxDepth(MAX_RECURSION_DEPTH));
        }

        let value = self.lookup(token).ok_or_else(|| PathAliasError::Unknown {
            token: token.to_string(),
            site: self.site.name.clone(),
        })?;

        stack.push(token.to_string());
        let resolved = match value {
            PathValue::Root => self.site.root.clone(),
            PathValue::Literal(literal) => literal,
            PathValue::Template(template) => self.expand_template(&template, stack)?,
        };
        stack.pop();

        if COMMAND_TOKENS.contains(&token) {
            Ok(resolved)
        } else {
            Ok(self.make_absolute(&resolved))
        }
    }

    fn expand_template(&self, template: &str, stack: &mut Vec<String>) -> Result<String, PathAliasError> {
        let mut failure = None;
        let expanded = PATH_TOKEN_RE.replace_all(template, |caps: &Captures| {
            if failure.is_some() {
                return String::new();
            }
            let token = caps.get(0).map_or("", |m| m.as_str());
            match self.resolve_inner(token, stack) {
                Ok(value) => value,
                Err(e) => {
                    failure = Some(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Expands every token in a site path such as `%files/styles`. Plain relative
    /// paths are taken relative to the site root.
    pub fn expand(&self, path: &str) -> Result<String, PathAliasError> {
        let mut stack = Vec::new();
        let expanded = self.expand_template(path, &mut stack)?;
        Ok(self.make_absolute(&expanded))
    }

    /// Every token this record knows about, resolved.
    pub fn all(&self) -> Result<BTreeMap<String, String>, PathAliasError> {
        let mut tokens: Vec<&str> = vec!["%root", "%files", "%drush-script"];
        tokens.extend(self.site.path_aliases.keys().map(String::as_str));

        let mut resolved = BTreeMap::new();
        for token in tokens {
            resolved.insert(token.to_string(), self.resolve(token)?);
        }
        Ok(resolved)
    }

    fn make_absolute(&self, value: &str) -> String {
        if value.is_empty() || self.site.root.is_empty() || is_absolute(value) {
            return value.to_string();
        }
        if self.site.remote_host().is_none() && value.starts_with('~') {
            return shellexpand::tilde(value).into_owned();
        }
        let separator = match self.site.target_os() {
            TargetOs::Windows => '\\',
            TargetOs::Linux => '/',
        };
        let root = self.site.root.trim_end_matches(['/', '\\']);
        format!("{}{}{}", root, separator, value)
    }
}

/// Absolute on either side of the wire: `/x`, `~/x`, `C:\x`, `C:/x` or `\\share`.
fn is_absolute(value: &str) -> bool {
    if value.starts_with('/') || value.starts_with('\\') {
        return true;
    }
    if value.starts_with('~') {
        return false;
    }
    matches!(
        value.as_bytes(),
        [drive, b':', b'\\' | b'/', ..] if drive.is_ascii_alphabetic()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(root: &str, aliases: &[(&str, &str)]) -> SiteRecord {
        SiteRecord {
            name: "@test".to_string(),
            root: root.to_string(),
            remote_host: Some("web1".to_string()),
            path_aliases: aliases
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let record = site("/var/www", &[]);
        let resolver = PathAliasResolver::new(&record, "drush");
        assert_eq!(resolver.resolve("%root").unwrap(), "/var/www");
        assert_eq!(resolver.resolve("%files").unwrap(), "/var/www/sites/default/files");
        assert_eq!(resolver.resolve("%drush-script").unwrap(), "drush");
    }

    #[test]
    fn test_relative_and_templated_values() {
        let record = site(
            "/var/www/",
            &[
                ("%files", "sites/mysite/files"),
                ("%dump-dir", "/tmp/dumps"),
                ("%dump", "%dump-dir/latest.sql"),
                ("%private", "%files/private"),
            ],
        );
        let resolver = PathAliasResolver::new(&record, "drush");
        assert_eq!(resolver.resolve("%files").unwrap(), "/var/www/sites/mysite/files");
        assert_eq!(resolver.resolve("%dump").unwrap(), "/tmp/dumps/latest.sql");
        assert_eq!(
            resolver.resolve("%private").unwrap(),
            "/var/www/sites/mysite/files/private"
        );
        assert_eq!(
            resolver.expand("%files/styles").unwrap(),
            "/var/www/sites/mysite/files/styles"
        );
        assert_eq!(resolver.expand("modules").unwrap(), "/var/www/modules");
    }

    #[test]
    fn test_cycles_and_unknown_tokens() {
        let record = site("/r", &[("%a", "%b/x"), ("%b", "%a/y")]);
        let resolver = PathAliasResolver::new(&record, "drush");
        match resolver.resolve("%a") {
            Err(PathAliasError::Cyclic { chain }) => assert_eq!(chain, vec!["%a", "%b", "%a"]),
            other => panic!("expected Cyclic, got {:?}", other),
        }
        assert!(matches!(
            resolver.resolve("%nope"),
            Err(PathAliasError::Unknown { .. })
        ));
    }

    #[test]
    fn test_remote_script_override_and_windows_paths() {
        let mut record = site(
            "C:\\sites\\drupal",
            &[("%drush-script", "/usr/local/bin/drush9")],
        );
        record.os = Some(TargetOs::Windows);
        let resolver = PathAliasResolver::new(&record, "drush");
        assert_eq!(resolver.resolve("%drush-script").unwrap(), "/usr/local/bin/drush9");
        assert_eq!(resolver.expand("web").unwrap(), "C:\\sites\\drupal\\web");
        assert!(is_absolute("D:/data"));
    }

    #[test]
    fn test_all_lists_every_token() {
        let record = site("/r", &[("%dump", "/tmp/d.sql")]);
        let all = PathAliasResolver::new(&record, "drush").all().unwrap();
        assert_eq!(all.get("%dump").map(String::as_str), Some("/tmp/d.sql"));
        assert_eq!(all.get("%root").map(String::as_str), Some("/r"));
        assert_eq!(all.len(), 4);
    }
}
