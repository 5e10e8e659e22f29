// src/core/transfer.rs

use crate::constants::{DEFAULT_RSYNC_BINARY, DEFAULT_RSYNC_MODE};
use crate::core::alias_resolver::AliasError;
use crate::core::dispatch::{DispatchEngine, DispatchError, is_remote, quote_for};
use crate::core::path_aliases::{PathAliasError, PathAliasResolver};
use crate::core::token::parse_token;
use crate::models::{AliasToken, OptionMap, RemoteCall, SiteRecord, TargetOs};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid site path '{0}'. Expected '@alias:path', '@alias' or a local path.")]
    InvalidSitePath(String),
    #[error("Cannot transfer between two remote sites ('{source_site}' and '{target_site}').")]
    BothRemote {
        source_site: String,
        target_site: String,
    },
    #[error("Site '{0}' has no root to resolve a path against.")]
    MissingRoot(String),
    #[error(transparent)]
    Alias(#[from] AliasError),
    #[error(transparent)]
    PathAlias(#[from] PathAliasError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A transfer endpoint as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePath {
    pub alias: Option<AliasToken>,
    /// Path below the site, possibly starting with a `%token`. Empty means the root.
    pub path: String,
}

/// Parses `@alias:path`, `@alias` or a plain local path.
pub fn parse_site_path(raw: &str) -> Result<SitePath, TransferError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TransferError::InvalidSitePath(raw.to_string()));
    }
    if !trimmed.starts_with('@') {
        return Ok(SitePath {
            alias: None,
            path: trimmed.to_string(),
        });
    }

    let (token, path) = trimmed.split_once(':').unwrap_or((trimmed, ""));
    let alias = parse_token(token).map_err(|_| TransferError::InvalidSitePath(raw.to_string()))?;
    Ok(SitePath {
        alias: Some(alias),
        path: path.to_string(),
    })
}

/// One side of a transfer after alias resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub site: SiteRecord,
    pub path: String,
}

impl Endpoint {
    /// Resolves the path part of `site_path` against `site`.
    pub fn evaluate(
        site: SiteRecord,
        site_path: &SitePath,
        remote_script: &str,
    ) -> Result<Self, TransferError> {
        let resolver = PathAliasResolver::new(&site, remote_script);
        let path = if site_path.path.is_empty() {
            if site.root.is_empty() {
                return Err(TransferError::MissingRoot(site.name.clone()));
            }
            site.root.clone()
        } else {
            resolver.expand(&site_path.path)?
        };
        Ok(Self { site, path })
    }

    /// The rsync spelling of this endpoint: `user@host:path` or a local path.
    fn location(&self, engine: &DispatchEngine) -> Result<String, TransferError> {
        let prefix = engine.ssh_prefix(&self.site);
        match prefix.last() {
            Some(user_at_host) if is_remote(&self.site) => {
                let quoted = quote_for(self.site.target_os(), &self.path)?;
                Ok(format!("{}:{}", user_at_host, quoted))
            }
            _ => Ok(self.path.clone()),
        }
    }
}

/// Builds the rsync call copying `source` to `target`.
///
/// Recognised options: `mode` (default `akz`), `exclude-paths` and `include-paths`
/// (colon separated or a list), `delete`, `dry-run`.
pub fn build_rsync(
    source: &Endpoint,
    target: &Endpoint,
    options: &OptionMap,
    engine: &DispatchEngine,
    rsync_binary: Option<&str>,
) -> Result<RemoteCall, TransferError> {
    if is_remote(&source.site) && is_remote(&target.site) {
        return Err(TransferError::BothRemote {
            source_site: source.site.name.clone(),
            target_site: target.site.name.clone(),
        });
    }

    let mut args = Vec::new();
    let remote = [&source.site, &target.site]
        .into_iter()
        .find(|site| is_remote(site));
    if let Some(site) = remote {
        let mut ssh = vec![engine.settings().ssh_binary.clone()];
        ssh.extend(engine.ssh_prefix(site));
        // The host is part of the remote location, not of the -e command.
        ssh.pop();
        let words = ssh
            .iter()
            .map(|word| quote_for(TargetOs::Linux, word))
            .collect::<Result<Vec<_>, _>>()?;
        args.push("-e".to_string());
        args.push(words.join(" "));
    }

    let mode = options
        .get("mode")
        .and_then(Value::as_str)
        .map(|m| m.trim_start_matches('-'))
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_RSYNC_MODE);
    args.push(format!("-{}", mode));

    for (option, flag) in [("exclude-paths", "--exclude"), ("include-paths", "--include")] {
        for pattern in path_list(options.get(option)) {
            args.push(format!("{}={}", flag, pattern));
        }
    }
    for flag in ["delete", "dry-run"] {
        if options.get(flag) == Some(&Value::Bool(true)) {
            args.push(format!("--{}", flag));
        }
    }

    args.push(source.location(engine)?);
    args.push(target.location(engine)?);

    Ok(RemoteCall {
        site: format!("{} -> {}", source.site.name, target.site.name),
        program: rsync_binary.unwrap_or(DEFAULT_RSYNC_BINARY).to_string(),
        args,
    })
}

fn path_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split([':', ';'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
