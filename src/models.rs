// src/models.rs

use crate::system::backend::BackendError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Option name to value. Ordered so that merged sets and forwarded flags are deterministic.
pub type OptionMap = BTreeMap<String, Value>;

// --- ALIAS TOKENS ---

/// A parsed `@name` / `@group.name` reference. `@self`, `@none` and `@sites` are
/// represented as ungrouped tokens with the reserved name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasToken {
    pub group: Option<String>,
    pub name: String,
}

impl AliasToken {
    pub fn new(group: Option<&str>, name: &str) -> Self {
        Self {
            group: group.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// `@self`: the bootstrapped site.
    pub fn is_self(&self) -> bool {
        self.group.is_none() && self.name == "self"
    }

    /// `@none`: no site at all.
    pub fn is_none(&self) -> bool {
        self.group.is_none() && self.name == "none"
    }

    /// `@sites`: every site below the bootstrapped root.
    pub fn is_sites(&self) -> bool {
        self.group.is_none() && self.name == "sites"
    }

    /// The lookup key used by the alias index (`group.name` or `name`).
    pub fn key(&self) -> String {
        match &self.group {
            Some(group) => format!("{}.{}", group, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for AliasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.key())
    }
}

// --- ALIAS DEFINITIONS (what is read from alias files) ---

/// The raw, unresolved content of one alias as loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasDefinition {
    /// A concrete site. `parents` keeps declaration order.
    Site {
        options: serde_json::Map<String, Value>,
        parents: Vec<AliasToken>,
    },
    /// A composite alias that only points at other aliases.
    SiteList { members: Vec<AliasToken> },
}

// --- SITE RECORDS (what the resolver produces) ---

/// Operating system of a dispatch target; it decides how remote words are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetOs {
    #[serde(alias = "linux", alias = "LINUX")]
    Linux,
    #[serde(alias = "windows", alias = "WINDOWS")]
    Windows,
}

impl TargetOs {
    /// The operating system this binary runs on.
    pub fn local() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// The fully resolved, flattened configuration of one dispatch target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteRecord {
    /// The token this record was resolved from, e.g. `@mysite.dev`.
    #[serde(default, skip_deserializing)]
    pub name: String,
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<TargetOs>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_aliases: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub databases: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub command_specific: BTreeMap<String, OptionMap>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_command_specific: BTreeMap<String, OptionMap>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub target_command_specific: BTreeMap<String, OptionMap>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shell_aliases: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: OptionMap,
    /// Every other key of the alias: options embedded in the alias.
    #[serde(flatten)]
    pub options: OptionMap,
}

impl SiteRecord {
    /// The record behind `@none`.
    pub fn none() -> Self {
        Self {
            name: "@none".to_string(),
            ..Default::default()
        }
    }

    /// The remote host, if it is set and non-empty.
    pub fn remote_host(&self) -> Option<&str> {
        self.remote_host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// Effective operating system: explicit `os`, else Linux for remote targets,
    /// else the local OS.
    pub fn target_os(&self) -> TargetOs {
        match self.os {
            Some(os) => os,
            None if self.remote_host().is_some() => TargetOs::Linux,
            None => TargetOs::local(),
        }
    }
}

/// Which side of a two-site command a record plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    None,
    Source,
    Target,
}

// --- DISPATCH ---

/// A command to run in this process against a site.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCall {
    pub site: SiteRecord,
    pub command: String,
    pub args: Vec<String>,
    pub options: OptionMap,
    /// Configured remote script; the default for `%drush-script`.
    pub remote_script: String,
}

/// A process to spawn; `args` already carries the remote-side quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Name of the record the call targets, for reporting.
    pub site: String,
    pub program: String,
    pub args: Vec<String>,
}

impl RemoteCall {
    /// The full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// A copy-pasteable rendition of the call, used by `--simulate`.
    pub fn command_line(&self) -> String {
        let argv = self.argv();
        shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
    }
}

/// What the dispatch engine decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Local(LocalCall),
    Remote(RemoteCall),
}

// --- BACKEND RESULTS ---

/// One log line travelling with a dispatch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: f64,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            kind: kind.into(),
            message: message.into(),
            timestamp,
        }
    }
}

/// The uniform outcome of a local or remote invocation.
///
/// A non-zero `error_status` is an ordinary value that callers inspect; it is never
/// raised as an error. `timed_out` and `failure` are local bookkeeping and are not
/// part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub error_status: i32,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub object: Value,
    #[serde(skip)]
    pub timed_out: bool,
    #[serde(skip)]
    pub failure: Option<BackendError>,
}

impl DispatchResult {
    /// A successful result.
    pub fn success(output: impl Into<String>, object: Value) -> Self {
        Self {
            error_status: 0,
            log: Vec::new(),
            output: output.into(),
            object,
            timed_out: false,
            failure: None,
        }
    }

    /// A failed result carrying the backend failure that caused it.
    pub fn from_failure(failure: BackendError, output: impl Into<String>) -> Self {
        Self {
            error_status: crate::constants::GENERIC_ERROR_STATUS,
            log: Vec::new(),
            output: output.into(),
            object: Value::Null,
            timed_out: matches!(failure, BackendError::Timeout { .. }),
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_status == 0
    }

    /// The single JSON line written at the end of a backend process's stdout.
    pub fn to_wire_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"error_status\":{},\"output\":{},\"object\":null,\"log\":[]}}",
                crate::constants::GENERIC_ERROR_STATUS,
                Value::String(format!("Could not encode result: {}", e))
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_display_and_key() {
        let token = AliasToken::new(Some("mysite"), "dev");
        assert_eq!(token.key(), "mysite.dev");
        assert_eq!(token.to_string(), "@mysite.dev");
        assert!(!token.is_self());
        assert!(AliasToken::new(None, "self").is_self());
        assert!(!AliasToken::new(Some("g"), "self").is_self());
    }

    #[test]
    fn test_site_record_collects_unknown_keys_as_options() {
        let record: SiteRecord = serde_json::from_value(json!({
            "root": "/var/www",
            "uri": "example.com",
            "remote-host": "web1",
            "verbose": true,
            "path-aliases": { "%dump": "/tmp/dump.sql" }
        }))
        .unwrap();

        assert_eq!(record.root, "/var/www");
        assert_eq!(record.remote_host(), Some("web1"));
        assert_eq!(record.options.get("verbose"), Some(&json!(true)));
        assert_eq!(record.path_aliases.get("%dump").unwrap(), "/tmp/dump.sql");
        assert!(!record.options.contains_key("root"));
    }

    #[test]
    fn test_target_os_defaults() {
        let mut record = SiteRecord::default();
        assert_eq!(record.target_os(), TargetOs::local());
        record.remote_host = Some("host".into());
        assert_eq!(record.target_os(), TargetOs::Linux);
        record.os = Some(TargetOs::Windows);
        assert_eq!(record.target_os(), TargetOs::Windows);
    }

    #[test]
    fn test_wire_line_omits_local_fields() {
        let mut result = DispatchResult::success("ok", json!({"a": 1}));
        result.timed_out = true;
        let line = result.to_wire_line();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["error_status"], json!(0));
        assert_eq!(value["output"], json!("ok"));
        assert!(value.get("timed_out").is_none());
    }
}
