//! # Dispatch Decision Engine
//!
//! Decides whether a command runs in this process or on the site's host, and
//! builds the ssh argument vector for the remote case.

use crate::constants::{
    BACKEND_FLAG, DEFAULT_REMOTE_SCRIPT, DEFAULT_SSH_BINARY, DEFAULT_SSH_OPTIONS,
};
use crate::core::path_aliases::{PathAliasError, PathAliasResolver};
use crate::models::{Invocation, LocalCall, OptionMap, RemoteCall, SiteRecord, TargetOs};
use serde_json::Value;
use std::env;
use thiserror::Error;

/// Options that describe the local invocation and are never sent to the remote side.
const NON_FORWARDED_OPTIONS: &[&str] = &["alias-path", "root", "uri", "backend"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Cannot quote '{word}' for the remote shell: it contains a NUL byte.")]
    Unquotable { word: String },
    #[error(transparent)]
    PathAlias(#[from] PathAliasError),
}

/// The configured parts of a remote invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub ssh_binary: String,
    /// Used when the record has no `ssh-options` of its own.
    pub ssh_options: Option<String>,
    pub remote_script: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            ssh_binary: DEFAULT_SSH_BINARY.to_string(),
            ssh_options: None,
            remote_script: DEFAULT_REMOTE_SCRIPT.to_string(),
        }
    }
}

/// `true` iff the record names a non-empty remote host.
pub fn is_remote(site: &SiteRecord) -> bool {
    site.remote_host().is_some()
}

/// [`DispatchEngine::build_invocation`] with default settings.
pub fn build_invocation(
    site: &SiteRecord,
    command: &str,
    args: &[String],
    options: &OptionMap,
) -> Result<Invocation, DispatchError> {
    DispatchEngine::default().build_invocation(site, command, args, options)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchEngine {
    settings: DispatchSettings,
}

impl DispatchEngine {
    pub fn new(settings: DispatchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn build_invocation(
        &self,
        site: &SiteRecord,
        command: &str,
        args: &[String],
        options: &OptionMap,
    ) -> Result<Invocation, DispatchError> {
        if !is_remote(site) {
            log::debug!("'{}' is local; running '{}' in-process", site.name, command);
            return Ok(Invocation::Local(LocalCall {
                site: site.clone(),
                command: command.to_string(),
                remote_script: self.settings.remote_script.clone(),
                args: args.to_vec(),
                options: options.clone(),
            }));
        }

        let os = site.target_os();
        let script = PathAliasResolver::new(site, &self.settings.remote_script).resolve("%drush-script")?;

        let mut remote_words = vec![script];
        if !site.root.is_empty() {
            remote_words.push(format!("--root={}", site.root));
        }
        if !site.uri.is_empty() {
            remote_words.push(format!("--uri={}", site.uri));
        }
        remote_words.push(command.to_string());
        remote_words.extend(args.iter().cloned());
        remote_words.extend(forwarded_options(options));
        remote_words.push(BACKEND_FLAG.to_string());

        let mut ssh_args = self.ssh_prefix(site);
        for word in &remote_words {
            ssh_args.push(quote_for(os, word)?);
        }

        let call = RemoteCall {
            site: site.name.clone(),
            program: self.settings.ssh_binary.clone(),
            args: ssh_args,
        };
        log::debug!("Remote invocation for '{}': {}", site.name, call.command_line());
        Ok(Invocation::Remote(call))
    }

    /// `ssh_options... [-p port] [user@]host`, shared by dispatch, `site-ssh` and rsync.
    /// Empty when the record is local.
    pub fn ssh_prefix(&self, site: &SiteRecord) -> Vec<String> {
        let Some(host) = site.remote_host() else {
            return Vec::new();
        };

        let mut args = split_ssh_options(&self.effective_ssh_options(site));
        if let Some(port) = site.remote_port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(user_at_host(site, host));
        args
    }

    /// The record's `ssh-options`, else the configured ones, else the default.
    pub fn effective_ssh_options(&self, site: &SiteRecord) -> String {
        site.ssh_options
            .clone()
            .or_else(|| self.settings.ssh_options.clone())
            .unwrap_or_else(|| DEFAULT_SSH_OPTIONS.to_string())
    }
}

fn split_ssh_options(raw: &str) -> Vec<String> {
    shlex::split(raw).unwrap_or_else(|| raw.split_whitespace().map(str::to_string).collect())
}

fn user_at_host(site: &SiteRecord, host: &str) -> String {
    let user = site
        .remote_user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(current_user);
    match user {
        Some(user) => format!("{}@{}", user, host),
        None => host.to_string(),
    }
}

fn current_user() -> Option<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

/// Renders the options that travel to the remote side as `--name[=value]` words.
pub fn forwarded_options(options: &OptionMap) -> Vec<String> {
    options
        .iter()
        .filter(|(name, _)| !name.starts_with('#') && !NON_FORWARDED_OPTIONS.contains(&name.as_str()))
        .filter_map(|(name, value)| match value {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(format!("--{}", name)),
            Value::String(s) => Some(format!("--{}={}", name, s)),
            Value::Number(n) => Some(format!("--{}={}", name, n)),
            Value::Array(items) => {
                let joined: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                Some(format!("--{}={}", name, joined.join(",")))
            }
            Value::Object(_) => Some(format!("--{}={}", name, value)),
        })
        .collect()
}

/// Quotes one word for the shell of `os`.
pub fn quote_for(os: TargetOs, word: &str) -> Result<String, DispatchError> {
    if word.contains('\0') {
        return Err(DispatchError::Unquotable {
            word: word.replace('\0', "\\0"),
        });
    }
    Ok(match os {
        TargetOs::Linux => quote_posix(word),
        TargetOs::Windows => quote_windows(word),
    })
}

fn is_plain(word: &str, extra: &[char]) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c) || extra.contains(&c))
}

fn quote_posix(word: &str) -> String {
    if is_plain(word, &[]) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

fn quote_windows(word: &str) -> String {
    if is_plain(word, &['\\']) {
        return word.to_string();
    }
    format!("\"{}\"", word.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote_site() -> SiteRecord {
        SiteRecord {
            name: "@live".to_string(),
            root: "/path/to/drupal".to_string(),
            uri: "mydrupalsite.com".to_string(),
            remote_host: Some("mystagingserver.myisp.com".to_string()),
            remote_user: Some("publisher".to_string()),
            ..Default::default()
        }
    }

    fn remote_args(invocation: Invocation) -> RemoteCall {
        match invocation {
            Invocation::Remote(call) => call,
            other => panic!("expected a remote invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_is_remote_iff_host_non_empty() {
        let hosts: [(Option<&str>, bool); 5] = [
            (None, false),
            (Some(""), false),
            (Some("   "), false),
            (Some("web1"), true),
            (Some("10.0.0.5"), true),
        ];
        for (root, uri) in [("", ""), ("/var/www", "example.com")] {
            for (host, expected) in hosts {
                let site = SiteRecord {
                    root: root.to_string(),
                    uri: uri.to_string(),
                    remote_host: host.map(str::to_string),
                    ..Default::default()
                };
                assert_eq!(is_remote(&site), expected, "host {:?}", host);
            }
        }
    }

    #[test]
    fn test_missing_or_blank_user_falls_back_to_current_user() {
        let expected = match current_user() {
            Some(user) => format!("{}@web1.example.com", user),
            None => "web1.example.com".to_string(),
        };

        for remote_user in [None, Some(""), Some("  ")] {
            let site = SiteRecord {
                remote_host: Some("web1.example.com".to_string()),
                remote_user: remote_user.map(str::to_string),
                ..Default::default()
            };
            assert_eq!(user_at_host(&site, "web1.example.com"), expected);

            let prefix = DispatchEngine::default().ssh_prefix(&site);
            assert_eq!(prefix.last(), Some(&expected), "remote-user {:?}", remote_user);
        }
    }

    #[test]
    fn test_local_site_builds_local_call() {
        let site = SiteRecord {
            name: "@mysite.dev".to_string(),
            root: "/path/to/drupal".to_string(),
            uri: "dev.mydrupalsite.com".to_string(),
            ..Default::default()
        };
        let options: OptionMap = [("verbose".to_string(), json!(true))].into_iter().collect();
        match build_invocation(&site, "status", &[], &options).unwrap() {
            Invocation::Local(call) => {
                assert_eq!(call.command, "status");
                assert_eq!(call.site, site);
                assert_eq!(call.options, options);
            }
            other => panic!("expected local, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_argv_layout() {
        let call = remote_args(
            build_invocation(&remote_site(), "status", &["core".to_string()], &OptionMap::new()).unwrap(),
        );
        assert_eq!(call.program, "ssh");
        assert_eq!(
            call.args,
            vec![
                "-o",
                "PasswordAuthentication=no",
                "publisher@mystagingserver.myisp.com",
                "drush",
                "--root=/path/to/drupal",
                "--uri=mydrupalsite.com",
                "status",
                "core",
                "--backend",
            ]
        );
        assert_eq!(call.site, "@live");
    }

    #[test]
    fn test_port_ssh_options_and_script_override() {
        let mut site = remote_site();
        site.remote_port = Some(2222);
        site.ssh_options = Some("-o StrictHostKeyChecking=no -i '/keys/my key'".to_string());
        site.path_aliases
            .insert("%drush-script".to_string(), "/opt/drush/drush".to_string());

        let call = remote_args(build_invocation(&site, "st", &[], &OptionMap::new()).unwrap());
        assert_eq!(
            &call.args[..7],
            &[
                "-o",
                "StrictHostKeyChecking=no",
                "-i",
                "/keys/my key",
                "-p",
                "2222",
                "publisher@mystagingserver.myisp.com",
            ]
        );
        assert_eq!(call.args[7], "/opt/drush/drush");
    }

    #[test]
    fn test_forwarded_options() {
        let options: OptionMap = [
            ("#hidden", json!("x")),
            ("alias-path", json!("/a")),
            ("root", json!("/r")),
            ("uri", json!("u")),
            ("backend", json!(true)),
            ("yes", json!(true)),
            ("no-cache", json!(false)),
            ("skip", Value::Null),
            ("tables", json!(["cache", "watchdog"])),
            ("limit", json!(10)),
            ("extra", json!({"a": 1})),
            ("format", json!("json")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        assert_eq!(
            forwarded_options(&options),
            vec![
                "--extra={\"a\":1}",
                "--format=json",
                "--limit=10",
                "--tables=cache,watchdog",
                "--yes",
            ]
        );
    }

    #[test]
    fn test_remote_words_are_quoted_per_os() {
        let mut site = remote_site();
        site.root = "/srv/my site".to_string();
        let options: OptionMap = [("message".to_string(), json!("it's done"))].into_iter().collect();

        let call = remote_args(build_invocation(&site, "status", &[], &options).unwrap());
        assert!(call.args.contains(&"'--root=/srv/my site'".to_string()));
        assert!(call.args.contains(&"'--message=it'\\''s done'".to_string()));

        site.os = Some(TargetOs::Windows);
        site.root = "C:\\Program Files\\site".to_string();
        let call = remote_args(build_invocation(&site, "status", &[], &OptionMap::new()).unwrap());
        assert!(call.args.contains(&"\"--root=C:\\Program Files\\site\"".to_string()));
    }

    #[test]
    fn test_nul_bytes_cannot_be_quoted() {
        let result = build_invocation(&remote_site(), "status", &["a\0b".to_string()], &OptionMap::new());
        assert!(matches!(result, Err(DispatchError::Unquotable { .. })));
    }

    #[test]
    fn test_ssh_options_fall_back_to_settings() {
        let engine = DispatchEngine::new(DispatchSettings {
            ssh_options: Some("-F /etc/ssh/custom".to_string()),
            ..Default::default()
        });
        let prefix = engine.ssh_prefix(&remote_site());
        assert_eq!(prefix, vec!["-F", "/etc/ssh/custom", "publisher@mystagingserver.myisp.com"]);
        assert!(engine.ssh_prefix(&SiteRecord::default()).is_empty());
    }
}
