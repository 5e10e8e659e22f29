// src/cli/args.rs

use crate::cli::Cli;
use crate::core::alias_resolver::AliasError;
use crate::core::paths;
use crate::core::token::{looks_like_token, parse_token};
use crate::models::{AliasToken, OptionMap};
use serde_json::Value;
use std::path::PathBuf;

/// Options that only steer this process. They are lifted into [`GlobalFlags`] and
/// removed from the command's options.
const PROCESS_OPTIONS: &[&str] = &["alias-path", "root", "uri", "backend", "config", "timeout"];

/// Flags that apply to the whole run, wherever they appeared on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    pub alias_path: Vec<String>,
    pub root: Option<String>,
    pub uri: Option<String>,
    pub simulate: bool,
    pub yes: bool,
    pub backend: bool,
    pub timeout: Option<u64>,
    pub config: Option<PathBuf>,
}

impl From<&Cli> for GlobalFlags {
    fn from(cli: &Cli) -> Self {
        Self {
            alias_path: cli
                .alias_path
                .iter()
                .flat_map(|raw| paths::split_alias_path(raw))
                .collect(),
            root: cli.root.clone(),
            uri: cli.uri.clone(),
            simulate: cli.simulate,
            yes: cli.yes,
            backend: cli.backend,
            timeout: cli.timeout,
            config: cli.config.clone(),
        }
    }
}

impl GlobalFlags {
    /// Lifts process options given after the command (`drush status --uri=x`) into
    /// the flags. `yes` and `simulate` stay in `options` so they are forwarded.
    pub fn absorb(&mut self, options: &mut OptionMap) {
        for short in ["y", "s"] {
            if let Some(value) = options.remove(short) {
                let long = if short == "y" { "yes" } else { "simulate" };
                options.insert(long.to_string(), value);
            }
        }
        self.yes |= is_true(options.get("yes"));
        self.simulate |= is_true(options.get("simulate"));

        for name in PROCESS_OPTIONS {
            let Some(value) = options.remove(*name) else {
                continue;
            };
            let text = match &value {
                Value::String(s) => Some(s.clone()),
                Value::Bool(true) => None,
                other => Some(other.to_string()),
            };
            match *name {
                "alias-path" => {
                    if let Some(raw) = text {
                        self.alias_path.extend(paths::split_alias_path(&raw));
                    }
                }
                "root" => self.root = text.or(self.root.take()),
                "uri" => self.uri = text.or(self.uri.take()),
                "backend" => self.backend = true,
                "config" => self.config = text.map(PathBuf::from).or(self.config.take()),
                "timeout" => {
                    self.timeout = text.and_then(|t| t.parse().ok()).or(self.timeout);
                }
                _ => {}
            }
        }
    }
}

fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
        || matches!(value, Some(Value::String(s)) if s == "1" || s == "true")
}

/// The trailing words of an invocation, split into their parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLine {
    pub token: Option<AliasToken>,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub options: OptionMap,
}

/// Splits `[@alias] <command> [args...] [--opt=value...]`.
///
/// `--name=value` becomes a string option and `--name` a `true` flag. A single
/// dash groups one-letter flags (`-yv`). Everything after `--` is positional.
pub fn parse_command_line(words: &[String]) -> Result<CommandLine, AliasError> {
    let mut line = CommandLine::default();
    let mut rest = words.iter().peekable();

    if let Some(first) = rest.peek()
        && looks_like_token(first)
    {
        line.token = Some(parse_token(first)?);
        rest.next();
    }

    let mut positional_only = false;
    for word in rest {
        if positional_only {
            push_positional(&mut line, word);
            continue;
        }
        if word == "--" {
            positional_only = true;
            continue;
        }

        if let Some(body) = word.strip_prefix("--") {
            match body.split_once('=') {
                Some((name, value)) => {
                    line.options.insert(name.to_string(), Value::String(value.to_string()));
                }
                None => {
                    line.options.insert(body.to_string(), Value::Bool(true));
                }
            }
        } else if let Some(letters) = word.strip_prefix('-')
            && !letters.is_empty()
            && letters.chars().all(|c| c.is_ascii_alphabetic())
        {
            for letter in letters.chars() {
                line.options.insert(letter.to_string(), Value::Bool(true));
            }
        } else {
            push_positional(&mut line, word);
        }
    }

    Ok(line)
}

fn push_positional(line: &mut CommandLine, word: &str) {
    if line.command.is_none() {
        line.command = Some(word.to_string());
    } else {
        line.args.push(word.to_string());
    }
}
