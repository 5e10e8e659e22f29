// src/cli/handlers/commons.rs

// State and helpers shared by the command handlers.

use crate::CancellationToken;
use crate::cli::args::GlobalFlags;
use crate::cli::dispatcher::{CommandDefinition, Registry};
use crate::core::alias_loader::SearchPath;
use crate::core::alias_resolver::{BootstrapSite, ResolverContext};
use crate::core::option_merger::OptionMerger;
use crate::core::dispatch::DispatchEngine;
use crate::core::paths;
use crate::core::settings::Settings;
use crate::models::{AliasToken, DispatchResult, Invocation, OptionMap, Role, SiteRecord};
use crate::system::backend::{self, InvokeSettings};
use crate::system::executor::ExecutionError;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use serde_json::{Map, Value};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_URI: &str = "default";

/// Everything a command needs for one run of the binary.
#[derive(Debug)]
pub struct Session {
    pub flags: GlobalFlags,
    pub settings: Settings,
    pub resolver: ResolverContext,
    pub merger: OptionMerger,
    pub engine: DispatchEngine,
    pub invoke_settings: InvokeSettings,
}

impl Session {
    pub fn new(flags: GlobalFlags, cancellation_token: CancellationToken) -> Result<Self> {
        let (settings, settings_path) = Settings::load(flags.config.as_deref())?;
        if let Some(path) = &settings_path {
            log::debug!("Loaded settings from '{}'", path.display());
        }

        let bootstrap = find_bootstrap(&flags)?;
        let mut explicit = flags.alias_path.clone();
        explicit.extend(settings.alias_path.entries());

        let search_path = SearchPath::standard(&explicit, bootstrap.as_ref().map(|b| b.root.as_path()));
        let mut resolver =
            ResolverContext::new(search_path, settings.duplicate_aliases).with_bootstrap(bootstrap);

        let bootstrapped_record = if resolver.bootstrap().is_some() {
            Some(resolver.resolve(&AliasToken::new(None, "self"))?)
        } else {
            None
        };
        let merger = OptionMerger::new(settings.options.clone(), settings.command_specific.clone())
            .with_bootstrapped(bootstrapped_record);

        let invoke_settings = InvokeSettings {
            timeout: flags
                .timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .or_else(|| settings.timeout()),
            cancellation: cancellation_token,
        };

        Ok(Self {
            engine: DispatchEngine::new(settings.dispatch_settings()),
            flags,
            settings,
            resolver,
            merger,
            invoke_settings,
        })
    }

    pub fn remote_script(&self) -> &str {
        &self.engine.settings().remote_script
    }

    /// The records a command line targets: the token's sites, else `@self` when a
    /// site is bootstrapped, else `@none`.
    pub fn targets(&mut self, token: Option<&AliasToken>) -> Result<Vec<SiteRecord>> {
        match token {
            Some(token) => Ok(self.resolver.resolve_targets(token)?),
            None => Ok(vec![self.default_site()?]),
        }
    }

    /// Like [`Session::targets`] but insists on exactly one site.
    pub fn single_target(&mut self, token: Option<&AliasToken>) -> Result<SiteRecord> {
        match token {
            Some(token) => Ok(self.resolver.resolve(token)?),
            None => self.default_site(),
        }
    }

    pub fn default_site(&mut self) -> Result<SiteRecord> {
        let token = if self.resolver.bootstrap().is_some() {
            AliasToken::new(None, "self")
        } else {
            AliasToken::new(None, "none")
        };
        Ok(self.resolver.resolve(&token)?)
    }

    /// Runs a site-scoped command against one record, locally or over ssh.
    pub fn run_on_site(
        &self,
        site: &SiteRecord,
        definition: Option<&CommandDefinition>,
        command: &str,
        args: &[String],
        cli_options: &OptionMap,
    ) -> DispatchResult {
        let (name, aliases) = match definition {
            Some(def) => (def.name, def.aliases),
            None => (command, <&[&str]>::default()),
        };
        let options = self.merger.merge(site, name, aliases, Role::None, cli_options);

        let invocation = match self.engine.build_invocation(site, name, args, &options) {
            Ok(invocation) => invocation,
            Err(e) => return failed(e.to_string()),
        };

        if self.flags.simulate
            && let Invocation::Remote(call) = &invocation
        {
            return DispatchResult::success(call.command_line(), Value::Null);
        }

        backend::invoke(&invocation, &Registry, &self.invoke_settings)
    }

    /// Asks for confirmation unless `--yes` was given.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.flags.yes {
            return Ok(true);
        }
        if self.flags.backend {
            return Err(anyhow!(t!("common.error.confirmation_in_backend")));
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|_| ExecutionError::Cancelled.into())
    }

    /// Logs an external command right before it runs.
    pub fn announce(&self, command_line: &str) {
        log::info!("{} {}", t!("common.info.running"), command_line);
    }
}

fn find_bootstrap(flags: &GlobalFlags) -> Result<Option<BootstrapSite>> {
    let uri = flags.uri.clone().unwrap_or_else(|| DEFAULT_URI.to_string());

    if let Some(raw) = &flags.root {
        let root = paths::expand_path(raw)?;
        let root = root
            .canonicalize()
            .map(|c| dunce::simplified(&c).to_path_buf())
            .unwrap_or(root);
        return Ok(Some(BootstrapSite { root, uri }));
    }

    let cwd: PathBuf = env::current_dir().context(t!("common.error.no_cwd"))?;
    Ok(paths::find_site_root(&cwd).map(|root| BootstrapSite { root, uri }))
}

/// A failed result for problems found before anything ran.
pub fn failed(message: impl Into<String>) -> DispatchResult {
    let message = message.into();
    let mut result = DispatchResult::success(message, Value::Null);
    result.error_status = crate::constants::GENERIC_ERROR_STATUS;
    result
}

/// Folds per-site results into one; every site keeps its own status in `object`.
pub fn aggregate(results: Vec<(String, DispatchResult)>) -> DispatchResult {
    let mut combined = DispatchResult::success(String::new(), Value::Null);
    let mut per_site = Map::new();
    let mut output = Vec::new();

    for (name, result) in results {
        if combined.error_status == 0 && result.error_status != 0 {
            combined.error_status = result.error_status;
        }
        combined.timed_out |= result.timed_out;
        for line in result.output.lines() {
            output.push(format!("{} >> {}", name, line));
        }
        combined.log.extend(result.log);
        per_site.insert(
            name,
            serde_json::json!({
                "error_status": result.error_status,
                "output": result.output,
                "object": result.object,
            }),
        );
    }

    combined.output = output.join("\n");
    combined.object = Value::Object(per_site);
    combined
}

/// Prints a result for a person: log entries worth seeing, then the output.
pub fn render(result: &DispatchResult) {
    for entry in &result.log {
        match entry.kind.as_str() {
            "error" | "stderr" => eprintln!("{}", entry.message.red()),
            "warning" => eprintln!("{}", entry.message.yellow()),
            _ => log::debug!("[{}] {}", entry.kind, entry.message),
        }
    }

    if result.timed_out {
        eprintln!("{}", t!("common.error.timed_out").red());
    }
    if result.output.is_empty() {
        return;
    }
    if result.is_success() {
        println!("{}", result.output.trim_end());
    } else {
        eprintln!("{}", result.output.trim_end().red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregate_keeps_each_status() {
        let mut bad = DispatchResult::success("boom", Value::Null);
        bad.error_status = 3;
        let combined = aggregate(vec![
            ("@a".to_string(), DispatchResult::success("one\ntwo", json!(1))),
            ("@b".to_string(), bad),
        ]);

        assert_eq!(combined.error_status, 3);
        assert_eq!(combined.output, "@a >> one\n@a >> two\n@b >> boom");
        assert_eq!(combined.object["@a"]["error_status"], json!(0));
        assert_eq!(combined.object["@b"]["error_status"], json!(3));
        assert_eq!(combined.object["@a"]["object"], json!(1));
    }

    #[test]
    fn test_failed_result() {
        let result = failed("nope");
        assert_eq!(result.error_status, 1);
        assert_eq!(result.output, "nope");
    }
}
