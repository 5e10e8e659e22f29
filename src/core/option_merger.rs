//! # Option Merger
//!
//! Builds the effective option set for one command run against one site.
//!
//! Layers, lowest precedence first:
//!
//! 1. global `options` from the settings file
//! 2. options embedded in the alias
//! 3. global `command-specific` from the settings file
//! 4. the bootstrapped site's `command-specific`, when the target is another site
//! 5. the target's `command-specific`
//! 6. `source-command-specific` or `target-command-specific`, depending on the role
//! 7. options given on the command line
//!
//! Within a `command-specific` table, entries keyed by a command alias are applied
//! before the entry keyed by the full command name.

use crate::models::{OptionMap, Role, SiteRecord};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMerger {
    global_options: OptionMap,
    global_command_specific: BTreeMap<String, OptionMap>,
    bootstrapped: Option<SiteRecord>,
}

impl OptionMerger {
    pub fn new(
        global_options: OptionMap,
        global_command_specific: BTreeMap<String, OptionMap>,
    ) -> Self {
        Self {
            global_options,
            global_command_specific,
            bootstrapped: None,
        }
    }

    pub fn with_bootstrapped(mut self, site: Option<SiteRecord>) -> Self {
        self.bootstrapped = site;
        self
    }

    pub fn merge(
        &self,
        site: &SiteRecord,
        command: &str,
        command_aliases: &[&str],
        role: Role,
        cli: &OptionMap,
    ) -> OptionMap {
        let mut effective = self.global_options.clone();
        overlay(&mut effective, &site.options);

        apply_command_specific(
            &mut effective,
            &self.global_command_specific,
            command,
            command_aliases,
        );

        if let Some(bootstrapped) = &self.bootstrapped
            && !is_same_site(bootstrapped, site)
        {
            apply_command_specific(
                &mut effective,
                &bootstrapped.command_specific,
                command,
                command_aliases,
            );
        }

        apply_command_specific(&mut effective, &site.command_specific, command, command_aliases);

        let role_table = match role {
            Role::Source => Some(&site.source_command_specific),
            Role::Target => Some(&site.target_command_specific),
            Role::None => None,
        };
        if let Some(table) = role_table {
            apply_command_specific(&mut effective, table, command, command_aliases);
        }

        overlay(&mut effective, cli);
        effective
    }
}

/// Merge without settings-file layers; the building block used by tests and
/// callers that carry no configuration.
pub fn merge(
    site: &SiteRecord,
    command: &str,
    command_aliases: &[&str],
    role: Role,
    cli: &OptionMap,
) -> OptionMap {
    OptionMerger::default().merge(site, command, command_aliases, role, cli)
}

fn overlay(target: &mut OptionMap, layer: &OptionMap) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}

fn apply_command_specific(
    target: &mut OptionMap,
    table: &BTreeMap<String, OptionMap>,
    command: &str,
    command_aliases: &[&str],
) {
    for alias in command_aliases {
        if *alias != command
            && let Some(layer) = table.get(*alias)
        {
            overlay(target, layer);
        }
    }
    if let Some(layer) = table.get(command) {
        overlay(target, layer);
    }
}

fn is_same_site(a: &SiteRecord, b: &SiteRecord) -> bool {
    a.root == b.root && a.uri == b.uri && a.remote_host() == b.remote_host()
}
