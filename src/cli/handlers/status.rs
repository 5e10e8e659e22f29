// src/cli/handlers/status.rs

use crate::{
    core::{path_aliases::PathAliasResolver, paths},
    models::LocalCall,
    system::backend::CommandOutput,
};
use anyhow::Result;
use serde_json::{Value, json};
use std::path::Path;

/// The `status` command: a summary of the site the call targets.
pub fn handle(call: &LocalCall) -> Result<CommandOutput> {
    let site = &call.site;
    let path_aliases = PathAliasResolver::new(site, &call.remote_script).all()?;
    let root_exists = !site.root.is_empty() && paths::is_site_root(Path::new(&site.root));

    let object = json!({
        "site": site.name,
        "root": site.root,
        "uri": site.uri,
        "os": format!("{:?}", site.target_os()),
        "site-root-found": root_exists,
        "databases": site.databases.is_some(),
        "path-aliases": path_aliases,
        "options": call.options,
    });

    let mut lines = vec![
        format!("{:<16}: {}", t!("status.label.site"), site.name),
        format!("{:<16}: {}", t!("status.label.root"), site.root),
        format!("{:<16}: {}", t!("status.label.uri"), site.uri),
        format!(
            "{:<16}: {}",
            t!("status.label.bootstrap"),
            if root_exists {
                t!("status.value.found")
            } else {
                t!("status.value.not_found")
            }
        ),
    ];
    for (token, path) in &path_aliases {
        lines.push(format!("{:<16}: {}", token, path));
    }
    if !call.options.is_empty() {
        lines.push(format!("{}:", t!("status.label.options")));
        for (name, value) in &call.options {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("  {:<14}: {}", name, shown));
        }
    }

    Ok(CommandOutput::new(lines.join("\n"), object))
}
