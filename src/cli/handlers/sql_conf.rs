// src/cli/handlers/sql_conf.rs

use crate::{models::LocalCall, system::backend::CommandOutput};
use anyhow::{Result, anyhow};
use serde_json::Value;

/// The `sql-conf` command: prints the connection settings of the site.
///
/// By default only `databases.<database>.<target>` is shown (both `default` unless
/// given); `--all` prints the whole `databases` table.
pub fn handle(call: &LocalCall) -> Result<CommandOutput> {
    let databases = call
        .site
        .databases
        .as_ref()
        .ok_or_else(|| anyhow!(t!("sql_conf.error.no_databases"), site = call.site.name))?;

    let selected = if call.options.get("all") == Some(&Value::Bool(true)) {
        databases.clone()
    } else {
        let database = option_str(call, "database");
        let target = option_str(call, "target");
        databases
            .get(database)
            .and_then(|db| db.get(target))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    t!("sql_conf.error.no_connection"),
                    database = database,
                    target = target,
                    site = call.site.name
                )
            })?
    };

    let output = serde_json::to_string_pretty(&selected)?;
    Ok(CommandOutput::new(output, selected))
}

fn option_str<'a>(call: &'a LocalCall, name: &str) -> &'a str {
    call.options
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or("default")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteRecord;
    use serde_json::json;

    fn call_with(databases: Option<Value>, options: &[(&str, Value)]) -> LocalCall {
        LocalCall {
            site: SiteRecord {
                name: "@dev".to_string(),
                databases,
                ..Default::default()
            },
            command: "sql-conf".to_string(),
            remote_script: crate::constants::DEFAULT_REMOTE_SCRIPT.to_string(),
            args: Vec::new(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_default_connection_and_all() {
        let databases = json!({
            "default": { "default": { "driver": "mysql", "database": "drupal" } },
            "legacy": { "default": { "driver": "pgsql" } }
        });

        let default = handle(&call_with(Some(databases.clone()), &[])).unwrap();
        assert_eq!(default.object["driver"], json!("mysql"));
        assert!(default.output.contains("drupal"));

        let legacy = handle(&call_with(Some(databases.clone()), &[("database", json!("legacy"))])).unwrap();
        assert_eq!(legacy.object["driver"], json!("pgsql"));

        let all = handle(&call_with(Some(databases.clone()), &[("all", json!(true))])).unwrap();
        assert_eq!(all.object, databases);
    }

    #[test]
    fn test_missing_databases() {
        let error = handle(&call_with(None, &[])).unwrap_err();
        assert!(error.to_string().contains("@dev"));
        assert!(handle(&call_with(Some(json!({})), &[])).is_err());
    }
}
