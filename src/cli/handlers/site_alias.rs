// src/cli/handlers/site_alias.rs

use crate::{
    cli::{args::CommandLine, handlers::commons::Session},
    core::token::parse_token,
    models::{DispatchResult, SiteRecord},
};
use anyhow::Result;
use serde_json::{Map, Value};

/// The `site-alias` command.
///
/// Without a token it lists every alias on the search path. With one it prints the
/// resolved record(s) as JSON; groups and site lists print every member.
pub fn handle(session: &mut Session, line: &CommandLine) -> Result<DispatchResult> {
    let token = match (&line.token, line.args.first()) {
        (Some(token), _) => Some(token.clone()),
        (None, Some(raw)) => Some(parse_token(raw)?),
        (None, None) => None,
    };

    let Some(token) = token else {
        let names: Vec<String> = session
            .resolver
            .alias_names()?
            .into_iter()
            .map(|name| format!("@{}", name))
            .collect();
        if names.is_empty() {
            log::warn!("{}", t!("site_alias.info.none_found"));
        }
        let object = Value::from(names.clone());
        return Ok(DispatchResult::success(names.join("\n"), object));
    };

    let records = session.resolver.resolve_targets(&token)?;
    let object = records_to_object(&records)?;
    let output = serde_json::to_string_pretty(&object)?;
    Ok(DispatchResult::success(output, object))
}

fn records_to_object(records: &[SiteRecord]) -> Result<Value> {
    let mut object = Map::new();
    for record in records {
        object.insert(record.name.clone(), serde_json::to_value(record)?);
    }
    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_are_keyed_by_name() {
        let records = vec![
            SiteRecord {
                name: "@mysite.dev".to_string(),
                root: "/path/to/drupal".to_string(),
                ..Default::default()
            },
            SiteRecord {
                name: "@mysite.live".to_string(),
                remote_host: Some("web1".to_string()),
                ..Default::default()
            },
        ];
        let object = records_to_object(&records).unwrap();
        assert_eq!(object["@mysite.dev"]["root"], json!("/path/to/drupal"));
        assert_eq!(object["@mysite.live"]["remote-host"], json!("web1"));
        assert!(object["@mysite.dev"].get("remote-host").is_none());
    }
}
