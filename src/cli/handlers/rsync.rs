// src/cli/handlers/rsync.rs

use crate::{
    cli::{args::CommandLine, dispatcher, handlers::commons::Session},
    core::transfer::{self, Endpoint, SitePath},
    models::{DispatchResult, OptionMap, Role, SiteRecord},
    system::executor::{self, ExecutionError},
};
use anyhow::{Result, anyhow};
use serde_json::Value;

const COMMAND: &str = "core-rsync";

/// The `core-rsync` command: `siteshell rsync @src:%files/ @dst:%files`.
pub fn handle(session: &mut Session, line: &CommandLine) -> Result<DispatchResult> {
    let (Some(source_raw), Some(target_raw)) = (line.args.first(), line.args.get(1)) else {
        return Err(anyhow!(t!("rsync.error.usage")));
    };
    if line.token.is_some() {
        log::warn!("{}", t!("rsync.warning.token_ignored"));
    }

    let source_path = transfer::parse_site_path(source_raw)?;
    let target_path = transfer::parse_site_path(target_raw)?;
    let source = endpoint(session, &source_path)?;
    let target = endpoint(session, &target_path)?;

    let aliases = dispatcher::find_command(COMMAND)
        .map(|def| def.aliases)
        .unwrap_or_default();
    let mut options: OptionMap =
        session
            .merger
            .merge(&source.site, COMMAND, aliases, Role::Source, &line.options);
    options.extend(
        session
            .merger
            .merge(&target.site, COMMAND, aliases, Role::Target, &line.options),
    );

    let call = transfer::build_rsync(
        &source,
        &target,
        &options,
        &session.engine,
        session.settings.rsync_binary.as_deref(),
    )?;
    let command_line = call.command_line();

    if session.flags.simulate {
        return Ok(DispatchResult::success(command_line, Value::Null));
    }

    let prompt = format!(
        t!("rsync.prompt.confirm"),
        source = describe(&source),
        target = describe(&target)
    );
    if !session.confirm(&prompt)? {
        return Err(ExecutionError::Cancelled.into());
    }

    session.announce(&command_line);
    let status = executor::run_interactive(
        &call.program,
        &call.args,
        None,
        &session.invoke_settings.cancellation,
    )?;

    let mut result = DispatchResult::success(String::new(), Value::Null);
    result.error_status = status;
    Ok(result)
}

fn endpoint(session: &mut Session, site_path: &SitePath) -> Result<Endpoint> {
    let site = match &site_path.alias {
        Some(token) => session.resolver.resolve(token)?,
        None => SiteRecord::none(),
    };
    Ok(Endpoint::evaluate(site, site_path, session.remote_script())?)
}

fn describe(endpoint: &Endpoint) -> String {
    match endpoint.site.remote_host() {
        Some(host) => format!("{}:{}", host, endpoint.path),
        None => endpoint.path.clone(),
    }
}
