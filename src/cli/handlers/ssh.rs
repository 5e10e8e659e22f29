// src/cli/handlers/ssh.rs

use crate::{
    cli::{args::CommandLine, handlers::commons::Session},
    core::dispatch::{DispatchEngine, is_remote, quote_for},
    models::{DispatchResult, RemoteCall, SiteRecord},
    system::executor,
};
use anyhow::Result;
use serde_json::Value;
use std::env;
use std::path::Path;

/// Shell started when `site-ssh` gets no command.
const LOGIN_SHELL: &str = "bash -l";

/// The `site-ssh` command: an interactive shell (or one command) in the site root.
pub fn handle(session: &mut Session, line: &CommandLine) -> Result<DispatchResult> {
    let site = session.single_target(line.token.as_ref())?;
    let call = build_call(&session.engine, &site, &line.args)?;
    let command_line = call.command_line();

    if session.flags.simulate {
        return Ok(DispatchResult::success(command_line, Value::Null));
    }

    session.announce(&command_line);
    let cwd = (!is_remote(&site) && !site.root.is_empty()).then(|| Path::new(&site.root));
    let status = executor::run_interactive(
        &call.program,
        &call.args,
        cwd,
        &session.invoke_settings.cancellation,
    )?;

    let mut result = DispatchResult::success(String::new(), Value::Null);
    result.error_status = status;
    Ok(result)
}

fn build_call(engine: &DispatchEngine, site: &SiteRecord, args: &[String]) -> Result<RemoteCall> {
    if !is_remote(site) {
        return Ok(local_shell(site, args));
    }

    let inner = if args.is_empty() {
        LOGIN_SHELL.to_string()
    } else {
        args.join(" ")
    };
    let remote_command = if site.root.is_empty() {
        inner
    } else {
        format!("cd {} && {}", quote_for(site.target_os(), &site.root)?, inner)
    };

    let mut ssh_args = engine.ssh_prefix(site);
    let host = ssh_args.pop().unwrap_or_default();
    ssh_args.push("-t".to_string());
    ssh_args.push(host);
    ssh_args.push(remote_command);

    Ok(RemoteCall {
        site: site.name.clone(),
        program: engine.settings().ssh_binary.clone(),
        args: ssh_args,
    })
}

/// Local sites get a shell of their own, started in the site root.
fn local_shell(site: &SiteRecord, args: &[String]) -> RemoteCall {
    let windows = cfg!(target_os = "windows");
    let (program, mut shell_args) = if windows {
        ("cmd".to_string(), vec!["/C".to_string()])
    } else {
        (
            env::var("SHELL").unwrap_or_else(|_| "sh".to_string()),
            vec!["-c".to_string()],
        )
    };

    if args.is_empty() {
        shell_args.clear();
    } else {
        shell_args.push(args.join(" "));
    }

    RemoteCall {
        site: site.name.clone(),
        program,
        args: shell_args,
    }
}
