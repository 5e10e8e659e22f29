// src/cli/handlers/browse.rs

use crate::{
    cli::{args::CommandLine, dispatcher::Registry, handlers::commons::Session},
    core::dispatch::is_remote,
    models::{DispatchResult, Invocation, OptionMap, SiteRecord},
    system::{
        backend::{self, InvokeSettings},
        executor,
    },
};
use anyhow::{Result, anyhow};
use serde_json::{Value, json};

const COMMAND: &str = "browse";

/// The `browse` command: opens the site (or a path below it) in a browser.
///
/// For a remote site the URL is asked from the site's host, which knows its own
/// base URL; the browser still runs here.
pub fn handle(session: &mut Session, line: &CommandLine) -> Result<DispatchResult> {
    let site = session.single_target(line.token.as_ref())?;
    let path = line.args.first().map(String::as_str);

    let url = if is_remote(&site) {
        let mut options = OptionMap::new();
        options.insert("browser".to_string(), Value::from("0"));
        let invocation = session
            .engine
            .build_invocation(&site, COMMAND, &line.args, &options)?;
        if session.flags.simulate
            && let Invocation::Remote(call) = &invocation
        {
            return Ok(DispatchResult::success(call.command_line(), Value::Null));
        }
        remote_url(&invocation, &session.invoke_settings)?
    } else {
        site_url(&site, path)?
    };

    let choice = line
        .options
        .get("browser")
        .or(session.settings.browser.as_ref())
        .cloned();
    let Some(browser) = browser_command(choice.as_ref()) else {
        return Ok(DispatchResult::success(url.clone(), json!({ "url": url })));
    };

    let (program, mut args) = browser
        .split_first()
        .map(|(program, rest)| (program.clone(), rest.to_vec()))
        .ok_or_else(|| anyhow!(t!("browse.error.no_browser")))?;
    args.push(url.clone());

    if session.flags.simulate {
        let mut argv = vec![program];
        argv.extend(args);
        return Ok(DispatchResult::success(argv.join(" "), json!({ "url": url })));
    }

    session.announce(&format!("{} {}", program, args.join(" ")));
    executor::spawn_detached(&program, &args)?;
    Ok(DispatchResult::success(url.clone(), json!({ "url": url })))
}

/// Runs a redispatched `browse` and takes the URL from its result object.
fn remote_url(invocation: &Invocation, settings: &InvokeSettings) -> Result<String> {
    let site = match invocation {
        Invocation::Remote(call) => call.site.clone(),
        Invocation::Local(call) => call.site.name.clone(),
    };
    let result = backend::invoke(invocation, &Registry, settings);
    if !result.is_success() {
        return Err(anyhow!(
            t!("browse.error.remote_failed"),
            site = site,
            status = result.error_status,
            message = result.output.trim()
        ));
    }
    result
        .object
        .get("url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!(t!("browse.error.no_remote_url"), site = site))
}

/// `uri` plus an optional path. A bare host name gets `http://`.
pub fn site_url(site: &SiteRecord, path: Option<&str>) -> Result<String> {
    let uri = site.uri.trim().trim_end_matches('/');
    if uri.is_empty() {
        return Err(anyhow!(t!("browse.error.no_uri"), site = site.name));
    }
    let base = if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else if uri == "default" {
        "http://localhost".to_string()
    } else {
        format!("http://{}", uri)
    };

    match path.map(|p| p.trim_start_matches('/')).filter(|p| !p.is_empty()) {
        Some(path) => Ok(format!("{}/{}", base, path)),
        None => Ok(base),
    }
}

/// The browser argv. `None` means print the URL only (`false`, `0` or `"false"`).
fn browser_command(choice: Option<&Value>) -> Option<Vec<String>> {
    match choice {
        Some(Value::Bool(false)) => None,
        Some(Value::Number(n)) if n.as_i64() == Some(0) => None,
        Some(Value::String(s)) if matches!(s.trim(), "0" | "false" | "") => None,
        Some(Value::String(s)) => {
            Some(shlex::split(s).unwrap_or_else(|| vec![s.to_string()]))
        }
        _ => Some(default_browser()),
    }
}

fn default_browser() -> Vec<String> {
    let argv: &[&str] = if cfg!(target_os = "windows") {
        &["cmd", "/C", "start", ""]
    } else if cfg!(target_os = "macos") {
        &["open"]
    } else {
        &["xdg-open"]
    };
    argv.iter().map(|s| s.to_string()).collect()
}
