// src/cli/handlers/version.rs

use crate::{models::LocalCall, system::backend::CommandOutput};
use anyhow::Result;
use serde_json::json;

/// The `version` command. Answered by whichever side runs it, so against a remote
/// site it reports the remote installation's version.
pub fn handle(_call: &LocalCall) -> Result<CommandOutput> {
    let version = env!("CARGO_PKG_VERSION");
    Ok(CommandOutput::new(version, json!({ "version": version })))
}
