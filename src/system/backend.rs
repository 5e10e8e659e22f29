//! # Backend Invoke
//!
//! Runs an [`Invocation`] and reduces whatever happened to one [`DispatchResult`].
//!
//! A remote process speaks the backend protocol: any number of free-form stdout
//! lines, followed by one final line holding a JSON object
//! `{"error_status": int, "output": string, "object": any, "log": [...]}`. The
//! free-form lines and the captured stderr travel along as log entries.
//!
//! [`invoke`] never fails. Spawn errors, timeouts, cancellation and malformed
//! payloads are all reported inside the returned result.

use crate::CancellationToken;
use crate::constants::GENERIC_ERROR_STATUS;
use crate::models::{DispatchResult, Invocation, LocalCall, LogEntry, RemoteCall};
use crate::system::executor::{self, ExecutionError};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Could not start '{program}': {message}")]
    SpawnFailed { program: String, message: String },
    #[error("The command did not end its output with a result object: {0}")]
    MalformedPayload(String),
    #[error("'{program}' did not finish within {seconds}s and was killed.")]
    Timeout { program: String, seconds: u64 },
    #[error("Operation was cancelled by the user.")]
    Cancelled,
}

/// What an in-process command handler produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub output: String,
    pub object: Value,
}

impl CommandOutput {
    pub fn new(output: impl Into<String>, object: Value) -> Self {
        Self {
            output: output.into(),
            object,
        }
    }
}

/// The seam between the invoke protocol and the commands this binary knows how to
/// run in-process.
pub trait CommandTable: Sync {
    fn run_local(&self, call: &LocalCall) -> anyhow::Result<CommandOutput>;
}

#[derive(Debug, Clone)]
pub struct InvokeSettings {
    pub timeout: Option<Duration>,
    pub cancellation: CancellationToken,
}

impl Default for InvokeSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            cancellation: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Executes `invocation` and returns its uniform result.
pub fn invoke(
    invocation: &Invocation,
    table: &dyn CommandTable,
    settings: &InvokeSettings,
) -> DispatchResult {
    match invocation {
        Invocation::Local(call) => invoke_local(call, table),
        Invocation::Remote(call) => invoke_remote(call, settings),
    }
}

fn invoke_local(call: &LocalCall, table: &dyn CommandTable) -> DispatchResult {
    match table.run_local(call) {
        Ok(output) => DispatchResult::success(output.output, output.object),
        Err(e) => {
            let message = format!("{:#}", e);
            log::debug!("Local command '{}' failed: {}", call.command, message);
            let mut result = DispatchResult::success(message.clone(), Value::Null);
            result.error_status = GENERIC_ERROR_STATUS;
            result.log.push(LogEntry::now("error", message));
            result
        }
    }
}

fn invoke_remote(call: &RemoteCall, settings: &InvokeSettings) -> DispatchResult {
    let captured = match executor::run_captured(
        &call.program,
        &call.args,
        None,
        settings.timeout,
        &settings.cancellation,
    ) {
        Ok(captured) => captured,
        Err(ExecutionError::Cancelled) => {
            return DispatchResult::from_failure(BackendError::Cancelled, String::new());
        }
        Err(e) => {
            let message = e.to_string();
            return DispatchResult::from_failure(
                BackendError::SpawnFailed {
                    program: call.program.clone(),
                    message: message.clone(),
                },
                message,
            );
        }
    };

    let mut result = if captured.timed_out {
        let seconds = settings.timeout.map_or(0, |t| t.as_secs());
        let mut result = DispatchResult::from_failure(
            BackendError::Timeout {
                program: call.program.clone(),
                seconds,
            },
            captured.stdout.clone(),
        );
        result.log.extend(info_lines(&captured.stdout));
        result
    } else {
        match parse_backend_output(&captured.stdout) {
            Ok(mut result) => {
                if result.error_status == 0
                    && let Some(code) = captured.status.filter(|code| *code != 0)
                {
                    log::debug!(
                        "'{}' reported success but exited with {}",
                        call.site,
                        code
                    );
                    result.error_status = code;
                }
                if captured.status.is_none() && result.error_status == 0 {
                    result.error_status = GENERIC_ERROR_STATUS;
                }
                result
            }
            Err(e) => {
                log::debug!("Backend output of '{}' unusable: {}", call.site, e);
                let mut result = DispatchResult::from_failure(e, captured.stdout.clone());
                result.log.extend(info_lines(&captured.stdout));
                result
            }
        }
    };

    result.log.extend(
        captured
            .stderr
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| LogEntry::now("stderr", line)),
    );
    result
}

fn info_lines(text: &str) -> impl Iterator<Item = LogEntry> + '_ {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| LogEntry::now("info", line))
}

/// Parses the stdout of a backend process.
///
/// The last non-empty line must be a JSON object with an integer `error_status`;
/// `output`, `object` and `log` default when absent. Every earlier non-empty line
/// becomes an `info` log entry placed before the payload's own entries.
pub fn parse_backend_output(stdout: &str) -> Result<DispatchResult, BackendError> {
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    let (last, preceding) = lines
        .split_last()
        .ok_or_else(|| BackendError::MalformedPayload("no output".to_string()))?;

    let payload: Value = serde_json::from_str(last.trim())
        .map_err(|e| BackendError::MalformedPayload(format!("last line is not JSON ({})", e)))?;
    if !payload.is_object() {
        return Err(BackendError::MalformedPayload(
            "last line is not a JSON object".to_string(),
        ));
    }
    if !payload.get("error_status").is_some_and(Value::is_i64) {
        return Err(BackendError::MalformedPayload(
            "missing integer 'error_status'".to_string(),
        ));
    }

    let mut result: DispatchResult = serde_json::from_value(payload)
        .map_err(|e| BackendError::MalformedPayload(e.to_string()))?;

    let mut log: Vec<LogEntry> = preceding
        .iter()
        .map(|line| LogEntry::now("info", *line))
        .collect();
    log.append(&mut result.log);
    result.log = log;
    Ok(result)
}

// --- BACKEND MODE LOGGING ---

/// A `log` implementation that keeps records in memory so they can travel in the
/// `log` array of the final backend payload.
pub struct BackendLogCollector {
    entries: Mutex<Vec<LogEntry>>,
}

static COLLECTOR: BackendLogCollector = BackendLogCollector {
    entries: Mutex::new(Vec::new()),
};

impl Log for BackendLogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let kind = match record.level() {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        let entry = LogEntry::now(kind, record.args().to_string());
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    fn flush(&self) {}
}

/// Routes the `log` facade into the backend collector.
pub fn install_backend_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&COLLECTOR)?;
    log::set_max_level(level);
    Ok(())
}

/// Drains everything collected so far.
pub fn take_backend_log() -> Vec<LogEntry> {
    std::mem::take(
        &mut *COLLECTOR
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()),
    )
}

/// The final stdout line of a backend-mode run: `result` with the collected log
/// entries placed before its own.
pub fn backend_wire_line(mut result: DispatchResult) -> String {
    let mut log = take_backend_log();
    log.append(&mut result.log);
    result.log = log;
    result.to_wire_line()
}
