// src/system/executor.rs

use crate::CancellationToken;
use crate::constants::GENERIC_ERROR_STATUS;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected once a timed child is gone. A grandchild can
/// keep the pipes open long after the child itself was killed.
const READER_GRACE: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{program}' could not be executed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Operation was cancelled by the user.")]
    Cancelled,
}

impl ExecutionError {
    /// Whether the program itself could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

/// What a captured child process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Exit code; `None` when the process was killed or ended by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

pub fn is_cancelled(cancellation_token: &CancellationToken) -> bool {
    cancellation_token.load(Ordering::SeqCst)
}

/// Runs a program to completion with stdout and stderr captured.
///
/// The wait loop checks the cancellation token and the optional timeout. On timeout
/// the child is killed and whatever it printed so far is returned with
/// `timed_out` set; cancellation is reported as [`ExecutionError::Cancelled`].
pub fn run_captured(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
    cancellation_token: &CancellationToken,
) -> Result<CapturedOutput, ExecutionError> {
    if is_cancelled(cancellation_token) {
        return Err(ExecutionError::Cancelled);
    }

    let mut command = StdCommand::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dunce::simplified(dir));
    }

    let mut child = command.spawn().map_err(|e| ExecutionError::Spawn {
        program: program.to_string(),
        source: e,
    })?;
    log::debug!("Spawned '{}' (PID: {})", program, child.id());

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let expired = |elapsed: Duration| timeout.is_some_and(|limit| elapsed >= limit);
    let outcome = wait_loop(&mut child, program, cancellation_token, expired, started);

    let deadline = match &outcome {
        Ok(WaitOutcome::Exited(_)) if timeout.is_none() => None,
        _ => Some(Instant::now() + READER_GRACE),
    };
    let stdout = drain_reader(stdout_reader, deadline);
    let stderr = drain_reader(stderr_reader, deadline);

    match outcome? {
        WaitOutcome::Exited(status) => Ok(CapturedOutput {
            status: status.code(),
            stdout,
            stderr,
            timed_out: false,
        }),
        WaitOutcome::TimedOut => {
            log::warn!(
                "'{}' exceeded its time limit after {:.1}s and was killed",
                program,
                started.elapsed().as_secs_f64()
            );
            Ok(CapturedOutput {
                status: None,
                stdout,
                stderr,
                timed_out: true,
            })
        }
    }
}

/// Runs a program attached to the terminal and returns its exit code.
pub fn run_interactive(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    cancellation_token: &CancellationToken,
) -> Result<i32, ExecutionError> {
    let mut command = StdCommand::new(program);
    command
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        command.current_dir(dunce::simplified(dir));
    }

    let mut child = command.spawn().map_err(|e| ExecutionError::Spawn {
        program: program.to_string(),
        source: e,
    })?;

    match wait_loop(&mut child, program, cancellation_token, |_| false, Instant::now())? {
        WaitOutcome::Exited(status) => Ok(status.code().unwrap_or(GENERIC_ERROR_STATUS)),
        WaitOutcome::TimedOut => Ok(GENERIC_ERROR_STATUS),
    }
}

/// Starts a program without waiting for it, e.g. a browser.
pub fn spawn_detached(program: &str, args: &[String]) -> Result<(), ExecutionError> {
    StdCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|child| log::debug!("Launched '{}' (PID: {})", program, child.id()))
        .map_err(|e| ExecutionError::Spawn {
            program: program.to_string(),
            source: e,
        })
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
}

/// Non-blocking wait loop. Kills the child on cancellation or when `expired` says so.
fn wait_loop(
    child: &mut Child,
    program: &str,
    cancellation_token: &CancellationToken,
    expired: impl Fn(Duration) -> bool,
    started: Instant,
) -> Result<WaitOutcome, ExecutionError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(WaitOutcome::Exited(status)),
            Ok(None) => {
                let cancelled = is_cancelled(cancellation_token);
                if cancelled || expired(started.elapsed()) {
                    log::debug!("Killing child process (PID: {})...", child.id());
                    if let Err(e) = child.kill() {
                        log::warn!("Failed to kill child process {}: {}", child.id(), e);
                    }
                    child.wait().ok();
                    return if cancelled {
                        Err(ExecutionError::Cancelled)
                    } else {
                        Ok(WaitOutcome::TimedOut)
                    };
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(ExecutionError::Wait {
                    program: program.to_string(),
                    source: e,
                });
            }
        }
    }
}

/// Forwards a pipe in chunks, so a caller giving up early keeps what was read.
fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let bytes = chunk.get(..n).map(<[u8]>::to_vec).unwrap_or_default();
                    if sender.send(bytes).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    log::trace!("Stopped reading child output: {}", e);
                    break;
                }
            }
        }
    });
    receiver
}

/// Collects a reader's output until the pipe closes or `deadline` passes.
fn drain_reader(reader: Option<Receiver<Vec<u8>>>, deadline: Option<Instant>) -> String {
    let Some(receiver) = reader else {
        return String::new();
    };

    let mut buffer = Vec::new();
    loop {
        let next = match deadline {
            Some(deadline) => {
                receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(chunk) => buffer.extend(chunk),
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("Output pipe is still held open; keeping what was read so far");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn token() -> CancellationToken {
        Arc::new(AtomicBool::new(false))
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_captures_both_streams_and_status() {
        let output = run_captured("sh", &sh("echo out; echo err >&2; exit 3"), None, None, &token()).unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.status, Some(3));
        assert!(!output.timed_out);
    }

    #[test]
    fn test_timeout_kills_the_child() {
        let output = run_captured(
            "sh",
            &sh("echo started; exec sleep 5"),
            None,
            Some(Duration::from_millis(200)),
            &token(),
        )
        .unwrap();
        assert!(output.timed_out);
        assert_eq!(output.status, None);
    }

    #[test]
    fn test_timeout_returns_while_a_grandchild_holds_the_pipes() {
        let started = Instant::now();
        let output = run_captured(
            "sh",
            &sh("echo started; sleep 4; echo done"),
            None,
            Some(Duration::from_millis(200)),
            &token(),
        )
        .unwrap();

        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert_eq!(output.stdout, "started\n");
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancelled = token();
        cancelled.store(true, Ordering::SeqCst);
        assert!(matches!(
            run_captured("sh", &sh("true"), None, None, &cancelled),
            Err(ExecutionError::Cancelled)
        ));
    }

    #[test]
    fn test_missing_program() {
        let error = run_captured("definitely-not-a-program-xyz", &[], None, None, &token()).unwrap_err();
        assert!(error.is_not_found());
    }
}
