// src/bin/siteshell.rs

use clap::Parser;
use colored::*;
use log::LevelFilter;
use siteshell::{
    cli::{Cli, dispatcher},
    constants::GENERIC_ERROR_STATUS,
    models::DispatchResult,
    system::{backend, executor},
    t,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Exit status for a run the user cancelled, as a shell reports SIGINT.
const CANCELLED_STATUS: i32 = 130;

fn main() {
    let cancellation_token = Arc::new(AtomicBool::new(false));
    let cli = Cli::parse();
    let backend_mode = cli.wants_backend();

    // In backend mode the log travels inside the result line instead of stderr.
    if backend_mode {
        if backend::install_backend_logger(LevelFilter::Info).is_err() {
            env_logger::init();
        }
    } else {
        env_logger::init();
    }

    let status = match dispatcher::dispatch(cli, cancellation_token) {
        Ok(status) => status,
        Err(e) => {
            let cancelled = e
                .downcast_ref::<executor::ExecutionError>()
                .is_some_and(|err| matches!(err, executor::ExecutionError::Cancelled));

            if backend_mode {
                let mut result = DispatchResult::success(e.to_string(), serde_json::Value::Null);
                result.error_status = if cancelled { CANCELLED_STATUS } else { GENERIC_ERROR_STATUS };
                println!("{}", backend::backend_wire_line(result));
            } else if cancelled {
                eprintln!("{}", t!("main.info.cancelled").yellow());
            } else {
                eprintln!("{} {}", t!("main.error.prefix").red().bold(), e);
            }

            if cancelled { CANCELLED_STATUS } else { GENERIC_ERROR_STATUS }
        }
    };

    std::process::exit(exit_code(status));
}

/// Process exit codes are a byte; anything outside that range reads as a plain failure.
fn exit_code(status: i32) -> i32 {
    if (0..=255).contains(&status) { status } else { GENERIC_ERROR_STATUS }
}
