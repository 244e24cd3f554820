// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! svcsupd
//!
//! A process-supervision daemon: loads a declarative service manifest,
//! forks and reaps the processes it names, and restarts them per their
//! back-off policy.
//!
//! Runs on a current-thread tokio runtime rather than the default
//! multi-threaded one. The signal mask `SignalFeed` sets up only covers
//! the thread that called it; a multi-threaded runtime would leave
//! worker threads unmasked and able to steal a signal meant for the
//! signalfd, which would silently stall the active sweep. This also
//! matches the single-threaded, cooperative scheduling model the core
//! was built around.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::time::{Duration, SystemTime};

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use svcsup_daemon::{config::Config, error::DaemonError, lifecycle};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("svcsupd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("svcsupd {}", env!("CARGO_PKG_VERSION"));
                println!("Process-supervision daemon");
                println!();
                println!("USAGE:");
                println!("    svcsupd");
                println!();
                println!("Loads the service manifest at $SVCSUPD_SERVICES (or");
                println!("<state dir>/services.json) and supervises the processes it");
                println!("names until terminated.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: svcsupd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!("starting svcsupd");

    let mut daemon = match lifecycle::startup(config.clone()) {
        Ok(d) => d,
        Err(DaemonError::LockFailed(path, _)) => {
            let pid = std::fs::read_to_string(&path).unwrap_or_default();
            eprintln!("svcsupd is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!("failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("svcsupd ready");
    println!("READY");

    loop {
        let deadline = daemon.step()?;
        let sleep_for = deadline
            .map(duration_until)
            .unwrap_or(daemon.config.poll_interval)
            .min(daemon.config.poll_interval);

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    daemon.shutdown();
    info!("svcsupd stopped");
    Ok(())
}

/// How long to sleep before a deadline the registry asked to be woken at.
/// Zero if it has already passed.
fn duration_until(deadline: svcsup_core::Timestamp) -> Duration {
    let now = svcsup_core::Timestamp::from_system_time(SystemTime::now());
    let secs = deadline.as_secs_f64() - now.as_secs_f64();
    if secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(secs)
    }
}

fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- svcsupd: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), DaemonError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(
        file,
        "{}{}) ---\n",
        STARTUP_MARKER_PREFIX,
        std::process::id()
    )?;

    Ok(())
}

fn write_startup_error(config: &Config, error: &DaemonError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(DaemonError::NoStateDir)?,
        config.log_path.file_name().ok_or(DaemonError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
