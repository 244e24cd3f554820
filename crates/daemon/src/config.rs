// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: where its state lives and what it loads at
//! startup. There is no persisted *service* state; only the lock file,
//! log file and the optional declarative service manifest live under
//! [`Config::state_dir`].

use std::path::PathBuf;

use crate::env;
use crate::error::DaemonError;

/// Daemon configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. `~/.local/state/svcsupd`).
    pub state_dir: PathBuf,
    /// Path to the single-instance lock/PID file.
    pub lock_path: PathBuf,
    /// Path to the daemon log file.
    pub log_path: PathBuf,
    /// Declarative service manifest loaded at startup, if any
    /// (`SVCSUPD_SERVICES` or `<state_dir>/services.json`).
    pub services_path: Option<PathBuf>,
    /// How often the active sweep polls beyond its own wake deadline.
    pub poll_interval: std::time::Duration,
    /// Fixed-capacity control-socket pool size.
    pub controller_capacity: usize,
}

const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);
const DEFAULT_CONTROLLER_CAPACITY: usize = 64;

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/svcsupd/` (or
    /// `$XDG_STATE_HOME/svcsupd/`) — one daemon per user, no project root
    /// to resolve against.
    pub fn load() -> Result<Self, DaemonError> {
        let state_dir = env::state_dir()?;

        let services_path = match std::env::var("SVCSUPD_SERVICES") {
            Ok(p) => Some(PathBuf::from(p)),
            Err(_) => {
                let default = crate::services::default_path(&state_dir);
                default.exists().then_some(default)
            }
        };

        Ok(Self {
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            services_path,
            poll_interval: env::poll_interval_ms().unwrap_or(DEFAULT_POLL_INTERVAL),
            controller_capacity: env::controller_capacity().unwrap_or(DEFAULT_CONTROLLER_CAPACITY),
            state_dir,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
