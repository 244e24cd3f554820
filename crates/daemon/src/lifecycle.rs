// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup (acquire the single-instance lock, wire the
//! registry to real adapters, load the service manifest) and shutdown
//! (release the lock). There is no WAL or snapshot to manage here:
//! everything the daemon owns while running lives in memory, in the
//! `Registry`.

use std::fs::File;
use std::io::Write;

use fs2::FileExt;
use nix::sys::signal::Signal;
use tracing::{info, warn};

use svcsup_adapters::{NixSignalNames, SignalFeed, SocketControllerPool, StaticFdRegistry, TracingNotifySink};
use svcsup_core::ports::SignalNames;
use svcsup_core::{Registry, SystemClock, Timestamp};
use svcsup_engine::{Launcher, Supervisor};

use crate::config::Config;
use crate::error::DaemonError;
use crate::services::{self, ServiceSpec};

/// A running daemon: the supervisor plus whatever needs to be torn down
/// on exit.
pub struct DaemonState {
    pub config: Config,
    pub supervisor: Supervisor,
    // Held only to retain the exclusive lock; released on drop.
    #[allow(dead_code)]
    lock_file: File,
}

impl DaemonState {
    /// One active-sweep pass plus a drain of any children that have
    /// already exited. Returns the earliest deadline the registry asked
    /// to be revisited at.
    pub fn step(&mut self) -> Result<Option<Timestamp>, DaemonError> {
        self.supervisor.reap_available()?;
        Ok(self.supervisor.tick())
    }

    pub fn shutdown(&mut self) {
        info!("shutting down");
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove lock file");
            }
        }
    }
}

/// Acquire the lock, build the registry wired to real adapters, and load
/// the service manifest if configured. Returns the ready-to-run state.
pub fn startup(config: Config) -> Result<DaemonState, DaemonError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|e| DaemonError::LockFailed(config.lock_path.clone(), e))?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let specs: Vec<ServiceSpec> = match &config.services_path {
        Some(path) => services::load_from_file(path)?,
        None => Vec::new(),
    };

    let mut registry = Registry::new();
    let signal_names = NixSignalNames;
    let now = Timestamp::from_system_time(std::time::SystemTime::now());
    services::apply_all(&mut registry, &specs, &signal_names, now)?;

    let trigger_signals = resolve_trigger_signals(&specs, &signal_names);
    let mut watched: Vec<Signal> = vec![Signal::SIGCHLD];
    watched.extend(trigger_signals);
    watched.dedup();

    let signal_feed = SignalFeed::new(&watched).map_err(DaemonError::Signal)?;
    let fds = StaticFdRegistry::new()?;

    let supervisor = Supervisor::new(
        registry,
        Box::new(SystemClock::new()),
        Box::new(signal_feed),
        Box::new(Launcher::new()),
        Box::new(TracingNotifySink),
        Box::new(fds),
        Box::new(SocketControllerPool::new(config.controller_capacity)),
    );

    info!(services = specs.len(), "daemon started");
    Ok(DaemonState {
        config,
        supervisor,
        lock_file,
    })
}

/// Resolve every trigger token across `specs` to a [`Signal`], skipping
/// `always` and anything that fails to resolve (already rejected earlier
/// by [`services::apply_all`] if it made it into a record).
fn resolve_trigger_signals(specs: &[ServiceSpec], names: &dyn SignalNames) -> Vec<Signal> {
    specs
        .iter()
        .filter_map(|s| s.triggers.as_deref())
        .flat_map(|t| t.split('\t'))
        .filter(|tok| *tok != "always" && !tok.is_empty())
        .filter_map(|tok| names.num_by_name(tok))
        .filter_map(|num| Signal::try_from(num).ok())
        .collect()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
