// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::DaemonError;

/// Resolve the state directory: `SVCSUPD_STATE_DIR` > `XDG_STATE_HOME/svcsupd`
/// > `~/.local/state/svcsupd`.
pub fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("SVCSUPD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("svcsupd"));
    }
    let home = std::env::var("HOME").map_err(|_| DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/svcsupd"))
}

/// Active-sweep poll interval override, in milliseconds.
///
/// The core's scheduler only ever drives itself off a single wake
/// deadline; the daemon still polls at a bounded interval on top of that
/// deadline so a freshly-arrived signal isn't held up indefinitely by a
/// record with no pending deadline of its own.
pub fn poll_interval_ms() -> Option<Duration> {
    std::env::var("SVCSUPD_POLL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Controller-pool capacity override.
pub fn controller_capacity() -> Option<usize> {
    std::env::var("SVCSUPD_CONTROLLER_CAPACITY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
}
