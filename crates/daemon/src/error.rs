// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock at {0}: daemon already running?")]
    LockFailed(PathBuf, #[source] std::io::Error),

    #[error("failed to read service definitions from {0}: {1}")]
    ServicesFile(PathBuf, #[source] std::io::Error),

    #[error("service definitions at {0} are not valid JSON: {1}")]
    ServicesParse(PathBuf, #[source] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Service(#[from] svcsup_core::ServiceError),

    #[error(transparent)]
    Var(#[from] svcsup_core::VarError),

    #[error(transparent)]
    Engine(#[from] svcsup_engine::EngineError),

    #[error("failed to block signals: {0}")]
    Signal(#[source] nix::Error),
}
