// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::service::{ServiceName, ServiceState};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service name {0:?} is invalid")]
    InvalidName(String),

    #[error("service {0:?} is not known")]
    NotFound(String),

    #[error("handle does not refer to a live service")]
    InvalidHandle,

    #[error("{op} is not valid for service {name:?} in state {from:?}")]
    InvalidTransition {
        name: ServiceName,
        from: ServiceState,
        op: &'static str,
    },

    #[error("restart interval must be at least one whole second")]
    RestartIntervalTooShort,

    #[error(transparent)]
    Var(#[from] VarError),

    #[error("signal send failed: {0}")]
    Signal(#[source] nix::Error),
}

#[derive(Debug, Error)]
pub enum VarError {
    #[error("variable name {0:?} contains '=' or NUL")]
    InvalidName(String),

    #[error("variable value contains NUL")]
    InvalidValue,

    #[error("unrecognized trigger token {0:?}")]
    UnknownTrigger(String),

    #[error("variable store is full (capacity {capacity} bytes)")]
    StoreFull { capacity: usize },
}
