// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by the engine loop itself, as opposed to per-service
/// [`svcsup_core::VarError`]/[`svcsup_core::ServiceError`] which setters
/// already report to their caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("waitpid failed: {0}")]
    Wait(#[source] nix::Error),

    #[error(transparent)]
    Service(#[from] svcsup_core::ServiceError),
}
