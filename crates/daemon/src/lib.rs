// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `svcsupd`: a process-supervision daemon built on [`svcsup_core`]'s
//! service-record state machine and [`svcsup_engine`]'s launcher/reaper.
//!
//! This crate is mostly wiring: [`config`] resolves where the daemon's
//! state lives, [`services`] loads the declarative manifest that seeds
//! the registry, and [`lifecycle`] ties the registry to real adapters and
//! owns the single-instance lock. `main.rs` drives the resulting
//! [`lifecycle::DaemonState`] in a loop.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod services;

pub use config::Config;
pub use error::DaemonError;
pub use lifecycle::DaemonState;
pub use services::ServiceSpec;
