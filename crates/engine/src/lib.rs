// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! svcsup-engine: the process launcher and the driving loop that ties a
//! [`svcsup_core::Registry`] to real OS collaborators (fork/exec, a clock,
//! a signal feed) one tick at a time.

mod error;
mod launcher;
mod supervisor;

pub use error::EngineError;
pub use launcher::Launcher;
pub use supervisor::Supervisor;
