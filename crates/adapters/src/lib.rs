// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Real implementations of `svcsup-core::ports` for the external
//! collaborators the core state machine treats as out of scope: the
//! signal feed, the fd registry, the control-socket pool and the
//! notification sink. One trait, one production adapter apiece — fakes
//! for tests live behind `svcsup-core::test_support` / each crate's own
//! `test-support` feature instead of here.

pub mod controllers;
pub mod fds;
pub mod notify;
pub mod signals;

pub use controllers::SocketControllerPool;
pub use fds::StaticFdRegistry;
pub use notify::TracingNotifySink;
pub use signals::{NixSignalNames, SignalFeed};
