// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real [`NotifySink`]: structured `tracing` events, one per state
//! transition. This port has no durable log of its own, so `tracing` is
//! the entire observability surface for `svcsup-core`'s transitions.

use nix::unistd::Pid;
use tracing::info;

use svcsup_core::ports::NotifySink;
use svcsup_core::ServiceState;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifySink;

impl NotifySink for TracingNotifySink {
    fn notify_state(&mut self, name: &str, state: ServiceState, pid: Option<Pid>) {
        info!(service = name, ?state, pid = pid.map(Pid::as_raw), "service state changed");
    }

    fn notify_reaped(&mut self, name: &str, wait_status: i32) {
        info!(service = name, wait_status, "service reaped");
    }
}
