// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trait boundaries for everything the service state machine needs from
//! the outside world but must not implement itself: the signal feed, the
//! fd and control-socket pools, process launching and state notification.
//! Real implementations live in `svcsup-adapters`; fakes for tests live
//! behind each crate's `test-support` feature.

use std::os::fd::RawFd;

use nix::unistd::Pid;
use thiserror::Error;

use crate::service::ServiceState;
use crate::timestamp::Timestamp;

/// A raw file descriptor handed across a port boundary. Newtype'd so
/// "which fd number" and "which named slot" can't be confused at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdHandle(pub RawFd);

/// One edge-triggered signal arrival, coalesced if several of the same
/// signal arrived before anyone asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvent {
    pub signum: i32,
    pub at: Timestamp,
    /// How many times this signal arrived since the last event drawn for it.
    pub count: u32,
}

/// Feed of signals the daemon has received, in arrival order.
pub trait SignalSource {
    /// Return the next event strictly after `after`, if any, consuming it.
    fn next_event(&mut self, after: Timestamp) -> Option<SignalEvent>;
}

/// Lookup of named file descriptors (e.g. `"null"`, `"stdin"`, a
/// pipe endpoint registered by the control protocol) to the real fd
/// number a service's fd-remap table may reference by name.
pub trait FdRegistry {
    fn lookup(&self, name: &str) -> Option<FdHandle>;
    fn register(&mut self, name: &str, fd: FdHandle);
    fn unregister(&mut self, name: &str);
}

/// Opaque handle to a slot acquired from a [`ControllerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerHandle(pub usize);

/// A bounded pool of control-socket pairs. Each launched service that asks
/// for a control channel is handed one parent-side fd to retain and one
/// child-side fd for the launcher to remap into the child's environment.
pub trait ControllerPool {
    /// Allocate a controller and its connected socket pair. `want_read`
    /// and `want_write` say which halves the caller actually needs: when
    /// a service only wires up one of `control.event`/`control.cmd`
    /// (not `control.socket`), the unused half of the pair is shut down on
    /// both ends so it behaves like a one-way pipe rather than a socket
    /// that can buffer unread data indefinitely. Returns the controller
    /// handle, the parent-side fd, and the child-side fd (for fd-remap).
    fn allocate(
        &mut self,
        want_read: bool,
        want_write: bool,
    ) -> Result<(ControllerHandle, FdHandle, FdHandle), LaunchError>;

    /// Called once the parent has confirmed a successful fork for this
    /// controller's service: closes the parent's retained copy of the
    /// child-side socket end. The controller itself stays allocated —
    /// [`ControllerPool::release`] is for when the service no longer needs
    /// a control channel at all (deleted, or reconfigured without one).
    fn child_launched(&mut self, handle: ControllerHandle);

    fn release(&mut self, handle: ControllerHandle);
}

/// Resolves signal names (`"SIGHUP"`) to signal numbers.
pub trait SignalNames {
    fn num_by_name(&self, name: &str) -> Option<i32>;
}

/// What a service wants the launcher to do when it forks: the program to
/// exec and the fd remap table (target slot number -> source handle, or
/// `None` to close that slot) to install before `exec`. Slots are indexed
/// 0..fds.len(), matching the child's eventual fd 0..N-1.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub argv: Vec<String>,
    pub fds: Vec<Option<FdHandle>>,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("service has no argv to exec")]
    EmptyArgv,
    #[error("unknown fd name {0:?}")]
    UnknownFd(String),
    #[error("control pool exhausted")]
    PoolExhausted,
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
    #[error("fd setup failed: {0}")]
    FdSetup(#[source] nix::Error),
    #[error("exec failed: {0}")]
    Exec(#[source] nix::Error),
}

/// Forks and execs a service's process. Implemented by `svcsup-engine`,
/// the only part of this system allowed to call `fork()`.
pub trait ProcessLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, LaunchError>;
}

/// Sink for service state transitions, for logging/observability.
pub trait NotifySink {
    fn notify_state(&mut self, name: &str, state: ServiceState, pid: Option<Pid>);
    fn notify_reaped(&mut self, name: &str, wait_status: i32);
}
