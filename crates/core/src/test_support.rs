// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stand-ins for every external collaborator in [`crate::ports`],
//! used by this crate's own tests and re-used by `svcsup-adapters` and
//! `svcsup-engine` under their own `test-support` features so the whole
//! stack can be exercised without touching a real OS process.

use std::collections::{HashMap, VecDeque};

use nix::unistd::Pid;

use crate::ports::{
    ControllerHandle, ControllerPool, FdHandle, FdRegistry, LaunchError, LaunchSpec, NotifySink,
    ProcessLauncher, SignalEvent, SignalNames, SignalSource,
};
use crate::service::ServiceState;
use crate::timestamp::Timestamp;

/// Queue of signals to be drawn in order.
#[derive(Default)]
pub struct FakeSignalSource {
    events: VecDeque<SignalEvent>,
}

impl FakeSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signum: i32, at: Timestamp) {
        self.events.push_back(SignalEvent {
            signum,
            at,
            count: 1,
        });
    }
}

impl SignalSource for FakeSignalSource {
    fn next_event(&mut self, _after: Timestamp) -> Option<SignalEvent> {
        self.events.pop_front()
    }
}

/// Name -> fd table a test can populate directly.
#[derive(Default)]
pub struct FakeFdRegistry {
    table: HashMap<String, FdHandle>,
}

impl FakeFdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, fd: i32) -> Self {
        self.table.insert(name.to_string(), FdHandle(fd));
        self
    }
}

impl FdRegistry for FakeFdRegistry {
    fn lookup(&self, name: &str) -> Option<FdHandle> {
        self.table.get(name).copied()
    }

    fn register(&mut self, name: &str, fd: FdHandle) {
        self.table.insert(name.to_string(), fd);
    }

    fn unregister(&mut self, name: &str) {
        self.table.remove(name);
    }
}

/// Fixed-capacity pool that hands out incrementing fake fd numbers instead
/// of real sockets.
pub struct FakeControllerPool {
    capacity: usize,
    in_use: usize,
    next_fd: i32,
    /// (want_read, want_write) recorded from the most recent `allocate` call.
    pub last_directions: Option<(bool, bool)>,
}

impl FakeControllerPool {
    pub fn new(capacity: usize) -> Self {
        FakeControllerPool {
            capacity,
            in_use: 0,
            next_fd: 1000,
            last_directions: None,
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }
}

impl ControllerPool for FakeControllerPool {
    fn allocate(
        &mut self,
        want_read: bool,
        want_write: bool,
    ) -> Result<(ControllerHandle, FdHandle, FdHandle), LaunchError> {
        self.last_directions = Some((want_read, want_write));
        if self.in_use >= self.capacity {
            return Err(LaunchError::PoolExhausted);
        }
        let handle = ControllerHandle(self.in_use);
        let parent_fd = FdHandle(self.next_fd);
        let child_fd = FdHandle(self.next_fd + 1);
        self.next_fd += 2;
        self.in_use += 1;
        Ok((handle, parent_fd, child_fd))
    }

    fn child_launched(&mut self, _handle: ControllerHandle) {}

    fn release(&mut self, _handle: ControllerHandle) {
        self.in_use = self.in_use.saturating_sub(1);
    }
}

/// Resolves names via `nix`'s own `Signal::from_str`, matching the real
/// adapter's behavior without depending on it.
pub struct FakeSignalNames;

impl SignalNames for FakeSignalNames {
    fn num_by_name(&self, name: &str) -> Option<i32> {
        use std::str::FromStr;
        nix::sys::signal::Signal::from_str(name)
            .ok()
            .map(|s| s as i32)
    }
}

/// Hands out successive fake pids, or fails the next launch once asked
/// to, so fork-retry behavior can be exercised deterministically.
pub struct FakeProcessLauncher {
    next_pid: i32,
    pub launched: Vec<LaunchSpec>,
    fail_next: bool,
}

impl FakeProcessLauncher {
    pub fn new() -> Self {
        FakeProcessLauncher {
            next_pid: 100,
            launched: Vec::new(),
            fail_next: false,
        }
    }

    pub fn fail_next_launch(&mut self) {
        self.fail_next = true;
    }
}

impl Default for FakeProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for FakeProcessLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, LaunchError> {
        self.launched.push(spec.clone());
        if self.fail_next {
            self.fail_next = false;
            return Err(LaunchError::Fork(nix::Error::EAGAIN));
        }
        let pid = self.next_pid;
        self.next_pid += 1;
        Ok(Pid::from_raw(pid))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub name: String,
    pub state: ServiceState,
    pub pid: Option<i32>,
}

/// Records every notification it receives, in order.
#[derive(Default)]
pub struct FakeNotifySink {
    pub events: Vec<Notification>,
    pub reaped: Vec<(String, i32)>,
}

impl FakeNotifySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotifySink for FakeNotifySink {
    fn notify_state(&mut self, name: &str, state: ServiceState, pid: Option<Pid>) {
        self.events.push(Notification {
            name: name.to_string(),
            state,
            pid: pid.map(|p| p.as_raw()),
        });
    }

    fn notify_reaped(&mut self, name: &str, wait_status: i32) {
        self.reaped.push((name.to_string(), wait_status));
    }
}
