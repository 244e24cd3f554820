// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The service record and its DOWN/START/UP/REAPED state machine.
//!
//! A [`Service`] knows nothing about indices, lists or the scheduler that
//! drives it — [`registry::Registry`](crate::registry::Registry) owns
//! those and is the only thing allowed to toggle list membership. This
//! keeps the state machine itself trivially testable: feed it timestamps
//! and events, read back what it wants to happen next.

use std::borrow::Borrow;
use std::fmt;

use nix::unistd::Pid;

use crate::error::{ServiceError, VarError};
use crate::timestamp::Timestamp;
use crate::vars::VarStore;

/// Maximum length of a service name, mirroring the fixed `name_buf` the
/// original implementation stores names in.
pub const NAME_BUF_SIZE: usize = 64;

/// How long to wait before retrying a fork that failed before `exec`.
pub const FORK_RETRY_DELAY_SECS: u32 = 2;

/// Distinct child exit status used when the child aborts before `exec`
/// (unknown fd name, descriptor exhaustion, `exec` itself failing).
pub const EXIT_INVALID_ENVIRONMENT: i32 = 111;

const DEFAULT_FDS: &str = "null\tnull\tnull";

fn biased(t: Timestamp) -> Timestamp {
    if t.is_undef() {
        Timestamp::from_raw(1)
    } else {
        t
    }
}

/// A validated service name: `[A-Za-z0-9._-]+`, 1..NAME_BUF_SIZE-1 bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Result<Self, ServiceError> {
        let name = name.into();
        if name.is_empty() || name.len() >= NAME_BUF_SIZE {
            return Err(ServiceError::InvalidName(name));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return Err(ServiceError::InvalidName(name));
        }
        Ok(ServiceName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ServiceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Down,
    Start,
    Up,
    Reaped,
}

/// What [`Service::run`] wants the caller (the registry's active sweep) to
/// do next. The registry is the one that can touch list membership and
/// invoke the process launcher, so `run` stops short of doing either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Remove this record from the active list; nothing more to do.
    Deactivate,
    /// Still waiting; keep the record active and lower the wake deadline.
    WaitUntil(Timestamp),
    /// `now >= start_time`: fork a child for this service.
    ReadyToFork,
}

pub struct Service {
    name: ServiceName,
    state: ServiceState,
    pid: Option<Pid>,
    /// Doubles as "desired start time" while `START`, and "time the
    /// process actually came up" once `UP` — the same field is reused for
    /// both, matching how the record never needs them simultaneously.
    start_time: Timestamp,
    reap_time: Timestamp,
    wait_status: i32,
    restart_interval: Timestamp,
    auto_restart: bool,
    autostart_signals: Vec<i32>,
    uses_control_event: bool,
    uses_control_cmd: bool,
    uses_control_socket: bool,
    /// Set when a signal sweep matches this record's `autostart_signals`
    /// while it isn't in DOWN/START (so `handle_start` was a no-op).
    /// Consumed on the next REAPED tick, mirroring `svc_check_sigwake`'s
    /// effect without replaying the full signal history (see DESIGN.md).
    trigger_pending: bool,
    vars: VarStore,
}

impl Service {
    pub fn new(name: ServiceName, vars: VarStore) -> Self {
        Service {
            name,
            state: ServiceState::Down,
            pid: None,
            start_time: Timestamp::UNDEF,
            reap_time: Timestamp::UNDEF,
            wait_status: -1,
            restart_interval: Timestamp::UNDEF,
            auto_restart: false,
            autostart_signals: Vec::new(),
            uses_control_event: false,
            uses_control_cmd: false,
            uses_control_socket: false,
            trigger_pending: false,
            vars,
        }
    }

    // -- identity & state -------------------------------------------------

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn wait_status(&self) -> i32 {
        self.wait_status
    }

    pub fn up_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn reap_time(&self) -> Timestamp {
        self.reap_time
    }

    /// Whether the active-sweep needs to keep re-evaluating this record.
    /// Derived from `state` alone: START and REAPED need further ticks,
    /// DOWN and UP are settled until something else happens.
    pub fn wants_active(&self) -> bool {
        matches!(self.state, ServiceState::Start | ServiceState::Reaped)
    }

    /// Whether this record should sit in the sigwake list. Derived
    /// straight from `autostart_signals`, per its definition.
    pub fn wants_sigwake(&self) -> bool {
        !self.autostart_signals.is_empty()
    }

    pub fn uses_control_event(&self) -> bool {
        self.uses_control_event
    }

    pub fn uses_control_cmd(&self) -> bool {
        self.uses_control_cmd
    }

    pub fn uses_control_socket(&self) -> bool {
        self.uses_control_socket
    }

    pub fn autostart_signals(&self) -> &[i32] {
        &self.autostart_signals
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    // -- variables ----------------------------------------------------------

    pub fn tags(&self) -> &str {
        self.vars.get("tags").unwrap_or("")
    }

    pub fn set_tags(&mut self, value: &str) -> Result<(), VarError> {
        if value.is_empty() {
            self.vars.unset("tags")
        } else {
            self.vars.set("tags", Some(value))
        }
    }

    pub fn argv(&self) -> &str {
        self.vars.get("args").unwrap_or("")
    }

    pub fn set_argv(&mut self, value: &str) -> Result<(), VarError> {
        if value.is_empty() {
            self.vars.unset("args")
        } else {
            self.vars.set("args", Some(value))
        }
    }

    pub fn fds(&self) -> &str {
        self.vars.get("fds").unwrap_or(DEFAULT_FDS)
    }

    /// Set the `fds` variable, recomputing the `uses_control_*` flags.
    /// Setting the literal default canonicalizes to "unset" so the buffer
    /// doesn't carry dead weight for the common case.
    pub fn set_fds(&mut self, value: &str) -> Result<(), VarError> {
        if value == DEFAULT_FDS {
            self.vars.unset("fds")?;
        } else {
            self.vars.set("fds", Some(value))?;
        }
        self.uses_control_event = value.split('\t').any(|tok| tok == "control.event");
        self.uses_control_cmd = value.split('\t').any(|tok| tok == "control.cmd");
        self.uses_control_socket = value.split('\t').any(|tok| tok == "control.socket");
        Ok(())
    }

    pub fn triggers(&self) -> &str {
        self.vars.get("triggers").unwrap_or("")
    }

    /// Parse and set the `triggers` variable. Each token is either the
    /// literal `always` or a signal name resolved by `signal_num`. An
    /// unrecognized non-empty token rejects the whole set, leaving
    /// `triggers` and `autostart_signals` unchanged.
    pub fn set_triggers(
        &mut self,
        value: &str,
        signal_num: impl Fn(&str) -> Option<i32>,
    ) -> Result<(), VarError> {
        if value.is_empty() {
            self.vars.unset("triggers")?;
            self.auto_restart = false;
            self.autostart_signals.clear();
            return Ok(());
        }

        let mut auto_restart = false;
        let mut signals = Vec::new();
        for tok in value.split('\t') {
            if tok == "always" {
                auto_restart = true;
            } else if let Some(num) = signal_num(tok) {
                signals.push(num);
            } else {
                return Err(VarError::UnknownTrigger(tok.to_string()));
            }
        }

        self.vars.set("triggers", Some(value))?;
        self.auto_restart = auto_restart;
        self.autostart_signals = signals;
        Ok(())
    }

    // -- policy --------------------------------------------------------

    pub fn restart_interval(&self) -> Timestamp {
        self.restart_interval
    }

    pub fn set_restart_interval(&mut self, interval: Timestamp) -> Result<(), ServiceError> {
        if interval.raw() >> 32 < 1 {
            return Err(ServiceError::RestartIntervalTooShort);
        }
        self.restart_interval = interval;
        Ok(())
    }

    // -- admin operations (spec §4.7) -------------------------------------

    /// Precondition: state is DOWN or START. Schedules (or reschedules) a
    /// start at `max(when, now)`, biased away from zero.
    pub fn handle_start(&mut self, when: Timestamp, now: Timestamp) -> Result<(), ServiceError> {
        if !matches!(self.state, ServiceState::Down | ServiceState::Start) {
            return Err(ServiceError::InvalidTransition {
                name: self.name.clone(),
                from: self.state,
                op: "start",
            });
        }
        self.state = ServiceState::Start;
        self.start_time = biased(if when.raw() > now.raw() { when } else { now });
        self.pid = None;
        self.reap_time = Timestamp::UNDEF;
        self.wait_status = -1;
        Ok(())
    }

    pub fn cancel_start(&mut self) -> Result<(), ServiceError> {
        if self.state != ServiceState::Start {
            return Err(ServiceError::InvalidTransition {
                name: self.name.clone(),
                from: self.state,
                op: "cancel_start",
            });
        }
        self.state = ServiceState::Down;
        self.start_time = Timestamp::UNDEF;
        Ok(())
    }

    /// Applies only while UP; records the wait status and reap time and
    /// moves the record to REAPED. Ignored (no-op) otherwise.
    pub fn handle_reaped(&mut self, wait_status: i32, now: Timestamp) -> bool {
        if self.state != ServiceState::Up {
            return false;
        }
        self.wait_status = wait_status;
        self.reap_time = biased(now);
        self.state = ServiceState::Reaped;
        true
    }

    /// Called once a forked child is confirmed running.
    pub fn mark_forked(&mut self, pid: Pid, now: Timestamp) {
        self.pid = Some(pid);
        self.state = ServiceState::Up;
        self.start_time = biased(now);
    }

    /// Record that a matching trigger signal arrived while this record
    /// wasn't eligible to start immediately (e.g. it was UP). Consumed by
    /// the next REAPED tick so the signal isn't lost to timing.
    pub fn note_trigger_signal(&mut self) {
        self.trigger_pending = true;
    }

    /// Called when the attempt to fork this service failed; reschedules
    /// the start `FORK_RETRY_DELAY_SECS` seconds out.
    pub fn mark_fork_failed(&mut self, now: Timestamp) {
        self.start_time = biased(now.checked_add_secs(FORK_RETRY_DELAY_SECS));
    }

    /// Advance the state machine one tick. See [`Step`] for what the
    /// caller is expected to do with the result. Mirrors the REAPED
    /// tail-call into DOWN/START via a labeled loop rather than recursion.
    pub fn run(&mut self, now: Timestamp) -> Step {
        loop {
            match self.state {
                ServiceState::Down | ServiceState::Up => return Step::Deactivate,
                ServiceState::Start => {
                    if now.raw() < self.start_time.raw() {
                        return Step::WaitUntil(self.start_time);
                    }
                    return Step::ReadyToFork;
                }
                ServiceState::Reaped => {
                    let restart = self.auto_restart || self.trigger_pending;
                    self.trigger_pending = false;
                    if !restart {
                        self.state = ServiceState::Down;
                        self.start_time = Timestamp::UNDEF;
                        return Step::Deactivate;
                    }
                    let ran_short = !self.restart_interval.is_undef()
                        && self
                            .reap_time
                            .raw()
                            .wrapping_sub(self.start_time.raw())
                            < self.restart_interval.raw();
                    let next = if ran_short {
                        Timestamp::from_raw(now.raw().saturating_add(self.restart_interval.raw()))
                    } else {
                        now
                    };
                    self.state = ServiceState::Start;
                    self.start_time = biased(next);
                    self.pid = None;
                    continue;
                }
            }
        }
    }

    /// Send a signal to the live child, to its process group if `group`.
    /// Returns `Ok(false)` (not an error) when there is no live child.
    pub fn send_signal(&self, signum: nix::sys::signal::Signal, group: bool) -> Result<bool, ServiceError> {
        let Some(pid) = self.pid else {
            return Ok(false);
        };
        let result = if group {
            nix::sys::signal::killpg(pid, signum)
        } else {
            nix::sys::signal::kill(pid, signum)
        };
        result.map(|()| true).map_err(ServiceError::Signal)
    }

    #[cfg(debug_assertions)]
    pub fn debug_check(&self) {
        debug_assert!(
            !matches!(self.state, ServiceState::Down | ServiceState::Start) || self.pid.is_none(),
            "pid must be cleared while DOWN or START"
        );
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
