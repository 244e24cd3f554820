// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties a [`Registry`] to its real collaborators and drives it one pass at
//! a time. The daemon's main loop owns one `Supervisor`, calls
//! [`Supervisor::reap_available`] whenever `SIGCHLD` wakes it and
//! [`Supervisor::tick`] once per pass, then sleeps until the deadline
//! `tick` hands back.

use nix::unistd::Pid;

use svcsup_core::{
    Clock, ControllerPool, FdRegistry, NotifySink, ProcessLauncher, Registry, ServiceHandle,
    SignalSource, Timestamp,
};
use svcsup_core::registry::Deps;

use crate::error::EngineError;

/// Owns the registry plus one boxed instance of every port it needs.
/// Trait objects here for the same reason `Deps` uses them: the caller
/// shouldn't have to name concrete adapter types to hold a `Supervisor`.
pub struct Supervisor {
    registry: Registry,
    clock: Box<dyn Clock>,
    signals: Box<dyn SignalSource>,
    launcher: Box<dyn ProcessLauncher>,
    notify: Box<dyn NotifySink>,
    fds: Box<dyn FdRegistry>,
    controllers: Box<dyn ControllerPool>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Registry,
        clock: Box<dyn Clock>,
        signals: Box<dyn SignalSource>,
        launcher: Box<dyn ProcessLauncher>,
        notify: Box<dyn NotifySink>,
        fds: Box<dyn FdRegistry>,
        controllers: Box<dyn ControllerPool>,
    ) -> Self {
        Supervisor {
            registry,
            clock,
            signals,
            launcher,
            notify,
            fds,
            controllers,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// One active-sweep pass: drains pending signal events against the
    /// sigwake list, then ticks every record on the active list. Returns
    /// the earliest deadline any record asked to be revisited at, so the
    /// caller knows how long it may sleep before calling this again.
    pub fn tick(&mut self) -> Option<Timestamp> {
        let mut deps = Deps {
            clock: self.clock.as_ref(),
            signals: self.signals.as_mut(),
            launcher: self.launcher.as_mut(),
            notify: self.notify.as_mut(),
            fds: self.fds.as_mut(),
            controllers: self.controllers.as_mut(),
        };
        self.registry.run_active(&mut deps);
        self.clock.take_next()
    }

    /// Reaps every child currently waitable without blocking, routing each
    /// one to its record via [`Registry::handle_reaped_by_pid`] and telling
    /// [`NotifySink`] about it. Returns the handles that were actually
    /// reaped; a pid `waitpid` returns that no record claims (already
    /// deleted, or never ours) is reported to the sink as an ignored reap.
    pub fn reap_available(&mut self) -> Result<Vec<ServiceHandle>, EngineError> {
        let mut reaped = Vec::new();
        let now = self.clock.now();
        while let Some((pid, wait_status)) = wait_nohang()? {
            match self.registry.handle_reaped_by_pid(pid, wait_status, now) {
                Some(handle) => {
                    if let Some(svc) = self.registry.get(handle) {
                        self.notify.notify_reaped(svc.name().as_str(), wait_status);
                    }
                    reaped.push(handle);
                }
                None => self.notify.notify_reaped(&pid.to_string(), wait_status),
            }
        }
        Ok(reaped)
    }
}

/// `waitpid(-1, WNOHANG)`, exposing the raw status word rather than
/// `nix`'s decoded [`nix::sys::wait::WaitStatus`] — [`Service::handle_reaped`]
/// stores the status as-is.
fn wait_nohang() -> Result<Option<(Pid, i32)>, EngineError> {
    let mut status: libc::c_int = 0;
    // Safety: WNOHANG never blocks; status is a plain out-param.
    let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
    match pid {
        0 => Ok(None),
        -1 => {
            let err = nix::Error::last();
            if err == nix::Error::ECHILD {
                Ok(None)
            } else {
                Err(EngineError::Wait(err))
            }
        }
        p => Ok(Some((Pid::from_raw(p), status))),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
