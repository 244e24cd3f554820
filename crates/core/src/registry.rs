// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry: the name index, the pid index, the active list, the
//! sigwake list, and the active-sweep scheduler that drives every
//! [`Service`] through its state machine.
//!
//! Records live in a slab (`Vec<Option<Slot>>`); a [`ServiceHandle`] is
//! just a slab index. The two intrusive lists are expressed as explicit
//! prev/next indices on each slot rather than embedded pointers, per the
//! arena-based alternative for languages without embedded list nodes.

use std::collections::BTreeMap;

use nix::unistd::Pid;

use crate::clock::Clock;
use crate::error::ServiceError;
use crate::ports::{
    ControllerPool, FdRegistry, LaunchError, LaunchSpec, NotifySink, ProcessLauncher, SignalSource,
};
use crate::service::{Service, ServiceName, Step};
use crate::timestamp::Timestamp;
use crate::vars::VarStore;

/// Opaque reference to a record in a [`Registry`]. Stable for the
/// record's lifetime; reused only after [`Registry::delete`] returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(usize);

struct Slot {
    service: Service,
    active_prev: Option<usize>,
    active_next: Option<usize>,
    active_linked: bool,
    sigwake_prev: Option<usize>,
    sigwake_next: Option<usize>,
    sigwake_linked: bool,
}

impl Slot {
    fn new(service: Service) -> Self {
        Slot {
            service,
            active_prev: None,
            active_next: None,
            active_linked: false,
            sigwake_prev: None,
            sigwake_next: None,
            sigwake_linked: false,
        }
    }
}

/// Generates the link/unlink pair for one intrusive list, given the slot
/// fields that back it and the registry's head/tail fields. Both lists
/// (active, sigwake) need identical O(1) insert-at-head / remove-anywhere
/// logic, so this is written once and instantiated twice below.
macro_rules! list_ops {
    ($link:ident, $unlink:ident, $head:ident, $tail:ident, $prev:ident, $next:ident, $linked:ident) => {
        // Allow expect here: idx always comes from a handle already
        // validated by `index`, or from a list pointer this same registry
        // just wrote, so the slot is always live.
        #[allow(clippy::expect_used)]
        fn $link(&mut self, idx: usize) {
            if self.slots[idx].as_ref().expect("live slot").$linked {
                return;
            }
            let old_head = self.$head;
            if let Some(h) = old_head {
                self.slots[h].as_mut().expect("live slot").$prev = Some(idx);
            } else {
                self.$tail = Some(idx);
            }
            {
                let slot = self.slots[idx].as_mut().expect("live slot");
                slot.$next = old_head;
                slot.$prev = None;
                slot.$linked = true;
            }
            self.$head = Some(idx);
        }

        #[allow(clippy::expect_used)]
        fn $unlink(&mut self, idx: usize) {
            let (prev, next, linked) = {
                let slot = self.slots[idx].as_ref().expect("live slot");
                (slot.$prev, slot.$next, slot.$linked)
            };
            if !linked {
                return;
            }
            match prev {
                Some(p) => self.slots[p].as_mut().expect("live slot").$next = next,
                None => self.$head = next,
            }
            match next {
                Some(n) => self.slots[n].as_mut().expect("live slot").$prev = prev,
                None => self.$tail = prev,
            }
            let slot = self.slots[idx].as_mut().expect("live slot");
            slot.$prev = None;
            slot.$next = None;
            slot.$linked = false;
        }
    };
}

/// The external collaborators an active sweep needs, bundled so
/// [`Registry::run_active`] takes one argument instead of six. Trait
/// objects keep the signature stable regardless of which concrete
/// adapters the caller wires up.
pub struct Deps<'a> {
    pub clock: &'a dyn Clock,
    pub signals: &'a mut dyn SignalSource,
    pub launcher: &'a mut dyn ProcessLauncher,
    pub notify: &'a mut dyn NotifySink,
    pub fds: &'a mut dyn FdRegistry,
    pub controllers: &'a mut dyn ControllerPool,
}

pub struct Registry {
    slots: Vec<Option<Slot>>,
    free_list: Vec<usize>,
    by_name: BTreeMap<String, usize>,
    by_pid: BTreeMap<i32, usize>,
    active_head: Option<usize>,
    active_tail: Option<usize>,
    sigwake_head: Option<usize>,
    sigwake_tail: Option<usize>,
    last_signal_ts: Timestamp,
    pool_capacity: Option<usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Records get a heap-backed, unbounded variable buffer.
    pub fn new() -> Self {
        Registry {
            slots: Vec::new(),
            free_list: Vec::new(),
            by_name: BTreeMap::new(),
            by_pid: BTreeMap::new(),
            active_head: None,
            active_tail: None,
            sigwake_head: None,
            sigwake_tail: None,
            last_signal_ts: Timestamp::UNDEF,
            pool_capacity: None,
        }
    }

    /// Records get a bounded, pool-style variable buffer instead, mirroring
    /// a fixed-size preallocated slab of service slots.
    pub fn with_pool_capacity(capacity: usize) -> Self {
        let mut r = Self::new();
        r.pool_capacity = Some(capacity);
        r
    }

    list_ops!(
        link_active,
        unlink_active,
        active_head,
        active_tail,
        active_prev,
        active_next,
        active_linked
    );
    list_ops!(
        link_sigwake,
        unlink_sigwake,
        sigwake_head,
        sigwake_tail,
        sigwake_prev,
        sigwake_next,
        sigwake_linked
    );

    // Allow expect here: idx is always a slot this same call chain just
    // looked up or wrote, never a stale or external index.
    #[allow(clippy::expect_used)]
    fn sync_active(&mut self, idx: usize) {
        let wants = self.slots[idx].as_ref().expect("live slot").service.wants_active();
        if wants {
            self.link_active(idx);
        } else {
            self.unlink_active(idx);
        }
    }

    #[allow(clippy::expect_used)]
    fn sync_sigwake(&mut self, idx: usize) {
        let wants = self.slots[idx].as_ref().expect("live slot").service.wants_sigwake();
        if wants {
            self.link_sigwake(idx);
        } else {
            self.unlink_sigwake(idx);
        }
    }

    fn index(&self, handle: ServiceHandle) -> Result<usize, ServiceError> {
        match self.slots.get(handle.0) {
            Some(Some(_)) => Ok(handle.0),
            _ => Err(ServiceError::InvalidHandle),
        }
    }

    // Allow expect here: every caller of `slot`/`slot_mut` already holds an
    // index validated by `index()` or sourced from a list/index this
    // registry maintains, so the slab entry is always live.
    #[allow(clippy::expect_used)]
    fn slot(&self, idx: usize) -> &Slot {
        self.slots[idx].as_ref().expect("live slot")
    }

    #[allow(clippy::expect_used)]
    fn slot_mut(&mut self, idx: usize) -> &mut Slot {
        self.slots[idx].as_mut().expect("live slot")
    }

    pub fn get(&self, handle: ServiceHandle) -> Option<&Service> {
        self.slots.get(handle.0)?.as_ref().map(|s| &s.service)
    }

    pub fn get_mut(&mut self, handle: ServiceHandle) -> Option<&mut Service> {
        self.slots.get_mut(handle.0)?.as_mut().map(|s| &mut s.service)
    }

    pub fn check_name(&self, name: &str) -> bool {
        ServiceName::new(name).is_ok()
    }

    /// Look up a record by name, optionally creating it in DOWN state if
    /// it doesn't exist.
    pub fn by_name(&mut self, name: &str, create: bool) -> Result<ServiceHandle, ServiceError> {
        if let Some(&idx) = self.by_name.get(name) {
            return Ok(ServiceHandle(idx));
        }
        if !create {
            return Err(ServiceError::NotFound(name.to_string()));
        }
        let validated = ServiceName::new(name)?;
        let vars = match self.pool_capacity {
            Some(cap) => VarStore::pool(cap),
            None => VarStore::heap(),
        };
        let service = Service::new(validated.clone(), vars);
        let slot = Slot::new(service);
        let idx = match self.free_list.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.by_name.insert(validated.as_str().to_string(), idx);
        Ok(ServiceHandle(idx))
    }

    pub fn by_pid(&self, pid: Pid) -> Option<ServiceHandle> {
        self.by_pid.get(&pid.as_raw()).map(|&idx| ServiceHandle(idx))
    }

    /// Next record in name order. `None` means "from the very start".
    /// When `from_name` exists exactly, returns its successor; otherwise
    /// the first record whose name is greater (lower bound).
    pub fn iter_next(&self, from_name: Option<&str>) -> Option<ServiceHandle> {
        use std::ops::Bound;
        let bound = match from_name {
            None => Bound::Unbounded,
            Some(name) => Bound::Excluded(name),
        };
        self.by_name
            .range::<str, _>((bound, Bound::Unbounded))
            .next()
            .map(|(_, &idx)| ServiceHandle(idx))
    }

    pub fn delete(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
        let idx = self.index(handle)?;
        self.unlink_active(idx);
        self.unlink_sigwake(idx);
        let name = self.slot(idx).service.name().as_str().to_string();
        if let Some(pid) = self.slot(idx).service.pid() {
            self.by_pid.remove(&pid.as_raw());
        }
        self.by_name.remove(&name);
        self.slots[idx] = None;
        self.free_list.push(idx);
        Ok(())
    }

    // -- admin operations, wrapping Service's and keeping lists in sync --

    pub fn handle_start(
        &mut self,
        handle: ServiceHandle,
        when: Timestamp,
        now: Timestamp,
    ) -> Result<(), ServiceError> {
        let idx = self.index(handle)?;
        let old_pid = self.slot(idx).service.pid();
        self.slot_mut(idx).service.handle_start(when, now)?;
        if let Some(pid) = old_pid {
            self.by_pid.remove(&pid.as_raw());
        }
        self.sync_active(idx);
        Ok(())
    }

    pub fn cancel_start(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
        let idx = self.index(handle)?;
        self.slot_mut(idx).service.cancel_start()?;
        self.sync_active(idx);
        Ok(())
    }

    pub fn handle_reaped(
        &mut self,
        handle: ServiceHandle,
        wait_status: i32,
        now: Timestamp,
    ) -> Result<bool, ServiceError> {
        let idx = self.index(handle)?;
        let applied = self.slot_mut(idx).service.handle_reaped(wait_status, now);
        if applied {
            self.sync_active(idx);
        }
        Ok(applied)
    }

    /// Find the record owning `pid` (if any) and run [`Self::handle_reaped`]
    /// on it. Used by the daemon's `waitpid` loop.
    pub fn handle_reaped_by_pid(
        &mut self,
        pid: Pid,
        wait_status: i32,
        now: Timestamp,
    ) -> Option<ServiceHandle> {
        let handle = self.by_pid(pid)?;
        self.handle_reaped(handle, wait_status, now).ok()?;
        Some(handle)
    }

    pub fn set_triggers(
        &mut self,
        handle: ServiceHandle,
        value: &str,
        resolve: impl Fn(&str) -> Option<i32>,
        now: Timestamp,
    ) -> Result<(), ServiceError> {
        let idx = self.index(handle)?;
        self.slot_mut(idx).service.set_triggers(value, resolve)?;
        self.sync_sigwake(idx);
        if self.slot(idx).service.auto_restart() {
            self.handle_start(handle, now, now)?;
        }
        Ok(())
    }

    /// One pass over the signal-wake list and the active list: drains
    /// pending signal events against the sigwake list, then ticks every
    /// record on the active list. Captures each list's `next` pointer
    /// before running a record's body so self/sibling mutation mid-sweep
    /// is safe.
    pub fn run_active(&mut self, deps: &mut Deps<'_>) {
        let now = deps.clock.now();

        if self.sigwake_head.is_some() {
            while let Some(ev) = deps.signals.next_event(self.last_signal_ts) {
                self.last_signal_ts = ev.at;
                let mut cur = self.sigwake_head;
                while let Some(idx) = cur {
                    let next = self.slot(idx).sigwake_next;
                    let matched = self
                        .slot(idx)
                        .service
                        .autostart_signals()
                        .contains(&ev.signum);
                    if matched {
                        if self.slot_mut(idx).service.handle_start(now, now).is_ok() {
                            self.sync_active(idx);
                            self.notify_current(idx, deps.notify);
                        } else {
                            // Not DOWN/START right now (e.g. UP or REAPED):
                            // remember it so the next REAPED tick restarts.
                            self.slot_mut(idx).service.note_trigger_signal();
                        }
                    }
                    cur = next;
                }
            }
        }

        let mut cur = self.active_head;
        while let Some(idx) = cur {
            let next = self.slot(idx).active_next;
            self.run_one(idx, now, deps);
            cur = next;
        }
    }

    fn notify_current(&self, idx: usize, notify: &mut dyn NotifySink) {
        let svc = &self.slot(idx).service;
        notify.notify_state(svc.name().as_str(), svc.state(), svc.pid());
    }

    fn run_one(&mut self, idx: usize, now: Timestamp, deps: &mut Deps<'_>) {
        let step = self.slot_mut(idx).service.run(now);
        match step {
            Step::Deactivate => {
                self.sync_active(idx);
                self.notify_current(idx, deps.notify);
            }
            Step::WaitUntil(t) => {
                deps.clock.lower_next(t);
            }
            Step::ReadyToFork => self.try_fork(idx, now, deps),
        }
    }

    fn try_fork(&mut self, idx: usize, now: Timestamp, deps: &mut Deps<'_>) {
        let outcome = self.build_launch_spec(idx, deps.fds, deps.controllers);
        let (spec, controller) = match outcome {
            Ok(v) => v,
            Err(_) => {
                self.slot_mut(idx).service.mark_fork_failed(now);
                let retry_at = self.slot(idx).service.up_time();
                deps.clock.lower_next(retry_at);
                return;
            }
        };

        match deps.launcher.launch(&spec) {
            Ok(pid) => {
                if let Some(handle) = controller {
                    deps.controllers.child_launched(handle);
                }
                self.slot_mut(idx).service.mark_forked(pid, now);
                self.by_pid.insert(pid.as_raw(), idx);
                self.sync_active(idx);
                self.notify_current(idx, deps.notify);
            }
            Err(_) => {
                if let Some(handle) = controller {
                    deps.controllers.release(handle);
                }
                self.slot_mut(idx).service.mark_fork_failed(now);
                let retry_at = self.slot(idx).service.up_time();
                deps.clock.lower_next(retry_at);
            }
        }
    }

    /// Build the launch spec for `idx`: parse `args` and `fds`, allocate a
    /// controller if any `uses_control_*` flag is set, and stash its
    /// child-side fd under the well-known registry names so the fd-remap
    /// table (built right after) resolves them.
    fn build_launch_spec(
        &self,
        idx: usize,
        fds_reg: &mut dyn FdRegistry,
        controllers: &mut dyn ControllerPool,
    ) -> Result<(LaunchSpec, Option<crate::ports::ControllerHandle>), LaunchError> {
        let svc = &self.slot(idx).service;

        let argv: Vec<String> = svc
            .argv()
            .split('\t')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if argv.is_empty() {
            return Err(LaunchError::EmptyArgv);
        }

        let mut controller_handle = None;
        if svc.uses_control_event() || svc.uses_control_cmd() || svc.uses_control_socket() {
            let want_read = svc.uses_control_socket() || svc.uses_control_event();
            let want_write = svc.uses_control_socket() || svc.uses_control_cmd();
            let (handle, _parent_fd, child_fd) = controllers.allocate(want_read, want_write)?;
            controller_handle = Some(handle);
            if svc.uses_control_socket() {
                fds_reg.register("control.socket", child_fd);
            }
            if svc.uses_control_cmd() {
                fds_reg.register("control.cmd", child_fd);
            }
            if svc.uses_control_event() {
                fds_reg.register("control.event", child_fd);
            }
        }

        let mut fds = Vec::new();
        for name in svc.fds().split('\t') {
            if name == "-" {
                fds.push(None);
            } else {
                let handle = fds_reg
                    .lookup(name)
                    .ok_or_else(|| LaunchError::UnknownFd(name.to_string()))?;
                fds.push(Some(handle));
            }
        }

        Ok((LaunchSpec { argv, fds }, controller_handle))
    }

    pub fn last_signal_ts(&self) -> Timestamp {
        self.last_signal_ts
    }

    #[cfg(debug_assertions)]
    pub fn debug_check(&self) {
        for (name, &idx) in &self.by_name {
            let slot = self.slot(idx);
            debug_assert_eq!(slot.service.name().as_str(), name);
            debug_assert_eq!(slot.active_linked, slot.service.wants_active());
            debug_assert_eq!(slot.sigwake_linked, slot.service.wants_sigwake());
            slot.service.debug_check();
        }
        for (&pid, &idx) in &self.by_pid {
            debug_assert_eq!(self.slot(idx).service.pid().map(|p| p.as_raw()), Some(pid));
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
