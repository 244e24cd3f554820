// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real [`ControllerPool`]: a fixed-capacity pool of connected Unix
//! socket pairs, one per service that wires up `control.socket`,
//! `control.cmd` or `control.event`. Exhausting the pool is a launch
//! failure, not a panic — the caller (the registry's `try_fork`) treats
//! it exactly like a failed `fork()`.

use std::os::fd::RawFd;

use nix::sys::socket::{shutdown, socketpair, AddressFamily, SockFlag, SockType, Shutdown};
use nix::unistd::close;

use svcsup_core::ports::{ControllerHandle, ControllerPool, FdHandle, LaunchError};

struct Slot {
    parent_fd: RawFd,
    /// The launcher's copy of the child-side fd, closed once the parent
    /// has confirmed the fork and no longer needs it.
    child_fd: Option<RawFd>,
}

pub struct SocketControllerPool {
    capacity: usize,
    slots: Vec<Option<Slot>>,
    free_list: Vec<usize>,
}

impl SocketControllerPool {
    pub fn new(capacity: usize) -> Self {
        SocketControllerPool {
            capacity,
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl ControllerPool for SocketControllerPool {
    fn allocate(
        &mut self,
        want_read: bool,
        want_write: bool,
    ) -> Result<(ControllerHandle, FdHandle, FdHandle), LaunchError> {
        if self.free_list.is_empty() && self.slots.len() >= self.capacity {
            return Err(LaunchError::PoolExhausted);
        }

        let (parent_fd, child_fd) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .map_err(LaunchError::FdSetup)?;
        let parent_fd: RawFd = std::os::fd::IntoRawFd::into_raw_fd(parent_fd);
        let child_fd: RawFd = std::os::fd::IntoRawFd::into_raw_fd(child_fd);

        // Half-shutdown whichever direction the service doesn't use, on
        // both ends, so the unused half can't buffer indefinitely.
        if !want_write {
            let _ = shutdown(child_fd, Shutdown::Write);
            let _ = shutdown(parent_fd, Shutdown::Read);
        }
        if !want_read {
            let _ = shutdown(child_fd, Shutdown::Read);
            let _ = shutdown(parent_fd, Shutdown::Write);
        }

        let slot = Slot {
            parent_fd,
            child_fd: Some(child_fd),
        };
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

        Ok((ControllerHandle(idx), FdHandle(parent_fd), FdHandle(child_fd)))
    }

    fn child_launched(&mut self, handle: ControllerHandle) {
        if let Some(Some(slot)) = self.slots.get_mut(handle.0) {
            if let Some(fd) = slot.child_fd.take() {
                let _ = close(fd);
            }
        }
    }

    fn release(&mut self, handle: ControllerHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0).and_then(Option::take) {
            let _ = close(slot.parent_fd);
            if let Some(fd) = slot.child_fd {
                let _ = close(fd);
            }
            self.free_list.push(handle.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_respects_capacity() {
        let mut pool = SocketControllerPool::new(1);
        let (h1, _, _) = pool.allocate(true, true).expect("first allocation");
        assert_eq!(pool.in_use(), 1);
        assert!(matches!(pool.allocate(true, true), Err(LaunchError::PoolExhausted)));
        pool.release(h1);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.allocate(true, true).is_ok());
    }

    #[test]
    fn child_launched_frees_the_slot_for_reuse_after_release() {
        let mut pool = SocketControllerPool::new(2);
        let (handle, _parent, _child) = pool.allocate(true, false).expect("allocate");
        pool.child_launched(handle);
        // Parent-side fd still belongs to the slot until release.
        assert_eq!(pool.in_use(), 1);
        pool.release(handle);
        assert_eq!(pool.in_use(), 0);
    }
}
