// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real [`SignalSource`]/[`SignalNames`] adapters, backed by `nix`'s
//! `signalfd(2)` wrapper rather than a classic handler: the daemon blocks
//! every signal it cares about and reads them off a file descriptor,
//! which keeps the whole core single-threaded and handler-free.

use std::collections::VecDeque;
use std::os::fd::AsRawFd;
use std::str::FromStr;
use std::time::SystemTime;

use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};

use svcsup_core::ports::{SignalEvent, SignalNames, SignalSource};
use svcsup_core::Timestamp;

/// Reads pending signals off a `signalfd` and hands them out in arrival
/// order via [`SignalSource::next_event`]. Repeated arrivals of the same
/// signal between two drains coalesce into one event with an incremented
/// `count`.
pub struct SignalFeed {
    fd: SignalFd,
    pending: VecDeque<SignalEvent>,
}

impl SignalFeed {
    /// Blocks `signals` on the calling thread and opens a non-blocking
    /// `signalfd` for them. Must be called before spawning anything that
    /// should *not* inherit the block (e.g. launched services reset their
    /// mask in `exec_child`, so this only affects the supervisor itself).
    pub fn new(signals: &[Signal]) -> nix::Result<Self> {
        let mut mask = SigSet::empty();
        for &s in signals {
            mask.add(s);
        }
        mask.thread_block()?;
        let fd = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK)?;
        Ok(SignalFeed {
            fd,
            pending: VecDeque::new(),
        })
    }

    /// The raw fd, for the daemon's main loop to poll/select on so it
    /// wakes promptly instead of only on its own timer.
    pub fn as_raw_fd(&self) -> i32 {
        self.fd.as_raw_fd()
    }

    fn drain(&mut self) {
        loop {
            match self.fd.read_signal() {
                Ok(Some(info)) => {
                    let signum = info.ssi_signo as i32;
                    let at = Timestamp::from_system_time(SystemTime::now());
                    match self.pending.back_mut() {
                        Some(last) if last.signum == signum => {
                            last.count += 1;
                            last.at = at;
                        }
                        _ => self.pending.push_back(SignalEvent {
                            signum,
                            at,
                            count: 1,
                        }),
                    }
                }
                Ok(None) => break,
                Err(nix::Error::EAGAIN) => break,
                Err(_) => break,
            }
        }
    }
}

impl SignalSource for SignalFeed {
    fn next_event(&mut self, after: Timestamp) -> Option<SignalEvent> {
        self.drain();
        while let Some(front) = self.pending.front() {
            if front.at.raw() > after.raw() {
                return self.pending.pop_front();
            }
            self.pending.pop_front();
        }
        None
    }
}

/// Resolves signal names via `nix`'s own parser (`SIGHUP`, `HUP`, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct NixSignalNames;

impl SignalNames for NixSignalNames {
    fn num_by_name(&self, name: &str) -> Option<i32> {
        Signal::from_str(name).ok().map(|s| s as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_signal_names() {
        let names = NixSignalNames;
        assert_eq!(names.num_by_name("SIGHUP"), Some(Signal::SIGHUP as i32));
        assert_eq!(names.num_by_name("not-a-signal"), None);
    }
}
