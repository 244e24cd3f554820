// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wake clock: the one external collaborator every tick of the
//! scheduler consults. It answers "what time is it" and collects the
//! earliest deadline anyone asked to be woken at, so the driving loop
//! knows how long it may safely sleep.

use std::sync::Mutex;
use std::time::SystemTime;

use crate::timestamp::Timestamp;

/// A source of the current time that also accumulates the next wake
/// deadline requested by callers during a scheduling pass.
///
/// Every state-machine tick that wants to be revisited later calls
/// [`Clock::lower_next`] with its desired deadline; the driving loop reads
/// [`Clock::take_next`] once per pass and resets the accumulator so the
/// next pass starts clean.
pub trait Clock {
    fn now(&self) -> Timestamp;

    /// Record a candidate wake deadline, keeping only the earliest one
    /// seen since the last [`Clock::take_next`].
    fn lower_next(&self, candidate: Timestamp);

    /// Take and clear the accumulated next-wake deadline.
    fn take_next(&self) -> Option<Timestamp>;
}

/// Real clock backed by [`SystemTime`].
#[derive(Default)]
pub struct SystemClock {
    next: Mutex<Option<Timestamp>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_system_time(SystemTime::now())
    }

    fn lower_next(&self, candidate: Timestamp) {
        if candidate.is_undef() {
            return;
        }
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        *next = Some(match *next {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        });
    }

    fn take_next(&self) -> Option<Timestamp> {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        next.take()
    }
}

/// Deterministic clock for tests: time only advances when told to.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeClock {
    now: Mutex<Timestamp>,
    next: Mutex<Option<Timestamp>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn at(secs: f64) -> Self {
        FakeClock {
            now: Mutex::new(Timestamp::from_secs_f64(secs)),
            next: Mutex::new(None),
        }
    }

    pub fn advance_to(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = Timestamp::from_secs_f64(secs);
    }

    pub fn advance_secs(&self, secs: f64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = Timestamp::from_secs_f64(now.as_secs_f64() + secs);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lower_next(&self, candidate: Timestamp) {
        if candidate.is_undef() {
            return;
        }
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        *next = Some(match *next {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        });
    }

    fn take_next(&self) -> Option<Timestamp> {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        next.take()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
