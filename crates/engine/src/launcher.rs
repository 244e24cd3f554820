// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process launcher: `fork`/`exec` with fd remapping. This is the one
//! module in the workspace allowed to call `fork()` — see DESIGN.md for
//! why the workspace-wide `unsafe_code = "deny"` lint is relaxed just
//! here.
#![allow(unsafe_code)]

use std::os::fd::RawFd;

use nix::sys::signal::{SigHandler, Signal};
use nix::unistd::{close, dup, dup2, execvp, fork, ForkResult, Pid};
use std::ffi::CString;

use svcsup_core::{LaunchError, LaunchSpec, ProcessLauncher};

/// Distinct exit status the child uses when it cannot reach `exec` —
/// unknown fd name, descriptor exhaustion, or `exec` itself failing.
pub const EXIT_INVALID_ENVIRONMENT: i32 = 111;

/// Forks and execs services via raw `nix` syscalls. Stateless: every
/// launch is an independent fork, so there is nothing to hold between
/// calls beyond what [`LaunchSpec`] already carries.
#[derive(Debug, Default, Clone, Copy)]
pub struct Launcher;

impl Launcher {
    pub fn new() -> Self {
        Launcher
    }
}

impl ProcessLauncher for Launcher {
    /// Fork a child for `spec`. The child never returns from this call: it
    /// either execs successfully or exits with [`EXIT_INVALID_ENVIRONMENT`].
    /// The parent gets back the child's pid.
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, LaunchError> {
        // Safety: this process is single-threaded with respect to the
        // registry's mutation, and the child performs only
        // async-signal-safe work below before `exec`/`_exit`.
        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => {
                exec_child(spec);
                unreachable!("exec_child never returns");
            }
            ForkResult::Parent { child } => Ok(child),
        }
    }
}

/// Child-side body of [`Launcher::launch`]. Never returns: it either execs
/// the service's argv or exits with [`EXIT_INVALID_ENVIRONMENT`].
///
/// Resets signal disposition, remaps fds in two phases (displace, then
/// place), closes anything past the fd table, then `execvp`.
fn exec_child(spec: &LaunchSpec) -> ! {
    reset_signals_for_exec();

    let fd_count = spec.fds.len();
    // Sized by fd count, not bytes — avoids the fixed-size stack buffer
    // an `alloca(fd_count)` would need to bound some other way.
    let mut fd_list: Vec<RawFd> = spec
        .fds
        .iter()
        .map(|slot| slot.map(|h| h.0).unwrap_or(-1))
        .collect();

    if remap_fds(&mut fd_list).is_err() {
        std::process::exit(EXIT_INVALID_ENVIRONMENT);
    }

    close_fds_above(fd_count as RawFd);

    let Ok(argv_c) = spec
        .argv
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<Vec<_>, _>>()
    else {
        std::process::exit(EXIT_INVALID_ENVIRONMENT);
    };
    let Some(prog) = argv_c.first() else {
        std::process::exit(EXIT_INVALID_ENVIRONMENT);
    };

    let _ = execvp(prog, &argv_c);
    // execvp only returns on failure.
    std::process::exit(EXIT_INVALID_ENVIRONMENT);
}

/// The two-phase fd remap: displace any source fd that
/// sits inside `0..fd_list.len()` out of the way (phase A), then `dup2`
/// each into its slot or close the slot for `-1` entries (phase B). Pulled
/// out of [`exec_child`] so the displace/place logic is unit-testable
/// against real pipe fds without going through a real fork.
pub(crate) fn remap_fds(fd_list: &mut [RawFd]) -> Result<(), nix::Error> {
    let fd_count = fd_list.len();

    for i in 0..fd_count {
        while fd_list[i] >= 0 && (fd_list[i] as usize) < fd_count {
            fd_list[i] = dup(fd_list[i])?;
        }
    }

    for (i, &fd) in fd_list.iter().enumerate() {
        if fd >= 0 {
            dup2(fd, i as RawFd)?;
        } else {
            let _ = close(i as RawFd);
        }
    }

    Ok(())
}

/// Reset the signal mask and dispositions to what a freshly-exec'd process
/// would inherit, so the child doesn't carry over whatever the supervisor
/// itself was doing with signals (ignored SIGCHLD, blocked SIGTERM, etc).
fn reset_signals_for_exec() {
    let empty = nix::sys::signal::SigSet::empty();
    let _ =
        nix::sys::signal::sigprocmask(nix::sys::signal::SigmaskHow::SIG_SETMASK, Some(&empty), None);

    for signum in Signal::iterator() {
        // Safety: child is single-threaded and about to exec; resetting
        // dispositions here is async-signal-safe.
        let _ = unsafe { nix::sys::signal::signal(signum, SigHandler::SigDfl) };
    }
}

/// Close every fd from `from` up to a conservative ceiling, mirroring the
/// original's `while (i < FD_SETSIZE) close(i++)`.
fn close_fds_above(from: RawFd) {
    let limit = nix::unistd::sysconf(nix::unistd::SysconfVar::OPEN_MAX)
        .ok()
        .flatten()
        .unwrap_or(1024) as RawFd;
    for fd in from..limit {
        let _ = close(fd);
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
