// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exercises the fd-remap table against real pipe fds. Each test forks so
//! the remap (which touches fd slots 0..N, i.e. the process's own stdio)
//! can never disturb the test harness itself or other tests running
//! concurrently — only the throwaway child.

use std::os::fd::{IntoRawFd, RawFd};

use nix::sys::wait::waitpid;
use nix::unistd::{close, dup2, fork, pipe, read, write, ForkResult};

use super::remap_fds;

/// Runs `body` in a forked child; `body` is handed the raw write end of a
/// report pipe and writes its result bytes there. The parent collects
/// those bytes and compares them against `want` once the child exits.
fn run_isolated(want: &[u8], body: impl FnOnce(RawFd)) {
    let (read_end, write_end) = pipe().expect("pipe");
    match unsafe { fork() }.expect("fork") {
        ForkResult::Child => {
            drop(read_end); // close the child's copy of the read end
            body(write_end.into_raw_fd());
            std::process::exit(0);
        }
        ForkResult::Parent { child } => {
            drop(write_end); // close the parent's copy of the write end
            let read_fd = read_end.into_raw_fd();
            let mut buf = vec![0u8; want.len()];
            let mut got = 0;
            while got < buf.len() {
                match read(read_fd, &mut buf[got..]) {
                    Ok(0) => break,
                    Ok(n) => got += n,
                    Err(_) => break,
                }
            }
            let _ = close(read_fd);
            waitpid(child, None).expect("waitpid");
            assert_eq!(&buf[..got], want);
        }
    }
}

#[test]
fn remap_conflict_displaces_then_places_in_reverse_order() {
    // registry maps a -> 0, b -> 1, c -> 2; the service's fds variable is
    // "c\tb\ta", so slot 0 must end up holding
    // what used to be fd 2 (c), slot 1 what used to be fd 1 (b), slot 2
    // what used to be fd 0 (a) — every source fd already sits inside
    // 0..3, which is exactly the conflict phase A exists to resolve.
    run_isolated(b"cba", |report| {
        let (ra, wa) = pipe().expect("pipe a");
        let (rb, wb) = pipe().expect("pipe b");
        let (rc, wc) = pipe().expect("pipe c");
        let (ra, wa) = (ra.into_raw_fd(), wa.into_raw_fd());
        let (rb, wb) = (rb.into_raw_fd(), wb.into_raw_fd());
        let (rc, wc) = (rc.into_raw_fd(), wc.into_raw_fd());
        let _ = write(wa, b"a");
        let _ = write(wb, b"b");
        let _ = write(wc, b"c");
        let _ = close(wa);
        let _ = close(wb);
        let _ = close(wc);

        // Force the three read ends onto fd 0, 1, 2, standing in for the
        // registry having resolved a/b/c to exactly those numbers.
        let _ = dup2(ra, 0);
        let _ = dup2(rb, 1);
        let _ = dup2(rc, 2);
        let _ = close(ra);
        let _ = close(rb);
        let _ = close(rc);

        // fds = "c\tb\ta" -> slot 0 wants fd 2, slot 1 wants fd 1, slot 2 wants fd 0.
        let mut fd_list: Vec<RawFd> = vec![2, 1, 0];
        remap_fds(&mut fd_list).expect("remap");

        for slot in 0..3 {
            let mut byte = [0u8; 1];
            let n = read(slot as RawFd, &mut byte).unwrap_or(0);
            let _ = write(report, if n == 1 { &byte } else { b"?" });
        }
    });
}

#[test]
fn remap_closes_dash_slots() {
    run_isolated(b".", |report| {
        let (r, w) = pipe().expect("pipe");
        let fd = r.into_raw_fd();
        let _ = close(w.into_raw_fd());

        // Slot 0 gets the pipe's read end, slot 1 is closed (`-`).
        let mut fd_list: Vec<RawFd> = vec![fd, -1];
        remap_fds(&mut fd_list).expect("remap");

        // fd 1 should now be closed: writing to it must fail with EBADF.
        let err = write(1, b"x").err();
        let _ = write(report, if err.is_some() { b"." } else { b"x" });
    });
}

#[test]
fn remap_passthrough_when_no_conflict() {
    run_isolated(b".", |report| {
        // Source fd already sits above the destination range, so phase A
        // is a no-op and phase B just dup2s it down to slot 0.
        let (r, w) = pipe().expect("pipe");
        let src = r.into_raw_fd();
        let w = w.into_raw_fd();
        let _ = write(w, b"z");
        let _ = close(w);
        assert!(src >= 1);

        let mut fd_list: Vec<RawFd> = vec![src];
        remap_fds(&mut fd_list).expect("remap");

        let mut byte = [0u8; 1];
        let ok = read(0, &mut byte).ok() == Some(1) && byte[0] == b'z';
        let _ = write(report, if ok { b"." } else { b"x" });
    });
}
