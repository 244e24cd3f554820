// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real [`FdRegistry`]: a name -> fd table seeded with the well-known
//! slots every service's `fds` variable can reference (`null`, the
//! supervisor's own std streams) plus whatever the control-socket wiring
//! registers dynamically per launch (`control.socket`/`control.cmd`/
//! `control.event`).

use std::collections::HashMap;
use std::fs::File;
use std::os::fd::IntoRawFd;

use svcsup_core::ports::{FdHandle, FdRegistry};

/// Static core + whatever the launcher registers transiently. Not
/// thread-safe by design — the registry is only ever touched from the
/// single supervisor loop.
pub struct StaticFdRegistry {
    table: HashMap<String, FdHandle>,
}

impl StaticFdRegistry {
    /// Opens `/dev/null` once and registers `null`, `stdin`, `stdout`,
    /// `stderr` against it/the inherited std fds.
    pub fn new() -> std::io::Result<Self> {
        let null = File::open("/dev/null")?.into_raw_fd();
        let mut table = HashMap::new();
        table.insert("null".to_string(), FdHandle(null));
        table.insert("stdin".to_string(), FdHandle(0));
        table.insert("stdout".to_string(), FdHandle(1));
        table.insert("stderr".to_string(), FdHandle(2));
        Ok(StaticFdRegistry { table })
    }
}

impl FdRegistry for StaticFdRegistry {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_well_known_names() {
        let reg = StaticFdRegistry::new().expect("open /dev/null");
        assert!(reg.lookup("null").is_some());
        assert_eq!(reg.lookup("stdout"), Some(FdHandle(1)));
        assert_eq!(reg.lookup("nonexistent"), None);
    }

    #[test]
    fn register_and_unregister_round_trip() {
        let mut reg = StaticFdRegistry::new().expect("open /dev/null");
        reg.register("control.socket", FdHandle(42));
        assert_eq!(reg.lookup("control.socket"), Some(FdHandle(42)));
        reg.unregister("control.socket");
        assert_eq!(reg.lookup("control.socket"), None);
    }
}
