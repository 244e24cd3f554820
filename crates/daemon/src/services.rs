// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative service manifest: the minimal administrative front-end the
//! daemon ships with. Driving the registry through a full textual control
//! protocol read off stdin is out of scope; what's here is just enough to
//! seed the registry at startup from a static file, so the core's state
//! machine has something real to drive.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use svcsup_core::ports::SignalNames;
use svcsup_core::{Registry, ServiceHandle, Timestamp};

use crate::error::DaemonError;

/// One service definition as it appears in the manifest file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    /// Argv entries, joined internally with `\t` to match
    /// [`svcsup_core::Service::set_argv`]'s tab-separated encoding.
    pub argv: Vec<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub fds: Option<String>,
    #[serde(default)]
    pub triggers: Option<String>,
    #[serde(default)]
    pub restart_interval_secs: Option<u32>,
    /// Whether to schedule an immediate start once loaded, for services
    /// that aren't brought up by `always`/a trigger signal alone.
    #[serde(default)]
    pub start: bool,
}

/// Load and parse the manifest at `path`.
pub fn load_from_file(path: &Path) -> Result<Vec<ServiceSpec>, DaemonError> {
    let bytes = std::fs::read(path).map_err(|e| DaemonError::ServicesFile(path.to_path_buf(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| DaemonError::ServicesParse(path.to_path_buf(), e))
}

/// Apply every spec to `registry`: create the record, set its variables,
/// and (if `start` is set, or `triggers` already implies `always`) bring
/// it up. Returns the handles in manifest order.
///
/// Mirrors `Registry::set_triggers`'s own immediate-start behavior for
/// `always` — this function only needs to force a start for specs that
/// ask for one explicitly without `always`.
pub fn apply_all(
    registry: &mut Registry,
    specs: &[ServiceSpec],
    signal_names: &dyn SignalNames,
    now: Timestamp,
) -> Result<Vec<ServiceHandle>, DaemonError> {
    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let handle = registry.by_name(&spec.name, true)?;
        // Allow expect here: handle was just returned by `by_name(_, true)`
        // on this same registry, so the record is guaranteed to exist.
        #[allow(clippy::expect_used)]
        let svc = registry.get_mut(handle).expect("just created");
        svc.set_argv(&spec.argv.join("\t"))?;
        if let Some(tags) = &spec.tags {
            svc.set_tags(tags)?;
        }
        if let Some(fds) = &spec.fds {
            svc.set_fds(fds)?;
        }
        if let Some(secs) = spec.restart_interval_secs {
            svc.set_restart_interval(Timestamp::UNDEF.checked_add_secs(secs))?;
        }

        if let Some(triggers) = &spec.triggers {
            registry.set_triggers(
                handle,
                triggers,
                |name| signal_names.num_by_name(name),
                now,
            )?;
        }

        // Allow expect here: handle was just returned by `by_name(_, true)`
        // on this same registry, so the record is guaranteed to exist.
        #[allow(clippy::expect_used)]
        let state = registry.get(handle).expect("just created").state();
        if spec.start && state == svcsup_core::ServiceState::Down {
            registry.handle_start(handle, now, now)?;
        }

        handles.push(handle);
    }
    Ok(handles)
}

/// Resolve the manifest path from config, defaulting to `None` when
/// neither `SVCSUPD_SERVICES` nor `<state_dir>/services.json` exist.
pub fn default_path(state_dir: &Path) -> PathBuf {
    state_dir.join("services.json")
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
