use super::*;
use crate::clock::FakeClock;
use crate::service::{ServiceState, FORK_RETRY_DELAY_SECS};
use crate::test_support::{
    FakeControllerPool, FakeFdRegistry, FakeNotifySink, FakeProcessLauncher, FakeSignalNames,
    FakeSignalSource,
};

struct Harness {
    registry: Registry,
    clock: FakeClock,
    signals: FakeSignalSource,
    launcher: FakeProcessLauncher,
    notify: FakeNotifySink,
    fds: FakeFdRegistry,
    controllers: FakeControllerPool,
}

impl Harness {
    fn new() -> Self {
        Harness {
            registry: Registry::new(),
            clock: FakeClock::at(1.0),
            signals: FakeSignalSource::new(),
            launcher: FakeProcessLauncher::new(),
            notify: FakeNotifySink::new(),
            fds: FakeFdRegistry::new().with("null", 10),
            controllers: FakeControllerPool::new(4),
        }
    }

    fn run_active(&mut self) {
        let mut deps = Deps {
            clock: &self.clock,
            signals: &mut self.signals,
            launcher: &mut self.launcher,
            notify: &mut self.notify,
            fds: &mut self.fds,
            controllers: &mut self.controllers,
        };
        self.registry.run_active(&mut deps);
    }
}

#[test]
fn scenario_create_and_start() {
    let mut h = Harness::new();
    let handle = h.registry.by_name("web", true).unwrap();
    h.registry.get_mut(handle).unwrap().set_argv("/bin/httpd").unwrap();

    let now = Timestamp::from_secs_f64(10.0);
    h.registry.handle_start(handle, now, now).unwrap();

    let svc = h.registry.get(handle).unwrap();
    assert_eq!(svc.state(), ServiceState::Start);
    assert_eq!(svc.up_time(), now);
    assert!(svc.wants_active());
}

#[test]
fn scenario_back_off_after_short_run() {
    let mut h = Harness::new();
    let handle = h.registry.by_name("web", true).unwrap();
    h.registry.get_mut(handle).unwrap().set_argv("/bin/httpd").unwrap();
    h.registry
        .get_mut(handle)
        .unwrap()
        .set_triggers("always", |_| None)
        .unwrap();
    h.registry
        .get_mut(handle)
        .unwrap()
        .set_restart_interval(Timestamp::from_secs_f64(10.0))
        .unwrap();

    let t0 = Timestamp::from_secs_f64(100.0);
    h.registry.handle_start(handle, t0, t0).unwrap();
    h.registry
        .get_mut(handle)
        .unwrap()
        .mark_forked(nix::unistd::Pid::from_raw(55), t0);
    h.registry.by_pid.insert(55, handle.0);

    let t1 = Timestamp::from_secs_f64(102.0);
    h.registry.handle_reaped(handle, 0, t1).unwrap();

    h.clock.advance_to(102.0);
    h.run_active();

    let svc = h.registry.get(handle).unwrap();
    assert_eq!(svc.state(), ServiceState::Start);
    assert!((svc.up_time().as_secs_f64() - 112.0).abs() < 1e-6);
}

#[test]
fn scenario_signal_trigger_starts_down_service() {
    let mut h = Harness::new();
    let handle = h.registry.by_name("web", true).unwrap();
    h.registry.get_mut(handle).unwrap().set_argv("/bin/httpd").unwrap();
    h.registry
        .set_triggers(handle, "SIGHUP", |n| FakeSignalNames.num_by_name(n), Timestamp::from_secs_f64(1.0))
        .unwrap();

    let sighup = FakeSignalNames.num_by_name("SIGHUP").unwrap();
    h.clock.advance_to(5.0);
    h.signals.push(sighup, Timestamp::from_secs_f64(5.0));
    h.run_active();

    let svc = h.registry.get(handle).unwrap();
    assert_eq!(svc.state(), ServiceState::Start);
    assert_eq!(svc.up_time(), Timestamp::from_secs_f64(5.0));
}

#[test]
fn scenario_fork_retry_on_launch_failure() {
    let mut h = Harness::new();
    let handle = h.registry.by_name("web", true).unwrap();
    h.registry.get_mut(handle).unwrap().set_argv("/bin/httpd").unwrap();
    h.launcher.fail_next_launch();

    let now = Timestamp::from_secs_f64(20.0);
    h.registry.handle_start(handle, now, now).unwrap();
    h.clock.advance_to(20.0);
    h.run_active();

    let svc = h.registry.get(handle).unwrap();
    assert_eq!(svc.state(), ServiceState::Start);
    assert!(
        (svc.up_time().as_secs_f64() - (20.0 + FORK_RETRY_DELAY_SECS as f64)).abs() < 1e-6
    );
}

#[test]
fn scenario_pool_slot_overflow_leaves_vars_unchanged() {
    let mut registry = Registry::with_pool_capacity(32);
    let handle = registry.by_name("web", true).unwrap();
    let before = registry.get(handle).unwrap().tags().to_string();

    let huge_value = "x".repeat(40);
    let err = registry.get_mut(handle).unwrap().set_tags(&huge_value);
    assert!(err.is_err());
    assert_eq!(registry.get(handle).unwrap().tags(), before);
}

#[test]
fn scenario_name_iteration_lower_bound() {
    let mut registry = Registry::new();
    registry.by_name("a", true).unwrap();
    registry.by_name("c", true).unwrap();
    registry.by_name("e", true).unwrap();

    let c = registry.iter_next(Some("b")).unwrap();
    assert_eq!(registry.get(c).unwrap().name().as_str(), "c");

    let e = registry.iter_next(Some("c")).unwrap();
    assert_eq!(registry.get(e).unwrap().name().as_str(), "e");

    assert!(registry.iter_next(Some("e")).is_none());
}

#[test]
fn by_name_is_idempotent_get_or_create() {
    let mut registry = Registry::new();
    let a = registry.by_name("svc", true).unwrap();
    let b = registry.by_name("svc", true).unwrap();
    assert_eq!(a, b);
}

#[test]
fn by_name_without_create_reports_not_found() {
    let mut registry = Registry::new();
    assert!(registry.by_name("missing", false).is_err());
}

#[test]
fn delete_removes_from_both_indices() {
    let mut registry = Registry::new();
    let handle = registry.by_name("web", true).unwrap();
    let now = Timestamp::from_secs_f64(1.0);
    registry.handle_start(handle, now, now).unwrap();
    registry
        .get_mut(handle)
        .unwrap()
        .mark_forked(nix::unistd::Pid::from_raw(42), now);
    registry.by_pid.insert(42, handle.0);

    registry.delete(handle).unwrap();
    assert!(registry.get(handle).is_none());
    assert!(registry.by_name("web", false).is_err());
    assert!(registry.by_pid(nix::unistd::Pid::from_raw(42)).is_none());
}

#[test]
fn active_sweep_tolerates_self_removal_mid_walk() {
    let mut h = Harness::new();
    let a = h.registry.by_name("a", true).unwrap();
    let b = h.registry.by_name("b", true).unwrap();
    h.registry.get_mut(a).unwrap().set_argv("/bin/a").unwrap();
    h.registry.get_mut(b).unwrap().set_argv("/bin/b").unwrap();

    let now = Timestamp::from_secs_f64(5.0);
    h.registry.handle_start(a, now, now).unwrap();
    h.registry.handle_start(b, now, now).unwrap();
    h.clock.advance_to(5.0);

    // Both fork successfully and deactivate themselves mid-sweep; the
    // sweep must still visit both without skipping or double-visiting.
    h.run_active();

    assert_eq!(h.registry.get(a).unwrap().state(), ServiceState::Up);
    assert_eq!(h.registry.get(b).unwrap().state(), ServiceState::Up);
    assert_eq!(h.launcher.launched.len(), 2);
}

#[test]
fn last_signal_ts_is_monotonic_across_runs() {
    let mut h = Harness::new();
    let handle = h.registry.by_name("web", true).unwrap();
    h.registry
        .set_triggers(handle, "SIGHUP", |n| FakeSignalNames.num_by_name(n), Timestamp::from_secs_f64(1.0))
        .unwrap();
    let sighup = FakeSignalNames.num_by_name("SIGHUP").unwrap();

    h.signals.push(sighup, Timestamp::from_secs_f64(5.0));
    h.run_active();
    let after_first = h.registry.last_signal_ts();

    h.signals.push(sighup, Timestamp::from_secs_f64(9.0));
    h.run_active();
    let after_second = h.registry.last_signal_ts();

    assert!(after_second.raw() >= after_first.raw());
}
