use std::time::Duration;

use svcsup_core::test_support::{
    FakeControllerPool, FakeFdRegistry, FakeNotifySink, FakeProcessLauncher, FakeSignalSource,
};
use svcsup_core::{Clock, FakeClock, LaunchError, LaunchSpec, ProcessLauncher, Registry, ServiceState};
use nix::unistd::Pid;

use super::Supervisor;

fn new_fake_supervisor(registry: Registry, clock: FakeClock) -> Supervisor {
    Supervisor::new(
        registry,
        Box::new(clock),
        Box::new(FakeSignalSource::new()),
        Box::new(FakeProcessLauncher::new()),
        Box::new(FakeNotifySink::new()),
        Box::new(FakeFdRegistry::new()),
        Box::new(FakeControllerPool::new(4)),
    )
}

#[test]
fn tick_drives_a_scheduled_start_through_to_up() {
    let clock = FakeClock::at(10.0);
    let mut registry = Registry::new();
    let handle = registry.by_name("web", true).expect("create");
    registry
        .get_mut(handle)
        .expect("record")
        .set_argv("/bin/true")
        .expect("set argv");
    registry
        .handle_start(handle, clock.now(), clock.now())
        .expect("schedule start");

    let mut sup = new_fake_supervisor(registry, clock);
    sup.tick();

    assert_eq!(sup.registry().get(handle).expect("record").state(), ServiceState::Up);
}

/// Spawns a real, immediately-exiting child so [`Supervisor::reap_available`]
/// has something genuine to wait on instead of a fake pid `waitpid` would
/// never recognize.
struct RealChildLauncher;

impl ProcessLauncher for RealChildLauncher {
    fn launch(&mut self, _spec: &LaunchSpec) -> Result<Pid, LaunchError> {
        let child = std::process::Command::new("true")
            .spawn()
            .map_err(|_| LaunchError::Fork(nix::Error::EAGAIN))?;
        Ok(Pid::from_raw(child.id() as i32))
    }
}

#[test]
fn reap_available_moves_a_real_child_from_up_to_down() {
    let clock = FakeClock::at(10.0);
    let mut registry = Registry::new();
    let handle = registry.by_name("oneshot", true).expect("create");
    registry
        .get_mut(handle)
        .expect("record")
        .set_argv("/bin/true")
        .expect("set argv");
    registry
        .handle_start(handle, clock.now(), clock.now())
        .expect("schedule start");

    let mut sup = Supervisor::new(
        registry,
        Box::new(clock),
        Box::new(FakeSignalSource::new()),
        Box::new(RealChildLauncher),
        Box::new(FakeNotifySink::new()),
        Box::new(FakeFdRegistry::new()),
        Box::new(FakeControllerPool::new(4)),
    );

    sup.tick();
    assert_eq!(sup.registry().get(handle).expect("record").state(), ServiceState::Up);

    let mut reaped = Vec::new();
    for _ in 0..200 {
        reaped = sup.reap_available().expect("waitpid");
        if !reaped.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(reaped, vec![handle]);
    assert_eq!(sup.registry().get(handle).expect("record").state(), ServiceState::Reaped);

    // No auto-restart trigger was set, so the next sweep settles to DOWN.
    sup.tick();
    assert_eq!(sup.registry().get(handle).expect("record").state(), ServiceState::Down);
}

#[test]
fn reap_available_is_a_noop_with_no_children() {
    let clock = FakeClock::at(1.0);
    let mut sup = new_fake_supervisor(Registry::new(), clock);
    assert_eq!(sup.reap_available().expect("waitpid"), Vec::new());
}
