use super::*;

#[test]
fn fake_clock_only_moves_when_told() {
    let clock = FakeClock::at(10.0);
    assert!((clock.now().as_secs_f64() - 10.0).abs() < 1e-6);
    clock.advance_secs(5.0);
    assert!((clock.now().as_secs_f64() - 15.0).abs() < 1e-6);
}

#[test]
fn lower_next_keeps_earliest_candidate() {
    let clock = FakeClock::at(0.0);
    clock.lower_next(Timestamp::from_secs_f64(30.0));
    clock.lower_next(Timestamp::from_secs_f64(10.0));
    clock.lower_next(Timestamp::from_secs_f64(20.0));
    let next = clock.take_next().expect("a deadline was recorded");
    assert!((next.as_secs_f64() - 10.0).abs() < 1e-6);
}

#[test]
fn take_next_clears_the_accumulator() {
    let clock = FakeClock::at(0.0);
    clock.lower_next(Timestamp::from_secs_f64(5.0));
    assert!(clock.take_next().is_some());
    assert!(clock.take_next().is_none());
}

#[test]
fn undef_candidates_are_ignored() {
    let clock = FakeClock::at(0.0);
    clock.lower_next(Timestamp::UNDEF);
    assert!(clock.take_next().is_none());
}
