use super::*;

#[test]
fn undef_is_zero_and_detected() {
    assert!(Timestamp::UNDEF.is_undef());
    assert_eq!(Timestamp::UNDEF.raw(), 0);
}

#[test]
fn epoch_instant_never_collides_with_undef() {
    let t = Timestamp::from_duration_since_epoch(Duration::ZERO);
    assert!(!t.is_undef());
    assert_eq!(t.raw(), 1);
}

#[test]
fn ordering_follows_wall_clock_order() {
    let a = Timestamp::from_secs_f64(10.0);
    let b = Timestamp::from_secs_f64(20.0);
    assert!(a < b);
}

#[test]
fn checked_add_secs_moves_forward() {
    let a = Timestamp::from_secs_f64(10.0);
    let b = a.checked_add_secs(5);
    assert!((b.as_secs_f64() - 15.0).abs() < 1e-6);
}

#[test]
fn negative_or_zero_seconds_become_undef() {
    assert!(Timestamp::from_secs_f64(0.0).is_undef());
    assert!(Timestamp::from_secs_f64(-1.0).is_undef());
}
