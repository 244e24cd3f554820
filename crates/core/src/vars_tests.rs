use super::*;

#[test]
fn set_then_get_round_trips() {
    let mut vars = VarStore::heap();
    vars.set("FOO", Some("bar")).unwrap();
    assert_eq!(vars.get("FOO"), Some("bar"));
}

#[test]
fn unset_removes_entry_and_shifts_remaining_bytes() {
    let mut vars = VarStore::heap();
    vars.set("A", Some("1")).unwrap();
    vars.set("B", Some("2")).unwrap();
    vars.set("C", Some("3")).unwrap();
    vars.unset("B").unwrap();
    assert_eq!(vars.get("B"), None);
    assert_eq!(vars.get("A"), Some("1"));
    assert_eq!(vars.get("C"), Some("3"));
}

#[test]
fn overwriting_a_shorter_value_shrinks_buffer() {
    let mut vars = VarStore::heap();
    vars.set("FOO", Some("a-long-value")).unwrap();
    let before = vars.len_bytes();
    vars.set("FOO", Some("x")).unwrap();
    assert!(vars.len_bytes() < before);
    assert_eq!(vars.get("FOO"), Some("x"));
}

#[test]
fn pool_mode_rejects_writes_past_capacity() {
    let mut vars = VarStore::pool(8);
    let err = vars.set("LONGNAME", Some("value")).unwrap_err();
    assert!(matches!(err, VarError::StoreFull { capacity: 8 }));
    assert!(vars.is_empty());
}

#[test]
fn pool_mode_allows_writes_within_capacity() {
    let mut vars = VarStore::pool(16);
    vars.set("A", Some("1")).unwrap();
    assert_eq!(vars.get("A"), Some("1"));
}

#[test]
fn name_with_equals_sign_is_rejected() {
    let mut vars = VarStore::heap();
    let err = vars.set("BAD=NAME", Some("x")).unwrap_err();
    assert!(matches!(err, VarError::InvalidName(_)));
}

#[test]
fn iter_yields_entries_in_storage_order() {
    let mut vars = VarStore::heap();
    vars.set("A", Some("1")).unwrap();
    vars.set("B", Some("2")).unwrap();
    let collected: Vec<_> = vars.iter().collect();
    assert_eq!(collected, vec![("A", "1"), ("B", "2")]);
}
