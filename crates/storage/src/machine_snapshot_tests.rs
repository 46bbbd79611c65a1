use tempfile::tempdir;
use warden_core::Machine;

use super::*;

#[test]
fn dump_then_load_round_trips_inventory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("operational").join("generated").join("machinestates.json");

    let machines = vec![Machine::new("win10-1", "win10 label", "10.0.0.1", "windows", "10", "qemu", 8000)];
    dump(&path, &machines).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "win10-1");
}

#[test]
fn dump_creates_missing_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("operational").join("generated").join("machinestates.json");

    dump(&path, &[]).unwrap();

    assert!(path.exists());
}

#[test]
fn load_of_a_missing_file_is_an_empty_inventory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("operational").join("generated").join("machinestates.json");

    assert_eq!(load(&path).unwrap(), Vec::new());
}

#[test]
fn dump_leaves_no_tmp_file_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("machinestates.json");

    dump(&path, &[]).unwrap();

    assert!(!path.with_extension("json.tmp").exists());
}
