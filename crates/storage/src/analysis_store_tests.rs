use tempfile::tempdir;
use warden_core::test_support::analysis_id;
use warden_core::{Analysis, Clock, FakeClock, Paths, Settings, Target, TaskId};

use super::*;

fn settings() -> Settings {
    Settings::builder().build()
}

#[test]
fn write_then_read_analysis_round_trips() {
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let clock = FakeClock::new();

    let id = analysis_id("abcdef");
    let analysis = Analysis::new(id.clone(), &clock, settings(), Target::Url { url: "http://x".into() }, 3).unwrap();

    write_analysis(&paths, &analysis).unwrap();
    let loaded = read_analysis(&paths, &id).unwrap();

    assert_eq!(loaded, analysis);
}

#[test]
fn write_analysis_leaves_no_tmp_file() {
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let clock = FakeClock::new();
    let id = analysis_id("abcdef");
    let analysis = Analysis::new(id, &clock, settings(), Target::Url { url: "http://x".into() }, 1).unwrap();

    write_analysis(&paths, &analysis).unwrap();

    assert!(!paths.analysis_json(&analysis.id).with_extension("json.tmp").exists());
}

#[test]
fn write_then_read_task_round_trips() {
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let id = analysis_id("abcdef");
    let task = warden_core::test_support::task_fixture(&FakeClock::new(), "abcdef", 1, "windows");

    write_task(&paths, &task).unwrap();
    let loaded = read_task(&paths, &TaskId::new(&id, 1)).unwrap();

    assert_eq!(loaded, task);
}

#[test]
fn read_analysis_of_unwritten_id_is_an_error() {
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let id = analysis_id("abcdef");

    assert!(read_analysis(&paths, &id).is_err());
}
