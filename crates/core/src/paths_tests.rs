// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn paths() -> Paths {
    Paths::new("/cwd")
}

#[test]
fn socket_paths_live_under_operational_sockets() {
    let p = paths();
    assert_eq!(p.socket("statecontroller"), PathBuf::from("/cwd/operational/sockets/statecontroller.sock"));
}

#[test]
fn machine_snapshot_lives_under_operational_generated() {
    assert_eq!(
        paths().machine_snapshot_file(),
        PathBuf::from("/cwd/operational/generated/machinestates.json")
    );
}

#[test]
fn state_snapshot_lives_under_operational_generated() {
    assert_eq!(paths().state_snapshot_file(), PathBuf::from("/cwd/operational/generated/snapshot.zst"));
}

#[test]
fn analysis_dir_is_sharded_by_day() {
    let id = AnalysisId::new(2026, 7, 29, "abc123");
    assert_eq!(
        paths().analysis_dir(&id),
        PathBuf::from("/cwd/storage/analyses/20260729/20260729-abc123")
    );
}

#[test]
fn task_dir_nests_under_owning_analysis() {
    let id = AnalysisId::new(2026, 7, 29, "abc123");
    let task_id = TaskId::new(&id, 2);
    assert_eq!(
        paths().task_dir(&task_id),
        PathBuf::from("/cwd/storage/analyses/20260729/20260729-abc123/task_2")
    );
    assert_eq!(
        paths().task_report_json(&task_id),
        PathBuf::from("/cwd/storage/analyses/20260729/20260729-abc123/task_2/report.json")
    );
}

#[test]
fn binary_blob_shards_by_first_two_hex_chars() {
    let sha = "ab".to_string() + &"0".repeat(62);
    assert_eq!(paths().binary_blob(&sha), PathBuf::from(format!("/cwd/storage/binaries/ab/{sha}")));
}
