// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn task(platform: &str, os_version: &str, tags: &[&str]) -> Task {
    let analysis_id = AnalysisId::new(2026, 7, 29, "abc123");
    Task::new(
        TaskId::new(&analysis_id, 1),
        analysis_id,
        1,
        1_000,
        platform,
        os_version,
        tags.iter().map(|t| t.to_string()).collect(),
        None,
        None,
    )
}

#[test]
fn identical_constraints_yield_identical_dephash() {
    let a = task("windows", "10", &["slow", "zzz"]);
    let b = task("windows", "10", &["zzz", "slow"]);
    assert_eq!(a.dependency_hash(), b.dependency_hash());
}

#[test]
fn differing_constraints_yield_different_dephash() {
    let a = task("windows", "10", &[]);
    let b = task("windows", "7", &[]);
    assert_ne!(a.dependency_hash(), b.dependency_hash());
}

#[test]
fn dephash_displays_as_fixed_width_hex() {
    let h = task("windows", "10", &[]).dependency_hash();
    assert_eq!(h.to_string().len(), 16);
}

#[test]
fn new_task_starts_pending_with_standard_kind() {
    let t = task("windows", "10", &[]);
    assert_eq!(t.state, TaskState::Pending);
    assert_eq!(t.kind, "standard");
    assert!(!t.state.is_terminal());
}
