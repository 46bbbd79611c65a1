use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use warden_core::{AnalysisId, Clock, FakeClock, Task, TaskId};

use super::*;

fn task(clock: &FakeClock, analysis_suffix: &str, n: u32, priority: u32, platform: &str, os_version: &str, tags: &[&str]) -> Task {
    let aid = AnalysisId::new(2026, 1, 1, analysis_suffix);
    Task::new(
        TaskId::new(&aid, n),
        aid,
        priority,
        clock.epoch_ms(),
        platform,
        os_version,
        tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        None,
        None,
    )
}

#[test]
fn offers_in_priority_desc_then_created_on_asc_order() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000);
    let queue = TaskQueue::new();
    queue.push(task(&clock, "aaaaaa", 1, 1, "windows", "10", &[]));
    let clock2 = FakeClock::new();
    clock2.set_epoch_ms(2_000);
    queue.push(task(&clock2, "bbbbbb", 1, 5, "windows", "10", &[]));
    let clock3 = FakeClock::new();
    clock3.set_epoch_ms(500);
    queue.push(task(&clock3, "cccccc", 1, 5, "windows", "10", &[]));

    let mut scope = queue.open_scope();
    let first = scope.next_unscheduled(None, None).unwrap();
    let second = scope.next_unscheduled(None, None).unwrap();
    let third = scope.next_unscheduled(None, None).unwrap();

    assert_eq!(first.priority, 5);
    assert_eq!(first.created_on_ms, 500);
    assert_eq!(second.priority, 5);
    assert_eq!(second.created_on_ms, 2_000);
    assert_eq!(third.priority, 1);
}

#[test]
fn ignore_similar_skips_every_task_sharing_a_dependency_hash() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    for i in 0..100 {
        queue.push(task(&clock, "aaaaaa", i + 1, 1, "windows", "7", &["slow"]));
    }
    queue.push(task(&clock, "bbbbbb", 1, 1, "windows", "10", &[]));

    let mut scope = queue.open_scope();
    let mut find_calls = 0;
    let mut scheduled = Vec::new();

    loop {
        let Some(t) = scope.next_unscheduled(None, None) else { break };
        find_calls += 1;
        if t.platform == "windows" && t.os_version == "10" {
            scope.mark_scheduled(&t);
            scheduled.push(t.id.to_string());
        } else {
            scope.ignore_similar(&t);
        }
    }

    assert_eq!(scheduled.len(), 1);
    // One failing representative plus the one satisfiable task — not 101 calls.
    assert!(find_calls <= 2, "expected dephash fast-skip, got {find_calls} find_available-equivalent calls");
}

#[test]
fn mark_scheduled_removes_task_from_future_scopes() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    queue.push(task(&clock, "aaaaaa", 1, 1, "windows", "10", &[]));

    {
        let mut scope = queue.open_scope();
        let t = scope.next_unscheduled(None, None).unwrap();
        scope.mark_scheduled(&t);
    }

    assert_eq!(queue.unscheduled_count(), 0);
    let mut scope = queue.open_scope();
    assert!(scope.next_unscheduled(None, None).is_none());
}

#[test]
fn a_second_scope_blocks_until_the_first_drops() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    queue.push(task(&clock, "aaaaaa", 1, 1, "windows", "10", &[]));

    let entered_second = Arc::new(AtomicUsize::new(0));
    let first_scope = queue.open_scope();

    let entered_second_clone = entered_second.clone();
    let queue_clone = queue.clone();
    let handle = std::thread::spawn(move || {
        let _scope = queue_clone.open_scope();
        entered_second_clone.store(1, Ordering::SeqCst);
    });

    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(entered_second.load(Ordering::SeqCst), 0, "second scope must not open while the first is held");

    drop(first_scope);
    handle.join().unwrap();
    assert_eq!(entered_second.load(Ordering::SeqCst), 1);
}
