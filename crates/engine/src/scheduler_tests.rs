use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warden_adapters::fake::FakeDriver;
use warden_adapters::{LocalNode, MachineryManager};
use warden_core::test_support::{machine_fixture, task_fixture};
use warden_core::FakeClock;
use warden_storage::TaskQueue;

use super::*;

fn local_node(name: &str, machine_name: &str, platform: &str, os_version: &str) -> Arc<LocalNode<FakeDriver>> {
    let driver = FakeDriver::default();
    let mm = MachineryManager::new(vec![machine_fixture(machine_name, platform, os_version)], driver);
    Arc::new(LocalNode::new(name, mm, TaskQueue::new()))
}

#[tokio::test]
async fn scan_does_nothing_with_an_empty_queue() {
    let queue = TaskQueue::new();
    let nodes = NodeRegistry::new();
    nodes.register(local_node("local", "win10-1", "windows", "10"));
    let scheduler = Scheduler::new(SchedulerConfig::default(), queue.clone(), nodes, SchedulerWaker::new());

    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    scheduler.scan_once(&tx).await;
    assert_eq!(queue.len(), 0);
}

#[tokio::test]
async fn scan_matches_a_pending_task_to_a_machine_and_marks_it_scheduled() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    queue.push(task_fixture(&clock, "aaaaaa", 1, "windows"));

    let nodes = NodeRegistry::new();
    nodes.register(local_node("local", "win10-1", "windows", "10"));

    let scheduler = Scheduler::new(SchedulerConfig::default(), queue.clone(), nodes, SchedulerWaker::new());

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    scheduler.scan_once(&tx).await;
    drop(tx);

    let startable = rx.recv().await.expect("a startable task was dispatched");
    assert_eq!(startable.machine.name, "win10-1");

    let mut scope = queue.open_scope();
    assert!(scope.next_unscheduled(None, None).is_none(), "the matched task should no longer be unscheduled");
}

#[tokio::test]
async fn scan_ignores_a_task_with_no_matching_machine_without_blocking_others() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    queue.push(task_fixture(&clock, "aaaaaa", 1, "macos"));
    queue.push(task_fixture(&clock, "bbbbbb", 1, "windows"));

    let nodes = NodeRegistry::new();
    nodes.register(local_node("local", "win10-1", "windows", "10"));

    let scheduler = Scheduler::new(SchedulerConfig::default(), queue.clone(), nodes, SchedulerWaker::new());

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    scheduler.scan_once(&tx).await;
    drop(tx);

    let mut dispatched = Vec::new();
    while let Some(s) = rx.recv().await {
        dispatched.push(s);
    }
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].task.platform, "windows");
}

/// Dephash fast-skip: a hundred tasks sharing one unsatisfiable platform
/// plus a single satisfiable task should cost one `find_available` miss per
/// unsatisfiable task at most — `ignore_similar` makes every task after the
/// first miss with the same dependency hash free. This test only checks the
/// scan's output is correct; the O(1)-after-first-miss cost is a property
/// of `WorkFinderScope` itself, exercised directly in `queue_tests.rs`.
#[tokio::test]
async fn dephash_fast_skip_schedules_the_one_satisfiable_task_among_many_unsatisfiable() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    for i in 0..100u32 {
        queue.push(task_fixture(&clock, &format!("z{i:05}"), 1, "macos"));
    }
    queue.push(task_fixture(&clock, "satisfy", 1, "windows"));

    let nodes = NodeRegistry::new();
    nodes.register(local_node("local", "win10-1", "windows", "10"));

    let scheduler = Scheduler::new(SchedulerConfig::default(), queue.clone(), nodes, SchedulerWaker::new());

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    scheduler.scan_once(&tx).await;
    drop(tx);

    let mut dispatched = Vec::new();
    while let Some(s) = rx.recv().await {
        dispatched.push(s);
    }
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].task.platform, "windows");
}

#[tokio::test]
async fn run_loop_wakes_on_demand_and_dispatches_to_the_starter_pool() {
    let clock = FakeClock::new();
    let queue = TaskQueue::new();
    queue.push(task_fixture(&clock, "aaaaaa", 1, "windows"));

    let nodes = NodeRegistry::new();
    nodes.register(local_node("local", "win10-1", "windows", "10"));

    let mut config = SchedulerConfig::default();
    config.periodic_wake_secs = 3600;
    let waker = SchedulerWaker::new();
    let scheduler = Arc::new(Scheduler::new(config, queue.clone(), nodes, waker.clone()));

    let started = Arc::new(AtomicUsize::new(0));
    let started_cb = started.clone();
    let shutdown = CancellationToken::new();
    let shutdown_loop = shutdown.clone();

    let scheduler_loop = scheduler.clone();
    let handle = tokio::spawn(async move {
        scheduler_loop
            .run(shutdown_loop, move |_task, outcome| {
                let started = started_cb.clone();
                async move {
                    if matches!(outcome, StartOutcome::Started) {
                        started.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
            .await;
    });

    waker.wake();
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    waker.wake();
    let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;

    assert_eq!(started.load(Ordering::SeqCst), 1);
}
