use std::sync::Arc;

use warden_adapters::fake::FakeDriver;
use warden_adapters::{LocalNode, MachineryManager};
use warden_core::test_support::{machine_fixture, task_fixture};
use warden_core::{FakeClock, PlatformSelection};
use warden_storage::TaskQueue;

use super::*;

fn local_node(name: &str, machine_name: &str, platform: &str, os_version: &str) -> Arc<LocalNode<FakeDriver>> {
    let driver = FakeDriver::default();
    let mm = MachineryManager::new(vec![machine_fixture(machine_name, platform, os_version)], driver);
    Arc::new(LocalNode::new(name, mm, TaskQueue::new()))
}

#[tokio::test]
async fn find_available_returns_none_with_no_nodes() {
    let registry = NodeRegistry::new();
    let clock = FakeClock::new();
    let task = task_fixture(&clock, "aaaaaa", 1, "windows");
    assert!(registry.find_available(&task).await.is_none());
}

#[tokio::test]
async fn find_available_locks_a_matching_machine() {
    let registry = NodeRegistry::new();
    registry.register(local_node("local", "win10-1", "windows", "10"));
    let clock = FakeClock::new();
    let mut task = task_fixture(&clock, "aaaaaa", 1, "windows");
    task.os_version = "10".into();

    let found = registry.find_available(&task).await;
    let (_node, machine) = found.expect("expected a matching machine");
    assert_eq!(machine.name, "win10-1");
}

#[tokio::test]
async fn find_available_skips_non_matching_platform() {
    let registry = NodeRegistry::new();
    registry.register(local_node("local", "win10-1", "windows", "10"));
    let clock = FakeClock::new();
    let task = task_fixture(&clock, "aaaaaa", 1, "linux");
    assert!(registry.find_available(&task).await.is_none());
}

#[tokio::test]
async fn has_matching_machine_treats_empty_os_version_as_wildcard() {
    let registry = NodeRegistry::new();
    registry.register(local_node("local", "win10-1", "windows", "10"));
    let selection = PlatformSelection::new("windows", "");
    assert!(registry.has_matching_machine(&selection).await);
}

#[tokio::test]
async fn has_named_machine_checks_every_node() {
    let registry = NodeRegistry::new();
    registry.register(local_node("local", "win10-1", "windows", "10"));
    assert!(registry.has_named_machine("win10-1").await);
    assert!(!registry.has_named_machine("nope").await);
}

#[tokio::test]
async fn task_failed_and_release_do_not_panic_with_no_owning_node() {
    let registry = NodeRegistry::new();
    registry.register(local_node("local", "win10-1", "windows", "10"));
    let clock = FakeClock::new();
    let task = task_fixture(&clock, "aaaaaa", 1, "windows");
    registry.task_failed(&task.id, "boom").await;
    assert!(registry.release("does-not-exist").await.is_none());
}
