use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use warden_adapters::fake::FakeDriver;
use warden_core::test_support::{machine_fixture, task_fixture};
use warden_core::FakeClock;

use super::*;

struct AlwaysOnlineAgent;

#[async_trait]
impl GuestAgent for AlwaysOnlineAgent {
    async fn wait_online(&self, _ip: &str, _timeout: Duration) -> Result<(), TaskRunError> {
        Ok(())
    }
}

struct NeverOnlineAgent;

#[async_trait]
impl GuestAgent for NeverOnlineAgent {
    async fn wait_online(&self, _ip: &str, _timeout: Duration) -> Result<(), TaskRunError> {
        Err(TaskRunError::AgentTimeout("never".into()))
    }
}

#[derive(Default)]
struct RecordingResultServer {
    added: std::sync::Mutex<Vec<String>>,
    removed: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl ResultServerHandle for Arc<RecordingResultServer> {
    async fn add(&self, ip: &str, task_id: &TaskId) -> Result<(), TaskRunError> {
        self.added.lock().unwrap().push(format!("{ip}:{task_id}"));
        Ok(())
    }
    async fn remove(&self, ip: &str, task_id: &TaskId) {
        self.removed.lock().unwrap().push(format!("{ip}:{task_id}"));
    }
}

#[derive(Default)]
struct RecordingReporter {
    done: AtomicUsize,
    failed: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl RunReporter for Arc<RecordingReporter> {
    async fn task_run_done(&self, _task_id: &TaskId) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }
    async fn task_run_failed(&self, task_id: &TaskId, reason: String) {
        self.failed.lock().unwrap().push(format!("{task_id}: {reason}"));
    }
}

fn taskflows() -> TaskflowRegistry {
    let mut registry = TaskflowRegistry::new();
    registry.register(Arc::new(StandardTaskflow));
    registry
}

#[tokio::test]
async fn a_successful_run_reports_done_and_releases_the_machine() {
    let clock = FakeClock::new();
    let task = task_fixture(&clock, "aaaaaa", 1, "windows");
    let machine = machine_fixture("win10-1", "windows", "10");

    let mm = MachineryManager::new(vec![machine.clone()], FakeDriver::default());
    mm.acquire_available(task.id.clone(), Some("win10-1"), None, None, &Default::default());

    let result_server = Arc::new(RecordingResultServer::default());
    let reporter = Arc::new(RecordingReporter::default());

    let runner = TaskRunner::new(mm.clone(), taskflows(), AlwaysOnlineAgent, result_server.clone(), reporter.clone());
    runner.run(task.clone(), machine.clone(), RunTimeout { seconds: 0, enforced: false }).await;

    assert_eq!(reporter.done.load(Ordering::SeqCst), 1);
    assert_eq!(result_server.added.lock().unwrap().len(), 1);
    assert_eq!(result_server.removed.lock().unwrap().len(), 1);
    assert!(mm.machine("win10-1").unwrap().is_available());
}

#[tokio::test]
async fn agent_timeout_reports_failure_and_still_tears_down() {
    let clock = FakeClock::new();
    let task = task_fixture(&clock, "aaaaaa", 1, "windows");
    let machine = machine_fixture("win10-1", "windows", "10");

    let mm = MachineryManager::new(vec![machine.clone()], FakeDriver::default());
    mm.acquire_available(task.id.clone(), Some("win10-1"), None, None, &Default::default());

    let result_server = Arc::new(RecordingResultServer::default());
    let reporter = Arc::new(RecordingReporter::default());

    let runner = TaskRunner::new(mm.clone(), taskflows(), NeverOnlineAgent, result_server.clone(), reporter.clone());
    runner.run(task.clone(), machine.clone(), RunTimeout { seconds: 0, enforced: false }).await;

    assert_eq!(reporter.done.load(Ordering::SeqCst), 0);
    assert_eq!(reporter.failed.lock().unwrap().len(), 1);
    assert_eq!(result_server.removed.lock().unwrap().len(), 1, "teardown must still run on failure");
    assert!(mm.machine("win10-1").unwrap().is_available());
}

#[tokio::test]
async fn unknown_taskflow_kind_fails_without_touching_the_agent() {
    let clock = FakeClock::new();
    let mut task = task_fixture(&clock, "aaaaaa", 1, "windows");
    task.kind = "exotic".into();
    let machine = machine_fixture("win10-1", "windows", "10");

    let mm = MachineryManager::new(vec![machine.clone()], FakeDriver::default());
    mm.acquire_available(task.id.clone(), Some("win10-1"), None, None, &Default::default());

    let result_server = Arc::new(RecordingResultServer::default());
    let reporter = Arc::new(RecordingReporter::default());

    let runner = TaskRunner::new(mm.clone(), taskflows(), NeverOnlineAgent, result_server.clone(), reporter.clone());
    runner.run(task.clone(), machine.clone(), RunTimeout { seconds: 0, enforced: false }).await;

    assert_eq!(reporter.failed.lock().unwrap().len(), 1);
    assert!(result_server.added.lock().unwrap().is_empty(), "result server add happens after taskflow lookup");
}
