use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use warden_core::test_support::analysis_id;

use super::*;

struct CountingPlugin {
    order: i32,
    categories: &'static [&'static str],
    calls: Arc<AtomicUsize>,
    outcome: fn() -> PluginOutcome,
}

#[async_trait]
impl ProcessingPlugin for CountingPlugin {
    fn name(&self) -> &'static str {
        "counting"
    }
    fn order(&self) -> i32 {
        self.order
    }
    fn categories(&self) -> &'static [&'static str] {
        self.categories
    }
    async fn run(&self, _ctx: &mut ProcessingContext) -> PluginOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)()
    }
}

fn ctx(category: &str) -> ProcessingContext {
    ProcessingContext::new(analysis_id("p"), StageKind::Pre, category)
}

#[tokio::test]
async fn run_stage_runs_plugins_in_order_and_stores_keyed_results() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins: Vec<Arc<dyn ProcessingPlugin>> = vec![
        Arc::new(CountingPlugin {
            order: 5,
            categories: &[],
            calls: calls.clone(),
            outcome: || PluginOutcome::Ok(Some(("second", serde_json::json!(2)))),
        }),
        Arc::new(CountingPlugin {
            order: 1,
            categories: &[],
            calls: calls.clone(),
            outcome: || PluginOutcome::Ok(Some(("first", serde_json::json!(1)))),
        }),
    ];

    let mut c = ctx("files");
    let outcome = run_stage(&plugins, &mut c).await;

    assert_eq!(outcome, WorkOutcome::Finished);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(c.result.get("first"), Some(&serde_json::json!(1)));
    assert_eq!(c.result.get("second"), Some(&serde_json::json!(2)));
}

#[tokio::test]
async fn run_stage_skips_plugins_that_do_not_match_the_category() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins: Vec<Arc<dyn ProcessingPlugin>> = vec![Arc::new(CountingPlugin {
        order: 0,
        categories: &["url"],
        calls: calls.clone(),
        outcome: || PluginOutcome::Ok(None),
    })];

    let mut c = ctx("files");
    run_stage(&plugins, &mut c).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn run_stage_stops_at_a_cancellation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins: Vec<Arc<dyn ProcessingPlugin>> = vec![
        Arc::new(CountingPlugin {
            order: 0,
            categories: &[],
            calls: calls.clone(),
            outcome: || PluginOutcome::Cancelled("no signatures matched".into()),
        }),
        Arc::new(CountingPlugin {
            order: 1,
            categories: &[],
            calls: calls.clone(),
            outcome: || PluginOutcome::Ok(None),
        }),
    ];

    let mut c = ctx("files");
    let outcome = run_stage(&plugins, &mut c).await;

    assert!(matches!(outcome, WorkOutcome::WorkFailed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_stage_treats_a_duplicate_key_write_as_a_worker_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins: Vec<Arc<dyn ProcessingPlugin>> = vec![
        Arc::new(CountingPlugin {
            order: 0,
            categories: &[],
            calls: calls.clone(),
            outcome: || PluginOutcome::Ok(Some(("dup", serde_json::json!(1)))),
        }),
        Arc::new(CountingPlugin {
            order: 1,
            categories: &[],
            calls: calls.clone(),
            outcome: || PluginOutcome::Ok(Some(("dup", serde_json::json!(2)))),
        }),
    ];

    let mut c = ctx("files");
    let outcome = run_stage(&plugins, &mut c).await;

    assert!(matches!(outcome, WorkOutcome::WorkerFailed(_)));
}

#[tokio::test]
async fn stage_worker_pool_drains_submitted_work_concurrently() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins: Vec<Arc<dyn ProcessingPlugin>> = vec![Arc::new(CountingPlugin {
        order: 0,
        categories: &[],
        calls: calls.clone(),
        outcome: || PluginOutcome::Ok(None),
    })];
    let pool = StageWorkerPool::spawn(StageKind::Pre, 2, plugins);

    let results = futures_util::future::join_all((0..4).map(|_| pool.submit(ctx("files")))).await;
    assert!(results.iter().all(|(_, outcome)| *outcome == WorkOutcome::Finished));
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    pool.shutdown();
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn plugin_registry_separates_plugins_by_stage() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = PluginRegistry::new();
    registry.register(
        StageKind::Pre,
        Arc::new(CountingPlugin { order: 0, categories: &[], calls: calls.clone(), outcome: || PluginOutcome::Ok(None) }),
    );

    let supervisor = ProcessingSupervisor::new(
        &warden_core::ProcessingCounts { identification: 1, pre: 1, post: 1 },
        registry,
    );

    let (_, outcome) = supervisor.pool_for(StageKind::Pre).submit(ctx("files")).await;
    assert_eq!(outcome, WorkOutcome::Finished);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (_, outcome) = supervisor.pool_for(StageKind::Post).submit(ctx("files")).await;
    assert_eq!(outcome, WorkOutcome::Finished);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    supervisor.shutdown_all();
}
