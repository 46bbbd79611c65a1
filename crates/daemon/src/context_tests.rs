use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;

#[tokio::test]
async fn hooks_run_in_priority_order_lowest_first() {
    let hooks = ShutdownHooks::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = order.clone();
    hooks.register(999, "database", move || async move { o.lock().push(999) });
    let o = order.clone();
    hooks.register(10, "engine", move || async move { o.lock().push(10) });
    let o = order.clone();
    hooks.register(500, "sockets", move || async move { o.lock().push(500) });

    hooks.run_all().await;

    assert_eq!(*order.lock(), vec![10, 500, 999]);
}

#[tokio::test]
async fn run_all_is_a_no_op_on_an_empty_registry() {
    let hooks = ShutdownHooks::new();
    hooks.run_all().await;
}

#[tokio::test]
async fn hooks_only_run_once() {
    let hooks = ShutdownHooks::new();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    hooks.register(0, "once", move || {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::SeqCst);
        }
    });

    hooks.run_all().await;
    hooks.run_all().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
}
