// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide [`Context`]: paths, loaded config, and the ordered
//! shutdown-hook registry every long-lived component registers against
//! instead of each owning its own signal handler.
//!
//! Grounded on `original_source/common/cuckoo/common/startup.py`'s
//! `init_global_logging`/shutdown-handler registration: one place threads
//! shared, constructor-injected state into every component, and shutdown
//! runs a list of callbacks in a fixed order rather than each subsystem
//! tearing itself down independently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use warden_core::{Config, Paths};

type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ShutdownFn = Box<dyn FnOnce() -> ShutdownFuture + Send>;

struct ShutdownHook {
    priority: i32,
    label: &'static str,
    run: ShutdownFn,
}

/// Shutdown hooks run lowest priority first. The queue listener sockets and
/// the database/WAL flush register at ~998-999 so every other component has
/// already torn down before the data they'd still be reporting against goes
/// away.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Mutex<Vec<ShutdownHook>>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        ShutdownHooks::default()
    }

    pub fn register<F, Fut>(&self, priority: i32, label: &'static str, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.lock().push(ShutdownHook { priority, label, run: Box::new(move || Box::pin(hook())) });
    }

    /// Runs every registered hook once, lowest priority first, then clears
    /// the list. Idempotent on an empty registry.
    pub async fn run_all(&self) {
        let mut hooks = std::mem::take(&mut *self.hooks.lock());
        hooks.sort_by_key(|h| h.priority);
        for hook in hooks {
            tracing::debug!(priority = hook.priority, label = hook.label, "running shutdown hook");
            (hook.run)().await;
        }
    }
}

/// Process-wide shared state, constructor-injected into every component
/// instead of reached for through a global.
pub struct Context {
    pub paths: Arc<Paths>,
    pub config: Arc<Config>,
    pub shutdown_hooks: Arc<ShutdownHooks>,
}

impl Context {
    pub fn new(paths: Paths, config: Config) -> Self {
        Context { paths: Arc::new(paths), config: Arc::new(config), shutdown_hooks: Arc::new(ShutdownHooks::new()) }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
