// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable task queue (§3, §4.2, §6) and its scoped work-finder.
//!
//! Grounded on `original_source/core/cuckoo/taskqueue.py`: queued tasks are
//! offered in `(priority DESC, created_on ASC)` order (P4); a scope tracks a
//! per-scan dephash ignore set so once a constraint combination is known to
//! have no matching machine, every other task sharing it is skipped in O(1)
//! instead of re-evaluated (P3); only one scope may be open process-wide,
//! enforced here with a [`parking_lot::Mutex`] guard rather than an error —
//! a second `open_scope` call blocks until the first scope drops, per the
//! open-question decision in the grounding ledger.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use warden_core::{DependencyHash, Task, TaskState};

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
}

/// The durable queue. Cloning shares the same backing store — callers hand
/// clones to worker tasks that each need a handle to the shared state.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Arc<Mutex<Inner>>,
    scope_lock: Arc<Mutex<()>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Adds a task in `Pending` state.
    pub fn push(&self, task: Task) {
        self.inner.lock().tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unscheduled_count(&self) -> usize {
        self.inner.lock().tasks.iter().filter(|t| t.state == TaskState::Pending).count()
    }

    /// Opens the single work-finder scope. Blocks until any other open scope
    /// is dropped — this never returns an error, matching the spec's "block,
    /// don't reject" contract for a would-be second scope.
    pub fn open_scope(&self) -> WorkFinderScope<'_> {
        let guard = self.scope_lock.lock();
        WorkFinderScope { queue: self, _guard: guard, ignore_set: HashSet::new(), cursor: 0 }
    }
}

/// A scoped iterator over unscheduled tasks. P3: every task it offers has
/// `scheduled == false` and a dephash outside the scope's ignore set.
pub struct WorkFinderScope<'q> {
    queue: &'q TaskQueue,
    _guard: MutexGuard<'q, ()>,
    ignore_set: HashSet<DependencyHash>,
    cursor: usize,
}

impl WorkFinderScope<'_> {
    /// Returns the next unscheduled task matching the optional
    /// platform/os_version filter, in priority-desc/created-on-asc order
    /// (P4), skipping any whose dependency hash is in this scope's ignore
    /// set. Does not mutate queue state — call [`Self::mark_scheduled`] or
    /// [`Self::ignore_similar`] to record a decision.
    pub fn next_unscheduled(&mut self, platform: Option<&str>, os_version: Option<&str>) -> Option<Task> {
        let inner = self.queue.inner.lock();
        let mut candidates: Vec<&Task> = inner
            .tasks
            .iter()
            .filter(|t| t.state == TaskState::Pending)
            .filter(|t| platform.map_or(true, |p| t.platform == p))
            .filter(|t| os_version.map_or(true, |v| t.os_version == v))
            .filter(|t| !self.ignore_set.contains(&t.dependency_hash()))
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_on_ms.cmp(&b.created_on_ms)));
        let next = candidates.get(self.cursor).map(|t| (*t).clone());
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    /// Adds `task`'s dependency hash to this scope's ignore set: no machine
    /// was available for it, so skip every other task sharing the same
    /// platform/os_version/tags/route combination for the rest of this scan.
    pub fn ignore_similar(&mut self, task: &Task) {
        self.ignore_set.insert(task.dependency_hash());
    }

    /// Flips the task to `Running` inside the scope; committed when the
    /// scope is dropped (§4.2: "on scope exit the persistent updates commit
    /// atomically"). The in-memory store here has no separate commit step —
    /// the mutation is visible immediately — so this is where a future
    /// on-disk-backed store would stage the write instead.
    pub fn mark_scheduled(&mut self, task: &Task) {
        let mut inner = self.queue.inner.lock();
        if let Some(stored) = inner.tasks.iter_mut().find(|t| t.id == task.id) {
            stored.state = TaskState::Running;
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
