// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The node registry, grounded on `original_source/core/cuckoo/scheduler2.py`'s
//! `NodesTracker`: the scheduler's view of every node (local or remote) it
//! may place a task on.

use std::sync::Arc;

use parking_lot::RwLock;
use warden_core::{Machine, PlatformSelection, Task, TaskId};

use warden_adapters::Node;

/// Holds every node the scheduler may place tasks on. Cloning shares the
/// same backing registry — callers hand clones to background tasks that
/// each need to enumerate nodes.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: Arc<RwLock<Vec<Arc<dyn Node>>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry::default()
    }

    pub fn register(&self, node: Arc<dyn Node>) {
        self.nodes.write().push(node);
    }

    pub fn nodes(&self) -> Vec<Arc<dyn Node>> {
        self.nodes.read().clone()
    }

    /// True once at least one node reports an available machine. Used by
    /// the scheduler loop to decide whether it is worth opening a
    /// work-finder scope at all.
    pub async fn any_machine_available(&self) -> bool {
        for node in self.nodes() {
            if node.ready().await {
                return true;
            }
        }
        false
    }

    /// Locks and returns the first available machine across every
    /// registered node matching `task`'s constraints, paired with the node
    /// that owns it. Mirrors `NodesTracker.find_available`'s per-task scan
    /// over every known node.
    pub async fn find_available(&self, task: &Task) -> Option<(Arc<dyn Node>, Machine)> {
        for node in self.nodes() {
            let name = task.machine_name.as_deref();
            let (platform, os_version) =
                if name.is_some() { (None, None) } else { (Some(task.platform.as_str()), Some(task.os_version.as_str())) };
            if let Ok(Some(machine)) = node.acquire_machine(&task.id, name, platform, os_version, &task.machine_tags).await
            {
                return Some((node, machine));
            }
        }
        None
    }

    /// Whether any registered node currently has (or could have) a machine
    /// matching `platform`/`os_version`/`tags`, ignoring current lock state
    /// — used by task creation to validate a platform selection names a
    /// machine that exists at all, not necessarily one free right now. An
    /// empty `os_version` acts as a wildcard: the original's platform
    /// selections often name only a platform, leaving OS version
    /// unconstrained.
    pub async fn has_matching_machine(&self, selection: &PlatformSelection) -> bool {
        for node in self.nodes() {
            let Ok(machines) = node.machines().await else { continue };
            if machines.iter().any(|m| machine_matches(m, selection)) {
                return true;
            }
        }
        false
    }

    pub async fn has_named_machine(&self, name: &str) -> bool {
        for node in self.nodes() {
            let Ok(machines) = node.machines().await else { continue };
            if machines.iter().any(|m| m.matches_name(name)) {
                return true;
            }
        }
        false
    }

    pub async fn release(&self, machine_name: &str) -> Option<()> {
        for node in self.nodes() {
            if node.release_machine(machine_name).await.is_ok() {
                return Some(());
            }
        }
        None
    }

    pub async fn task_failed(&self, task_id: &TaskId, reason: &str) {
        for node in self.nodes() {
            let _ = node.task_failed(task_id, reason).await;
        }
    }
}

fn machine_matches(machine: &Machine, selection: &PlatformSelection) -> bool {
    let os_ok = selection.os_version.is_empty() || machine.os_version == selection.os_version;
    machine.platform == selection.platform && os_ok && selection.tags.is_subset(&machine.tags)
}

#[cfg(test)]
#[path = "nodes_tests.rs"]
mod tests;
