// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state controller (C5): the single reducer that owns every analysis
//! and task transition.
//!
//! Grounded on `original_source/core/cuckoo/machines/handlers.py` and
//! `original_source/core/cuckoo/analyses.py`: one component receives every
//! `trackin`/`workdone`/`workfail`/`taskrundone`/`taskrunfailed` event and is
//! the only writer of analysis/task state, so two reports about the same
//! analysis can never race each other into an inconsistent transition. Work
//! is sharded by analysis id across a small number of async locks rather
//! than funnelled through N literal worker threads — see the open-question
//! decision in `DESIGN.md`; the serialization guarantee (never two
//! in-flight reducer calls for the same analysis id) is the same either way.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use warden_core::{
    Analysis, AnalysisId, AnalysisState, Clock, Config, Paths, PlatformSelection, Settings, Task, TaskId, TaskState,
};
use warden_storage::{write_analysis, write_task, MaterializedState, StorageEvent, TaskQueue, Wal};
use warden_adapters::{ProcessingContext, ProcessingSupervisor, StageKind, WorkOutcome};

use crate::error::{EngineError, EngineResult};
use crate::identification::{read_identification_outcome, IdentificationOutcome};
use crate::nodes::NodeRegistry;

const SHARD_COUNT: usize = 2;

/// The reducer. Cloning shares every piece of backing state — handed to the
/// socket server and to every background task (identification/pre/post
/// submission, scheduler) that needs to report a completion back in.
#[derive(Clone)]
pub struct StateController<C: Clock> {
    clock: C,
    config: Arc<Config>,
    paths: Arc<Paths>,
    wal: Arc<SyncMutex<Wal>>,
    state: Arc<SyncMutex<MaterializedState>>,
    queue: TaskQueue,
    processing: Arc<ProcessingSupervisor>,
    nodes: NodeRegistry,
    /// Identification outcomes awaiting the matching pre-stage completion,
    /// keyed by analysis id. Lives only in memory: losing it mid-analysis
    /// across a restart means the analysis must be resubmitted, an accepted
    /// loss recorded in `DESIGN.md`.
    pending_identification: Arc<SyncMutex<HashMap<String, IdentificationOutcome>>>,
    /// C6 bookkeeping only (`SetRemote`); never read by any transition here.
    remote_assignments: Arc<SyncMutex<HashMap<String, String>>>,
    shards: Arc<[AsyncMutex<()>; SHARD_COUNT]>,
}

impl<C: Clock + 'static> StateController<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        config: Arc<Config>,
        paths: Arc<Paths>,
        wal: Wal,
        state: MaterializedState,
        queue: TaskQueue,
        processing: Arc<ProcessingSupervisor>,
        nodes: NodeRegistry,
    ) -> Self {
        StateController {
            clock,
            config,
            paths,
            wal: Arc::new(SyncMutex::new(wal)),
            state: Arc::new(SyncMutex::new(state)),
            queue,
            processing,
            nodes,
            pending_identification: Arc::new(SyncMutex::new(HashMap::new())),
            remote_assignments: Arc::new(SyncMutex::new(HashMap::new())),
            shards: Arc::new(std::array::from_fn(|_| AsyncMutex::new(()))),
        }
    }

    fn shard_for(&self, analysis_id: &str) -> &AsyncMutex<()> {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in analysis_id.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        &self.shards[(hash as usize) % SHARD_COUNT]
    }

    fn append(&self, event: StorageEvent) -> EngineResult<()> {
        {
            let mut wal = self.wal.lock();
            wal.append(&event)?;
            if wal.needs_flush() {
                wal.flush()?;
            }
        }
        self.state.lock().apply(&event);
        Ok(())
    }

    fn analysis_snapshot(&self, id: &str) -> Option<Analysis> {
        self.state.lock().get_analysis(id).cloned()
    }

    fn task_snapshot(&self, id: &str) -> Option<Task> {
        self.state.lock().get_task(id).cloned()
    }

    fn store_analysis(&self, analysis: &Analysis) -> EngineResult<()> {
        self.append(StorageEvent::AnalysisUpdated { analysis: analysis.clone() })?;
        write_analysis(&self.paths, analysis)?;
        Ok(())
    }

    /// Dispatches one incoming request to its handler. This is the only
    /// entry point a socket handler or scheduler callback should call.
    pub async fn handle(&self, request: warden_wire::StateControllerRequest) -> warden_wire::StateControllerResponse {
        use warden_wire::StateControllerRequest as Req;
        use warden_wire::StateControllerResponse as Resp;

        let result = match request {
            Req::TrackNew { analysis_id } => self.track_new(analysis_id).await,
            Req::WorkDone { analysis_id, stage, task_id } => self.work_done(analysis_id, stage, task_id).await,
            Req::WorkFail { analysis_id, stage, reason, task_id } => {
                self.work_fail(analysis_id, stage, reason, task_id).await
            }
            Req::ManualSetSettings { analysis_id, settings } => self.manual_set_settings(analysis_id, settings).await,
            Req::TaskRunDone { task_id } => self.task_run_done(task_id).await,
            Req::TaskRunFailed { task_id, reason } => self.task_run_failed(task_id, reason).await,
            Req::SetRemote { task_id, node } => self.set_remote(task_id, node),
        };

        match result {
            Ok(()) => Resp::ok(),
            Err(e) => Resp::err(e.to_string()),
        }
    }

    /// A new analysis has landed on disk (`analysis.json` already written by
    /// the submission path) and should enter identification.
    async fn track_new(&self, analysis_id: String) -> EngineResult<()> {
        let id = AnalysisId::from_string(analysis_id)?;
        let _permit = self.shard_for(id.as_str()).lock().await;

        if self.analysis_snapshot(id.as_str()).is_none() {
            let analysis = warden_storage::read_analysis(&self.paths, &id)?;
            self.append(StorageEvent::AnalysisCreated { analysis })?;
        }
        let _ = std::fs::remove_file(self.paths.untracked_marker(&id));

        let category = self.analysis_snapshot(id.as_str()).map(|a| a.category.to_string()).unwrap_or_default();
        let ctx = ProcessingContext::new(id.clone(), StageKind::Identification, category);
        let (ctx, outcome) = self.processing.pool_for(StageKind::Identification).submit(ctx).await;
        self.finish_identification(&id, ctx, outcome).await
    }

    async fn finish_identification(
        &self,
        id: &AnalysisId,
        ctx: ProcessingContext,
        outcome: WorkOutcome,
    ) -> EngineResult<()> {
        match outcome {
            WorkOutcome::Finished => {
                let found = read_identification_outcome(&ctx.result);
                self.apply_identification_result(id, found)
            }
            WorkOutcome::WorkFailed(reason) | WorkOutcome::WorkerFailed(reason) => {
                let mut analysis = self.analysis_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownAnalysis(id.to_string()))?;
                analysis.fail(&self.clock, format!("identification failed: {reason}"));
                self.store_analysis(&analysis)
            }
        }
    }

    fn apply_identification_result(&self, id: &AnalysisId, outcome: IdentificationOutcome) -> EngineResult<()> {
        let mut analysis = self.analysis_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownAnalysis(id.to_string()))?;

        let next_state = if analysis.settings.manual {
            AnalysisState::WaitingManual
        } else if !outcome.selected || outcome.platforms.is_empty() {
            AnalysisState::NoSelected
        } else {
            AnalysisState::PendingPre
        };
        analysis.transition_to(next_state.clone());
        self.pending_identification.lock().insert(id.to_string(), outcome);
        self.store_analysis(&analysis)?;

        if matches!(next_state, AnalysisState::PendingPre) {
            self.spawn_pre(id.clone());
        }
        Ok(())
    }

    fn spawn_pre(&self, id: AnalysisId) {
        let this = self.clone();
        tokio::spawn(async move {
            let _permit = this.shard_for(id.as_str()).lock().await;
            let category = this.analysis_snapshot(id.as_str()).map(|a| a.category.to_string()).unwrap_or_default();
            let ctx = ProcessingContext::new(id.clone(), StageKind::Pre, category);
            let (ctx, outcome) = this.processing.pool_for(StageKind::Pre).submit(ctx).await;
            if let Err(e) = this.finish_pre(&id, ctx, outcome).await {
                tracing::warn!(analysis_id = %id, error = %e, "pre stage completion failed");
            }
        });
    }

    async fn finish_pre(&self, id: &AnalysisId, _ctx: ProcessingContext, outcome: WorkOutcome) -> EngineResult<()> {
        match outcome {
            WorkOutcome::Finished => self.apply_pre_result(id).await,
            WorkOutcome::WorkFailed(reason) | WorkOutcome::WorkerFailed(reason) => {
                let mut analysis = self.analysis_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownAnalysis(id.to_string()))?;
                analysis.fail(&self.clock, format!("pre-processing failed: {reason}"));
                self.store_analysis(&analysis)
            }
        }
    }

    /// Builds the task list from the selections identification produced
    /// (or the operator supplied via `manual_set_settings`), skipping any
    /// selection for which no known machine exists.
    async fn apply_pre_result(&self, id: &AnalysisId) -> EngineResult<()> {
        let outcome = self.pending_identification.lock().remove(id.as_str()).unwrap_or_default();
        let mut analysis = self.analysis_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownAnalysis(id.to_string()))?;

        if analysis.settings.platforms.is_empty() && analysis.settings.machines.is_empty() {
            let mut platforms: Vec<PlatformSelection> =
                outcome.platforms.iter().map(|p| PlatformSelection::new(p.clone(), "")).collect();
            if platforms.len() > 1 {
                platforms.retain(|p| self.config.multi_platform.contains(&p.platform));
            }
            if platforms.is_empty() {
                platforms.push(PlatformSelection::new(self.config.default_platform.clone(), ""));
            }
            analysis.settings.platforms = platforms;
        }
        if self.config.autotag && !outcome.machine_tags.is_empty() {
            analysis.settings.machine_tags.extend(outcome.machine_tags.iter().cloned());
        }
        analysis.settings.normalize();

        let mut next_number = analysis.tasks.len() as u32 + 1;
        let mut created = Vec::new();

        if !analysis.settings.machines.is_empty() {
            for name in analysis.settings.machines.clone() {
                if !self.nodes.has_named_machine(&name).await {
                    analysis.errors.push(&self.clock, format!("no machine named {name:?} exists"));
                    continue;
                }
                let task_id = TaskId::new(id, next_number);
                next_number += 1;
                created.push(Task::new(
                    task_id,
                    id.clone(),
                    analysis.priority,
                    self.clock.epoch_ms(),
                    "",
                    "",
                    Default::default(),
                    Some(name),
                    None,
                ));
            }
        } else {
            for selection in analysis.settings.platforms.clone() {
                if !self.nodes.has_matching_machine(&selection).await {
                    analysis.errors.push(
                        &self.clock,
                        format!("no machine matches platform {:?} os_version {:?}", selection.platform, selection.os_version),
                    );
                    continue;
                }
                let task_id = TaskId::new(id, next_number);
                next_number += 1;
                created.push(Task::new(
                    task_id,
                    id.clone(),
                    analysis.priority,
                    self.clock.epoch_ms(),
                    selection.platform.clone(),
                    selection.os_version.clone(),
                    selection.tags.clone(),
                    None,
                    None,
                ));
            }
        }

        if created.is_empty() {
            analysis.fail(&self.clock, "no task created: no machine available for any requested selection");
            return self.store_analysis(&analysis);
        }

        for task in &created {
            analysis.tasks.push(task.id.clone());
            self.append(StorageEvent::TaskEnqueued { task: task.clone() })?;
            write_task(&self.paths, task)?;
            self.queue.push(task.clone());
        }
        analysis.transition_to(AnalysisState::CompletedPre);
        self.store_analysis(&analysis)
    }

    /// External report of a finished stage, for a wire-facing caller that
    /// drove the stage itself rather than through this process's own
    /// [`ProcessingSupervisor`] (the in-process path above calls
    /// [`Self::finish_identification`]/[`Self::finish_pre`] directly, with
    /// the real result in hand, instead of round-tripping through this).
    /// `post` carries enough on the wire (`task_id`) to look the task back
    /// up; `identification`/`pre` do not carry the stage's result payload,
    /// so a caller reporting those here gets treated as an empty selection
    /// rather than silently hanging.
    async fn work_done(&self, analysis_id: String, stage: String, task_id: Option<String>) -> EngineResult<()> {
        let id = AnalysisId::from_string(analysis_id)?;
        let _permit = self.shard_for(id.as_str()).lock().await;
        match stage.as_str() {
            "identification" => {
                tracing::warn!(analysis_id = %id, "identification workdone reported with no result payload, treating as unselected");
                self.apply_identification_result(&id, IdentificationOutcome::default())
            }
            "pre" => self.apply_pre_result(&id).await,
            "post" => {
                let task_id = task_id.ok_or_else(|| EngineError::InvalidRequest("post workdone missing task_id".into()))?;
                self.finish_post(&TaskId::from_string(task_id)?, WorkOutcome::Finished).await
            }
            other => Err(EngineError::InvalidRequest(format!("unknown stage {other:?}"))),
        }
    }

    async fn work_fail(&self, analysis_id: String, stage: String, reason: String, task_id: Option<String>) -> EngineResult<()> {
        let id = AnalysisId::from_string(analysis_id)?;
        let _permit = self.shard_for(id.as_str()).lock().await;
        match stage.as_str() {
            "post" => {
                let task_id = task_id.ok_or_else(|| EngineError::InvalidRequest("post workfail missing task_id".into()))?;
                self.finish_post(&TaskId::from_string(task_id)?, WorkOutcome::WorkFailed(reason)).await
            }
            _ => {
                let mut analysis = self.analysis_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownAnalysis(id.to_string()))?;
                analysis.fail(&self.clock, format!("{stage} failed: {reason}"));
                self.store_analysis(&analysis)
            }
        }
    }

    /// An operator supplied settings for an analysis parked in
    /// `waiting_manual`. Rejected unless the analysis is in that state.
    async fn manual_set_settings(&self, analysis_id: String, settings: serde_json::Value) -> EngineResult<()> {
        let id = AnalysisId::from_string(analysis_id)?;
        let _permit = self.shard_for(id.as_str()).lock().await;
        let mut analysis = self.analysis_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownAnalysis(id.to_string()))?;

        if !matches!(analysis.state, AnalysisState::WaitingManual) {
            return Err(EngineError::NotWaitingManual(id.to_string(), analysis.state.to_string()));
        }
        let mut settings: Settings = serde_json::from_value(settings)?;
        settings.validate()?;
        settings.normalize();
        analysis.settings = settings;
        analysis.transition_to(AnalysisState::PendingPre);
        self.store_analysis(&analysis)?;

        self.spawn_pre(id);
        Ok(())
    }

    /// C9 reports a task run completed; drives the task to `pending_post`
    /// and submits the post-processing stage for it.
    async fn task_run_done(&self, task_id: String) -> EngineResult<()> {
        let id = TaskId::from_string(task_id)?;
        let analysis_id = id.analysis_id();
        let _permit = self.shard_for(analysis_id.as_str()).lock().await;

        self.append(StorageEvent::TaskStateChanged { task_id: id.to_string(), state: TaskState::PendingPost })?;
        let task = self.task_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownTask(id.to_string()))?;
        write_task(&self.paths, &task)?;

        let this = self.clone();
        let id_for_task = id.clone();
        tokio::spawn(async move {
            let category = this.analysis_snapshot(analysis_id.as_str()).map(|a| a.category.to_string()).unwrap_or_default();
            let ctx = ProcessingContext::new(analysis_id.clone(), StageKind::Post, category);
            let (_ctx, outcome) = this.processing.pool_for(StageKind::Post).submit(ctx).await;
            if let Err(e) = this.finish_post(&id_for_task, outcome).await {
                tracing::warn!(task_id = %id_for_task, error = %e, "post stage completion failed");
            }
        });
        Ok(())
    }

    async fn finish_post(&self, task_id: &TaskId, outcome: WorkOutcome) -> EngineResult<()> {
        let analysis_id = task_id.analysis_id();
        let _permit = self.shard_for(analysis_id.as_str()).lock().await;
        let mut task = self.task_snapshot(task_id.as_str()).ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;

        match outcome {
            WorkOutcome::Finished => {
                self.append(StorageEvent::TaskStateChanged { task_id: task_id.to_string(), state: TaskState::Reported })?;
                task.state = TaskState::Reported;
            }
            WorkOutcome::WorkFailed(reason) | WorkOutcome::WorkerFailed(reason) => {
                let state = TaskState::FatalError { reason };
                self.append(StorageEvent::TaskStateChanged { task_id: task_id.to_string(), state: state.clone() })?;
                task.state = state;
            }
        }
        write_task(&self.paths, &task)?;
        Ok(())
    }

    /// C9 reports a task run failed; drives the task straight to
    /// `fatal_error` without a post stage.
    async fn task_run_failed(&self, task_id: String, reason: String) -> EngineResult<()> {
        let id = TaskId::from_string(task_id)?;
        let _permit = self.shard_for(id.analysis_id().as_str()).lock().await;

        let state = TaskState::FatalError { reason };
        self.append(StorageEvent::TaskStateChanged { task_id: id.to_string(), state: state.clone() })?;
        let mut task = self.task_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownTask(id.to_string()))?;
        task.state = state;
        write_task(&self.paths, &task)?;
        Ok(())
    }

    /// C6 bookkeeping only: associates a task with the remote node running
    /// it, for introspection. Does not touch analysis/task state.
    fn set_remote(&self, task_id: String, node: String) -> EngineResult<()> {
        self.remote_assignments.lock().insert(task_id, node);
        Ok(())
    }

    /// The scheduler's task-starter worker placed `task_id` on `machine`
    /// and `node.add_task` succeeded — commit that placement to durable
    /// state. The scheduler's own in-memory [`warden_storage::TaskQueue`]
    /// already flipped the task to `Running` via `mark_scheduled`; this is
    /// the matching durable-state write so the placement survives a
    /// restart.
    pub async fn task_started(&self, task_id: String, machine: String) -> EngineResult<()> {
        let id = TaskId::from_string(task_id)?;
        let _permit = self.shard_for(id.analysis_id().as_str()).lock().await;

        self.append(StorageEvent::TaskDequeued { task_id: id.to_string(), machine })?;
        let task = self.task_snapshot(id.as_str()).ok_or_else(|| EngineError::UnknownTask(id.to_string()))?;
        write_task(&self.paths, &task)?;
        Ok(())
    }

    /// The scheduler's task-starter worker could not place `task_id` on the
    /// machine it had matched (`node.add_task` failed); the machine has
    /// already been released by the caller. Drives the task straight to
    /// `fatal_error`, same as [`Self::task_run_failed`].
    pub async fn task_start_failed(&self, task_id: String, reason: String) -> EngineResult<()> {
        self.task_run_failed(task_id, reason).await
    }
}

#[cfg(test)]
#[path = "state_controller_tests.rs"]
mod tests;
