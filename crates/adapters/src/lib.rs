// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters between the durable core model and the outside world: the
//! machinery manager that drives VM state transitions (C3), the processing
//! worker pool that runs plugin fleets over identification/pre/post stages
//! (C4), the node abstraction unifying local and remote machine fleets (C6),
//! and the result retriever that pulls finished task bundles back from
//! remote nodes (C7).

mod error;
mod machinery;
mod node;
mod processing;
mod retriever;

pub use error::{AdaptersError, AdaptersResult};
pub use machinery::{default_outcome, DriverMachineState, DriverOutcome, MachineDriver, MachineOp, MachineryManager};
pub use node::{HttpEventStreamReader, LocalNode, Node, RemoteNode, ResultServerEndpoint};
pub use processing::{
    run_stage, PluginOutcome, PluginRegistry, ProcessingContext, ProcessingPlugin, ProcessingSupervisor, StageKind,
    StageWorkerPool, WorkOutcome,
};
pub use retriever::{RetrievalJob, RetrievalOutcome, ResultRetriever, DEFAULT_WORKER_COUNT};

#[cfg(any(test, feature = "test-support"))]
pub use machinery::fake;
