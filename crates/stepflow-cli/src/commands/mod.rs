//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and drives the
//! stepflow-core engine directly.

pub mod invoke;
pub mod workflow;

use std::sync::Arc;

use stepflow_core::workflow::{ProcessInvoker, WorkflowRunner};
use stepflow_core::{EngineConfig, TracingLogger};

/// Build a runner that spawns the configured assistant command and logs
/// through `tracing`.
pub fn init_runner(config: &EngineConfig) -> WorkflowRunner {
    let logger = TracingLogger::shared();
    let invoker = ProcessInvoker::new(config.invoker.clone(), logger.clone());
    WorkflowRunner::new(Arc::new(invoker), logger)
}
