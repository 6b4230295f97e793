//! stepflow core — a small engine for multi-step assistant workflows.
//!
//! This crate holds the workflow schema, the step executor and runner, the
//! definition store and the history recorder. It has no CLI dependency and
//! can be embedded directly; supply any [`workflow::TaskInvoker`] and
//! [`logging::RunLogger`] implementation to [`WorkflowRunner::new`].

pub mod config;
pub mod error;
pub mod logging;
pub mod workflow;

// Convenience re-exports
pub use config::{EngineConfig, InvokerConfig};
pub use error::{ConditionError, HistoryError, InvokeError, WorkflowError};
pub use logging::{RecordingLogger, RunLogger, TracingLogger};
pub use workflow::{Step, TaskSpec, Workflow, WorkflowRunner, WorkflowStore};
