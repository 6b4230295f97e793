//! Workflow engine — typed multi-step assistant workflows.
//!
//! A workflow is an ordered list of steps. Each step either invokes the
//! external assistant, fans several invocations out in parallel, waits, or
//! runs a nested list of steps when a condition over the run context holds.
//!
//! # Architecture
//!
//! ```text
//! workflow.yaml / workflows/<key>.json ──► Workflow (schema)
//!                                              │
//!                                        WorkflowRunner ──► HistoryRecorder ──► workflow-history.json
//!                                              │
//!                        execute_step: invoke │ parallel │ wait │ conditional
//!                                              │      │                 │
//!                                              │  ParallelCoordinator   Condition
//!                                              ▼      ▼
//!                                        TaskInvoker (ProcessInvoker → `claude -p ...`)
//! ```

pub mod condition;
pub mod executor;
pub mod history;
pub mod invoker;
pub mod parallel;
pub mod runner;
pub mod schema;
pub mod store;

pub use condition::Condition;
pub use executor::StepOutcome;
pub use history::{EntryKind, HistoryEntry, HistoryRecorder};
pub use invoker::{InvokeRequest, ProcessInvoker, TaskInvoker};
pub use parallel::{ParallelCoordinator, ParallelReport};
pub use runner::WorkflowRunner;
pub use schema::{Capability, RunContext, Step, TaskSpec, ThinkLevel, Workflow};
pub use store::{storage_key, WorkflowStore};
