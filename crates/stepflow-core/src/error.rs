//! Error types for the stepflow engine.
//!
//! Invocation errors are converted into step outcomes by the executor and
//! never escape a run. Definition, history and condition errors surface to
//! the caller as ordinary `Result`s.

use std::time::Duration;

/// Failure of a single external assistant invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("Failed to launch: {0}")]
    LaunchFailure(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
}

/// Errors from the workflow definition store.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Validation(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from saving the execution history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from parsing or evaluating a step condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Undefined name: {0}")]
    UndefinedName(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}
