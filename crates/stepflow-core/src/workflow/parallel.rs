//! Parallel fan-out — run independent tasks concurrently, wait for all.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::InvokeError;
use crate::logging::RunLogger;
use crate::workflow::invoker::{InvokeRequest, TaskInvoker};
use crate::workflow::schema::TaskSpec;

/// Results of one fan-out, in the same order as the submitted tasks.
#[derive(Debug, Clone)]
pub struct ParallelReport {
    pub results: Vec<Result<String, InvokeError>>,
    /// Indices of required tasks that failed
    pub failed_required: Vec<usize>,
}

impl ParallelReport {
    pub fn succeeded(&self) -> bool {
        self.failed_required.is_empty()
    }
}

pub struct ParallelCoordinator {
    invoker: Arc<dyn TaskInvoker>,
    logger: Arc<dyn RunLogger>,
}

impl ParallelCoordinator {
    pub fn new(invoker: Arc<dyn TaskInvoker>, logger: Arc<dyn RunLogger>) -> Self {
        Self { invoker, logger }
    }

    /// Launch every task at once and collect all results.
    ///
    /// A failing task never cancels its siblings; each task is bounded only by
    /// its own timeout.
    pub async fn run_all(&self, tasks: &[TaskSpec]) -> ParallelReport {
        let mut set = JoinSet::new();
        for (index, task) in tasks.iter().enumerate() {
            let invoker = self.invoker.clone();
            let request = InvokeRequest::from(task);
            set.spawn(async move { (index, invoker.invoke(&request).await) });
        }

        let mut slots: Vec<Option<Result<String, InvokeError>>> = vec![None; tasks.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    self.logger
                        .warn(&format!("[Parallel] Task panicked or was cancelled: {}", e));
                }
            }
        }

        let results: Vec<Result<String, InvokeError>> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(InvokeError::LaunchFailure(
                        "parallel task did not complete".to_string(),
                    ))
                })
            })
            .collect();

        let failed_required = tasks
            .iter()
            .zip(&results)
            .enumerate()
            .filter(|(_, (task, result))| task.required && result.is_err())
            .map(|(i, _)| i)
            .collect();

        ParallelReport {
            results,
            failed_required,
        }
    }
}
