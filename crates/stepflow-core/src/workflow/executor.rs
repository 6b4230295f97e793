//! Step executor — dispatches one step by kind and reports its outcome.
//!
//! Invocation errors stop here: they become [`StepOutcome::Failed`] and
//! never propagate as errors. History entries for completed invocations are
//! appended once the step's outcome is known, after full fan-in for
//! parallel steps.

use std::time::Duration;

use crate::workflow::condition::Condition;
use crate::workflow::history::{EntryKind, HistoryEntry};
use crate::workflow::invoker::InvokeRequest;
use crate::workflow::parallel::ParallelCoordinator;
use crate::workflow::runner::WorkflowRunner;
use crate::workflow::schema::{RunContext, Step, TaskSpec};

/// Result of executing a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran; carries its output (empty for waits and branches)
    Completed(String),
    /// A conditional whose condition was false
    Skipped,
    /// The step failed; `required` decides whether the workflow aborts
    Failed { required: bool },
}

impl StepOutcome {
    pub fn is_abort(&self) -> bool {
        matches!(self, StepOutcome::Failed { required: true })
    }
}

impl WorkflowRunner {
    /// Execute one step against `context`. `parent` names the enclosing
    /// workflow and is used to label conditional sub-workflows.
    pub async fn execute_step(
        &mut self,
        parent: &str,
        step: &Step,
        context: &RunContext,
    ) -> StepOutcome {
        match step {
            Step::Invoke(spec) => self.execute_invoke(spec).await,
            Step::Parallel { tasks, .. } => self.execute_parallel(tasks).await,
            Step::Wait { seconds, .. } => self.execute_wait(*seconds).await,
            Step::Conditional {
                condition, steps, ..
            } => {
                self.execute_conditional(parent, condition, steps, context)
                    .await
            }
        }
    }

    async fn execute_invoke(&mut self, spec: &TaskSpec) -> StepOutcome {
        let request = InvokeRequest::from(spec);
        match self.invoker().invoke(&request).await {
            Ok(output) => {
                self.history_mut()
                    .record(HistoryEntry::for_invocation(EntryKind::Invoke, &request));
                StepOutcome::Completed(output)
            }
            Err(e) => {
                self.logger()
                    .warn(&format!("[Executor] '{}' failed: {}", spec.label(), e));
                StepOutcome::Failed {
                    required: spec.required,
                }
            }
        }
    }

    async fn execute_parallel(&mut self, tasks: &[TaskSpec]) -> StepOutcome {
        self.logger()
            .info(&format!("[Executor] Running {} tasks in parallel...", tasks.len()));

        let report = ParallelCoordinator::new(self.invoker(), self.logger().clone())
            .run_all(tasks)
            .await;

        let mut outputs = Vec::new();
        for (i, (task, result)) in tasks.iter().zip(&report.results).enumerate() {
            match result {
                Ok(output) => {
                    self.history_mut().record(HistoryEntry::for_invocation(
                        EntryKind::ParallelTask,
                        &InvokeRequest::from(task),
                    ));
                    outputs.push(output.clone());
                }
                Err(e) => {
                    let kind = if task.required { "Required" } else { "Optional" };
                    self.logger().warn(&format!(
                        "[Executor] {} parallel task {} failed: {}",
                        kind,
                        i + 1,
                        e
                    ));
                }
            }
        }

        if report.succeeded() {
            StepOutcome::Completed(outputs.join("\n"))
        } else {
            StepOutcome::Failed { required: true }
        }
    }

    async fn execute_wait(&mut self, seconds: f64) -> StepOutcome {
        let Ok(duration) = Duration::try_from_secs_f64(seconds) else {
            self.logger()
                .warn(&format!("[Executor] Invalid wait duration: {}", seconds));
            return StepOutcome::Failed { required: true };
        };

        self.logger()
            .info(&format!("[Executor] Waiting {} seconds...", seconds));
        tokio::time::sleep(duration).await;
        self.history_mut().record(HistoryEntry::for_wait(seconds));
        StepOutcome::Completed(String::new())
    }

    async fn execute_conditional(
        &mut self,
        parent: &str,
        condition: &str,
        steps: &[Step],
        context: &RunContext,
    ) -> StepOutcome {
        let verdict = Condition::parse(condition).and_then(|c| c.evaluate(context));
        match verdict {
            Ok(true) => {
                let sub_workflow = format!("{} - Conditional", parent);
                if self.run_steps(&sub_workflow, steps, context).await {
                    StepOutcome::Completed(String::new())
                } else {
                    StepOutcome::Failed { required: true }
                }
            }
            Ok(false) => StepOutcome::Skipped,
            Err(e) => {
                self.logger().warn(&format!(
                    "[Executor] Rejected condition '{}': {}",
                    condition, e
                ));
                StepOutcome::Failed { required: true }
            }
        }
    }
}
