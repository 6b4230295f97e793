//! Workflow runner — walks a workflow's steps in order.
//!
//! A single cursor advances through the steps. A failed required step aborts
//! the run immediately; optional failures and skipped branches are logged and
//! passed over. Conditional branches re-enter [`WorkflowRunner::run_steps`],
//! so nested steps get the same fail-fast handling and share one history.
//! The innermost failure is logged at ERROR; enclosing levels that abort
//! because of it log at WARN.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HistoryError;
use crate::logging::RunLogger;
use crate::workflow::executor::StepOutcome;
use crate::workflow::history::HistoryRecorder;
use crate::workflow::invoker::TaskInvoker;
use crate::workflow::schema::{RunContext, Step, Workflow};

pub struct WorkflowRunner {
    invoker: Arc<dyn TaskInvoker>,
    logger: Arc<dyn RunLogger>,
    history: HistoryRecorder,
    abort_reported: bool,
}

impl WorkflowRunner {
    pub fn new(invoker: Arc<dyn TaskInvoker>, logger: Arc<dyn RunLogger>) -> Self {
        Self {
            invoker,
            logger,
            history: HistoryRecorder::new(),
            abort_reported: false,
        }
    }

    pub fn invoker(&self) -> Arc<dyn TaskInvoker> {
        self.invoker.clone()
    }

    pub fn logger(&self) -> &Arc<dyn RunLogger> {
        &self.logger
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryRecorder {
        &mut self.history
    }

    pub fn into_history(self) -> HistoryRecorder {
        self.history
    }

    /// Persist everything recorded so far.
    pub async fn save_history(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let path = path.as_ref();
        let result = self.history.save(path).await;
        match &result {
            Ok(()) => self
                .logger
                .info(&format!("Saved workflow history to {}", path.display())),
            Err(e) => self.logger.error(&format!("Failed to save history: {}", e)),
        }
        result
    }

    /// Run a workflow. Returns `true` when every step completed or was
    /// allowed to fail, `false` when a required step aborted the run.
    pub async fn run(&mut self, workflow: &Workflow, context: &RunContext) -> bool {
        self.logger
            .info(&format!("Executing workflow: {}", workflow.name));
        self.abort_reported = false;

        let completed = self
            .run_steps(&workflow.name, &workflow.steps, context)
            .await;

        if completed {
            self.logger
                .info(&format!("Workflow completed: {}", workflow.name));
        } else {
            self.logger
                .warn(&format!("Workflow aborted: {}", workflow.name));
        }
        completed
    }

    /// Run `steps` strictly in sequence under the label `name`.
    pub fn run_steps<'a>(
        &'a mut self,
        name: &'a str,
        steps: &'a [Step],
        context: &'a RunContext,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            let total = steps.len();
            for (i, step) in steps.iter().enumerate() {
                let label = step.label();
                self.logger.info(&format!(
                    "[{}] Step {}/{}: {} ({})",
                    name,
                    i + 1,
                    total,
                    label,
                    step.kind()
                ));

                match self.execute_step(name, step, context).await {
                    StepOutcome::Completed(output) => {
                        self.logger.debug(&format!(
                            "[{}] Step {} completed ({} bytes of output)",
                            name,
                            i + 1,
                            output.len()
                        ));
                    }
                    StepOutcome::Skipped => {
                        self.logger
                            .info(&format!("[{}] Skipped (condition not met): {}", name, label));
                    }
                    StepOutcome::Failed { required: false } => {
                        self.logger.warn(&format!(
                            "[{}] Optional step failed, continuing: {}",
                            name, label
                        ));
                    }
                    StepOutcome::Failed { required: true } => {
                        if self.abort_reported {
                            self.logger
                                .warn(&format!("[{}] Aborting after nested failure: {}", name, label));
                        } else {
                            self.logger
                                .error(&format!("[{}] Required step failed: {}", name, label));
                            self.abort_reported = true;
                        }
                        return false;
                    }
                }
            }
            true
        })
    }
}
