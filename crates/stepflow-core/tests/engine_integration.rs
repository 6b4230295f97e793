//! Integration tests for the workflow engine.
//!
//! These drive the public API end to end with a scripted invoker standing in
//! for the external assistant, and temporary directories for the store and
//! history files.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tracing::Level;

use stepflow_core::workflow::{
    Capability, EntryKind, InvokeRequest, ParallelCoordinator, RunContext, Step, TaskInvoker,
    TaskSpec, ThinkLevel, Workflow, WorkflowRunner, WorkflowStore,
};
use stepflow_core::{InvokeError, RecordingLogger, WorkflowError};

/// Replays canned results per instruction; unknown instructions succeed.
#[derive(Default)]
struct ScriptedInvoker {
    failures: HashMap<String, InvokeError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    fn failing(mut self, instruction: &str, error: InvokeError) -> Self {
        self.failures.insert(instruction.to_string(), error);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        self.calls.lock().unwrap().push(request.instruction.clone());
        match self.failures.get(&request.instruction) {
            Some(err) => Err(err.clone()),
            None => Ok(format!("result of {}", request.instruction)),
        }
    }
}

fn exit_failure() -> InvokeError {
    InvokeError::NonZeroExit {
        code: 1,
        stderr: "boom".to_string(),
    }
}

fn runner_with(invoker: Arc<ScriptedInvoker>) -> (WorkflowRunner, RecordingLogger) {
    let logger = RecordingLogger::new();
    (WorkflowRunner::new(invoker, Arc::new(logger.clone())), logger)
}

#[test]
fn test_empty_workflow_is_rejected_before_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let store = WorkflowStore::new(dir.path().join("workflows"));

    let result = store.create("Empty", "nothing to do", vec![]);

    assert!(matches!(result, Err(WorkflowError::Validation(_))));
    assert!(!store.path_for("Empty").exists());
    assert!(!store.dir().exists());
}

#[test]
fn test_create_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = WorkflowStore::new(dir.path());
    let steps = vec![
        Step::invoke(
            TaskSpec::new("Analyze the requirements")
                .named("Analyze")
                .with_capabilities([Capability::Read, Capability::Grep])
                .with_think_level(ThinkLevel::Moderate)
                .with_timeout_secs(120),
        ),
        Step::parallel(vec![
            TaskSpec::new("security review").with_capabilities([Capability::Read]),
            TaskSpec::new("perf review").optional(),
        ]),
        Step::wait(1.5),
        Step::conditional(
            "branch == 'main' and not dry_run",
            vec![Step::invoke(TaskSpec::new("open a PR").with_capabilities([Capability::Bash]))],
        ),
    ];

    let created = store
        .create("TDD Feature Development", "Develop with tests first", steps.clone())
        .unwrap();
    assert!(dir.path().join("tdd-feature-development.json").exists());

    let loaded = store.load("TDD Feature Development").unwrap();
    assert_eq!(loaded.name, "TDD Feature Development");
    assert_eq!(loaded.description, "Develop with tests first");
    assert_eq!(loaded.created, created.created);
    assert_eq!(loaded.steps, steps);
}

#[tokio::test]
async fn test_required_failure_aborts_before_later_steps() {
    let invoker = Arc::new(ScriptedInvoker::default().failing("break", exit_failure()));
    let (mut runner, logger) = runner_with(invoker.clone());
    let wf = Workflow::new(
        "Fail Fast",
        "",
        vec![
            Step::invoke(TaskSpec::new("first")),
            Step::invoke(TaskSpec::new("break")),
            Step::invoke(TaskSpec::new("marker")),
        ],
    )
    .unwrap();

    assert!(!runner.run(&wf, &RunContext::new()).await);

    assert_eq!(invoker.calls(), vec!["first", "break"]);
    let recorded: Vec<&str> = runner
        .history()
        .entries()
        .iter()
        .map(|e| e.instruction.as_str())
        .collect();
    assert_eq!(recorded, vec!["first"]);
    assert!(!recorded.contains(&"marker"));
    assert_eq!(logger.count(Level::ERROR), 1);
}

#[tokio::test]
async fn test_optional_failure_continues_without_entry() {
    let invoker = Arc::new(ScriptedInvoker::default().failing("flaky", exit_failure()));
    let (mut runner, logger) = runner_with(invoker.clone());
    let wf = Workflow::new(
        "Keep Going",
        "",
        vec![
            Step::invoke(TaskSpec::new("flaky").optional()),
            Step::invoke(TaskSpec::new("after")),
        ],
    )
    .unwrap();

    assert!(runner.run(&wf, &RunContext::new()).await);

    let entries = runner.history().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].instruction, "after");
    assert!(entries[0].success);
    assert_eq!(logger.count(Level::ERROR), 0);
    assert!(logger.contains("Optional step failed, continuing"));
}

#[tokio::test]
async fn test_parallel_fan_in_keeps_every_result() {
    let invoker = Arc::new(ScriptedInvoker::default().failing("task 2", exit_failure()));
    let tasks = vec![
        TaskSpec::new("task 1"),
        TaskSpec::new("task 2"),
        TaskSpec::new("task 3"),
    ];

    let report = ParallelCoordinator::new(invoker.clone(), Arc::new(RecordingLogger::new()))
        .run_all(&tasks)
        .await;
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results[0].as_deref(), Ok("result of task 1"));
    assert_eq!(report.results[1], Err(exit_failure()));
    assert_eq!(report.results[2].as_deref(), Ok("result of task 3"));
    assert_eq!(report.failed_required, vec![1]);

    let (mut runner, _) = runner_with(invoker);
    let wf = Workflow::new(
        "Fan Out",
        "",
        vec![Step::parallel(tasks), Step::invoke(TaskSpec::new("synthesize"))],
    )
    .unwrap();
    assert!(!runner.run(&wf, &RunContext::new()).await);

    let kinds: Vec<EntryKind> = runner.history().entries().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EntryKind::ParallelTask, EntryKind::ParallelTask]);
}

#[tokio::test]
async fn test_saving_history_twice_matches_single_save() {
    let (mut runner, _) = runner_with(Arc::new(ScriptedInvoker::default()));
    let wf = Workflow::new(
        "History",
        "",
        vec![
            Step::invoke(TaskSpec::new("a").with_think_level(ThinkLevel::Light)),
            Step::invoke(TaskSpec::new("b")),
        ],
    )
    .unwrap();
    assert!(runner.run(&wf, &RunContext::new()).await);

    let dir = tempfile::tempdir().unwrap();
    let twice = dir.path().join("twice.json");
    let fresh = dir.path().join("fresh.json");
    runner.save_history(&twice).await.unwrap();
    runner.save_history(&twice).await.unwrap();
    runner.save_history(&fresh).await.unwrap();

    let twice = std::fs::read_to_string(twice).unwrap();
    let fresh = std::fs::read_to_string(fresh).unwrap();
    assert_eq!(twice, fresh);

    let parsed: serde_json::Value = serde_json::from_str(&twice).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
    assert_eq!(parsed[0]["instruction"], "think a");
}

#[tokio::test]
async fn test_smoke_test_scenario() {
    let invoker = Arc::new(ScriptedInvoker::default().failing("summarize", exit_failure()));
    let (mut runner, logger) = runner_with(invoker);
    let dir = tempfile::tempdir().unwrap();
    let store = WorkflowStore::new(dir.path());
    let wf = store
        .create(
            "Smoke Test",
            "list, pause, summarize",
            vec![
                Step::invoke(TaskSpec::new("list files")),
                Step::wait(1.0),
                Step::invoke(TaskSpec::new("summarize").optional()),
            ],
        )
        .unwrap();

    let start = std::time::Instant::now();
    assert!(runner.run(&wf, &RunContext::new()).await);
    assert!(start.elapsed() >= std::time::Duration::from_secs(1));

    let entries = runner.history().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, EntryKind::Invoke);
    assert_eq!(entries[0].instruction, "list files");
    assert_eq!(entries[1].kind, EntryKind::Wait);
    assert_eq!(logger.count(Level::ERROR), 0);
    assert!(logger.contains("Workflow completed: Smoke Test"));
}

#[tokio::test]
async fn test_single_launch_failure_scenario() {
    let invoker = Arc::new(ScriptedInvoker::default().failing(
        "deploy",
        InvokeError::LaunchFailure("no such file".to_string()),
    ));
    let (mut runner, logger) = runner_with(invoker);
    let wf = Workflow::new("Deploy", "", vec![Step::invoke(TaskSpec::new("deploy"))]).unwrap();

    assert!(!runner.run(&wf, &RunContext::new()).await);
    assert!(runner.history().is_empty());
    assert_eq!(logger.count(Level::ERROR), 1);
}

#[tokio::test]
async fn test_conditional_uses_caller_context() {
    let invoker = Arc::new(ScriptedInvoker::default());
    let (mut runner, _) = runner_with(invoker.clone());
    let wf = Workflow::from_yaml(
        r#"
name: "Release"
description: "Only publish from main"
steps:
  - type: invoke
    instruction: "run tests"
  - type: conditional
    condition: "branch == 'main' and coverage >= 80"
    steps:
      - type: invoke
        instruction: "publish"
        capabilities: [run-shell]
"#,
    )
    .unwrap();

    let mut ctx = RunContext::new();
    ctx.insert("branch".to_string(), json!("feature/x"));
    ctx.insert("coverage".to_string(), json!(91));
    assert!(runner.run(&wf, &ctx).await);
    assert_eq!(invoker.calls(), vec!["run tests"]);

    ctx.insert("branch".to_string(), json!("main"));
    assert!(runner.run(&wf, &ctx).await);
    assert_eq!(invoker.calls(), vec!["run tests", "run tests", "publish"]);

    let last = runner.history().entries().last().unwrap();
    assert_eq!(last.capabilities, vec![Capability::Bash]);
}
