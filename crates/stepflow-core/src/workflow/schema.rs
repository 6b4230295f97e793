//! Schema types for workflow definitions.
//!
//! A workflow document describes an ordered list of typed steps:
//!
//! ```yaml
//! name: "Parallel Code Analysis"
//! description: "Analyze code from multiple perspectives"
//! steps:
//!   - type: parallel
//!     name: "Analysis"
//!     tasks:
//!       - instruction: "Analyze code for security vulnerabilities"
//!         capabilities: [Read, Grep]
//!         think_level: moderate
//!       - instruction: "Analyze code for maintainability"
//!         capabilities: [Read]
//!         required: false
//!
//!   - type: wait
//!     seconds: 5
//!
//!   - type: conditional
//!     condition: "branch == 'main' and not dry_run"
//!     steps:
//!       - type: invoke
//!         instruction: "Synthesize all results into a report"
//!         capabilities: [Write]
//! ```
//!
//! Step kinds are decoded once into [`Step`]; dispatch never re-reads the
//! `type` tag.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WorkflowError;
use crate::workflow::condition::Condition;

/// Caller-supplied values that conditional steps are evaluated against.
pub type RunContext = HashMap<String, serde_json::Value>;

/// A permission granted to a single external invocation.
///
/// Serialized as the assistant's tool name. Tags this version does not
/// recognize are kept verbatim in `Unknown` so they survive a load/save
/// cycle, but are never passed to the tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Write,
    Edit,
    Bash,
    Glob,
    Grep,
    Ls,
    WebFetch,
    WebSearch,
    Task,
    Batch,
    Unknown(String),
}

impl Capability {
    /// Tool name as understood by the external assistant.
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            Capability::Read => Some("Read"),
            Capability::Write => Some("Write"),
            Capability::Edit => Some("Edit"),
            Capability::Bash => Some("Bash"),
            Capability::Glob => Some("Glob"),
            Capability::Grep => Some("Grep"),
            Capability::Ls => Some("LS"),
            Capability::WebFetch => Some("WebFetch"),
            Capability::WebSearch => Some("WebSearch"),
            Capability::Task => Some("Task"),
            Capability::Batch => Some("Batch"),
            Capability::Unknown(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Capability::Unknown(_))
    }

    /// Tool name, or the original tag for unrecognized capabilities.
    pub fn as_str(&self) -> &str {
        match self {
            Capability::Unknown(tag) => tag,
            known => known.tool_name().unwrap_or_default(),
        }
    }

    /// Parse a capability tag or alias, keeping unrecognized tags as `Unknown`.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        match tag {
            "Read" | "READ" | "read" | "read-file" => Capability::Read,
            "Write" | "WRITE" | "write" | "write-file" => Capability::Write,
            "Edit" | "EDIT" | "edit" => Capability::Edit,
            "Bash" | "BASH" | "bash" | "run-shell" => Capability::Bash,
            "Glob" | "GLOB" | "glob" => Capability::Glob,
            "Grep" | "GREP" | "grep" => Capability::Grep,
            "LS" | "Ls" | "ls" => Capability::Ls,
            "WebFetch" | "WEBFETCH" | "web-fetch" | "fetch-web" => Capability::WebFetch,
            "WebSearch" | "WEBSEARCH" | "web-search" => Capability::WebSearch,
            "Task" | "TASK" | "task" | "spawn-subtask" => Capability::Task,
            "Batch" | "BATCH" | "batch" => Capability::Batch,
            other => Capability::Unknown(other.to_string()),
        }
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Capability::parse(&tag))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory effort hint prefixed onto an instruction.
///
/// `None` through `Maximum` are ordered; `Wide` and `Unknown` compare only
/// equal to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkLevel {
    #[default]
    #[serde(alias = "", alias = "normal")]
    None,
    #[serde(alias = "think")]
    Light,
    #[serde(alias = "think hard")]
    Moderate,
    #[serde(alias = "think harder")]
    Heavy,
    #[serde(alias = "ultrathink")]
    Maximum,
    #[serde(alias = "megathink")]
    Wide,
    #[serde(other)]
    Unknown,
}

impl ThinkLevel {
    /// Phrase prepended to the instruction, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ThinkLevel::None | ThinkLevel::Unknown => None,
            ThinkLevel::Light => Some("think"),
            ThinkLevel::Moderate => Some("think hard"),
            ThinkLevel::Heavy => Some("think harder"),
            ThinkLevel::Maximum => Some("ultrathink"),
            ThinkLevel::Wide => Some("megathink"),
        }
    }

    /// Apply the hint to an instruction.
    pub fn apply(&self, instruction: &str) -> String {
        match self.hint() {
            Some(hint) => format!("{} {}", hint, instruction),
            None => instruction.to_string(),
        }
    }

    /// Parse a level by name or hint phrase, falling back to `Unknown`.
    pub fn parse(tag: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(tag.trim().to_string()))
            .unwrap_or(ThinkLevel::Unknown)
    }

    fn rank(&self) -> Option<u8> {
        match self {
            ThinkLevel::None => Some(0),
            ThinkLevel::Light => Some(1),
            ThinkLevel::Moderate => Some(2),
            ThinkLevel::Heavy => Some(3),
            ThinkLevel::Maximum => Some(4),
            ThinkLevel::Wide | ThinkLevel::Unknown => None,
        }
    }
}

impl PartialOrd for ThinkLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }
}

impl fmt::Display for ThinkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThinkLevel::None => "none",
            ThinkLevel::Light => "light",
            ThinkLevel::Moderate => "moderate",
            ThinkLevel::Heavy => "heavy",
            ThinkLevel::Maximum => "maximum",
            ThinkLevel::Wide => "wide",
            ThinkLevel::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A single assistant invocation, used directly by `invoke` steps and as
/// an element of `parallel` steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Optional display name for logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Instruction text sent to the assistant
    #[serde(alias = "prompt")]
    pub instruction: String,

    /// Capabilities granted to the invocation
    #[serde(default, alias = "tools")]
    pub capabilities: Vec<Capability>,

    #[serde(default)]
    pub think_level: ThinkLevel,

    /// Timeout in seconds; no deadline when absent
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Whether a failure aborts the enclosing workflow
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl TaskSpec {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            name: None,
            instruction: instruction.into(),
            capabilities: Vec::new(),
            think_level: ThinkLevel::None,
            timeout_secs: None,
            required: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_think_level(mut self, level: ThinkLevel) -> Self {
        self.think_level = level;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Name for log lines, falling back to the instruction.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| truncate(&self.instruction, 48))
    }
}

/// One unit of work within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Single assistant invocation
    #[serde(alias = "claude_code")]
    Invoke(TaskSpec),

    /// Independent invocations run concurrently
    Parallel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        tasks: Vec<TaskSpec>,
    },

    /// Fixed pause before the next step
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default = "default_wait_seconds")]
        seconds: f64,
    },

    /// Nested steps run only when `condition` holds for the run context
    Conditional {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        condition: String,
        steps: Vec<Step>,
    },
}

fn default_wait_seconds() -> f64 {
    1.0
}

impl Step {
    pub fn invoke(spec: TaskSpec) -> Self {
        Step::Invoke(spec)
    }

    pub fn parallel(tasks: Vec<TaskSpec>) -> Self {
        Step::Parallel { name: None, tasks }
    }

    pub fn wait(seconds: f64) -> Self {
        Step::Wait { name: None, seconds }
    }

    pub fn conditional(condition: impl Into<String>, steps: Vec<Step>) -> Self {
        Step::Conditional {
            name: None,
            condition: condition.into(),
            steps,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::Invoke(_) => "invoke",
            Step::Parallel { .. } => "parallel",
            Step::Wait { .. } => "wait",
            Step::Conditional { .. } => "conditional",
        }
    }

    /// Display name for log lines.
    pub fn label(&self) -> String {
        match self {
            Step::Invoke(spec) => spec.label(),
            Step::Parallel { name, tasks } => name
                .clone()
                .unwrap_or_else(|| format!("{} parallel task(s)", tasks.len())),
            Step::Wait { name, seconds } => name
                .clone()
                .unwrap_or_else(|| format!("wait {}s", seconds)),
            Step::Conditional { name, condition, .. } => name
                .clone()
                .unwrap_or_else(|| format!("if {}", truncate(condition, 40))),
        }
    }

    /// Check the kind-specific required fields, recursing into nested steps.
    pub fn validate(&self, path: &str) -> Result<(), WorkflowError> {
        match self {
            Step::Invoke(spec) => validate_task(spec, path),
            Step::Parallel { tasks, .. } => {
                if tasks.is_empty() {
                    return Err(WorkflowError::Validation(format!(
                        "{}: parallel step has no tasks",
                        path
                    )));
                }
                for (i, task) in tasks.iter().enumerate() {
                    validate_task(task, &format!("{}.tasks[{}]", path, i))?;
                }
                Ok(())
            }
            Step::Wait { seconds, .. } => {
                if !seconds.is_finite() || *seconds < 0.0 {
                    return Err(WorkflowError::Validation(format!(
                        "{}: wait duration must be a non-negative number of seconds, got {}",
                        path, seconds
                    )));
                }
                Ok(())
            }
            Step::Conditional {
                condition, steps, ..
            } => {
                Condition::parse(condition).map_err(|e| {
                    WorkflowError::Validation(format!("{}: bad condition: {}", path, e))
                })?;
                if steps.is_empty() {
                    return Err(WorkflowError::Validation(format!(
                        "{}: conditional step has no nested steps",
                        path
                    )));
                }
                validate_steps(steps, &format!("{}.steps", path))
            }
        }
    }
}

fn validate_task(spec: &TaskSpec, path: &str) -> Result<(), WorkflowError> {
    if spec.instruction.trim().is_empty() {
        return Err(WorkflowError::Validation(format!(
            "{}: instruction must not be empty",
            path
        )));
    }
    Ok(())
}

pub(crate) fn validate_steps(steps: &[Step], path: &str) -> Result<(), WorkflowError> {
    for (i, step) in steps.iter().enumerate() {
        step.validate(&format!("{}[{}]", path, i))?;
    }
    Ok(())
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,

    pub steps: Vec<Step>,
}

impl Workflow {
    /// Build a workflow, checking every structural requirement.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<Step>,
    ) -> Result<Self, WorkflowError> {
        let workflow = Self {
            name: name.into(),
            description: description.into(),
            created: Utc::now(),
            steps,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "workflow name must not be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }
        validate_steps(&self.steps, "steps")
    }

    /// Parse and validate a workflow definition from YAML (or JSON).
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        let workflow: Self = serde_yaml::from_str(yaml).map_err(|e| {
            WorkflowError::Serialization(format!("Failed to parse workflow: {}", e))
        })?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Load and validate a workflow definition file.
    pub fn from_file(path: &str) -> Result<Self, WorkflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Io(format!("Failed to read workflow file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_workflow() {
        let yaml = r#"
name: "Test Flow"
steps:
  - type: invoke
    instruction: "Hello, world!"
"#;
        let wf = Workflow::from_yaml(yaml).unwrap();
        assert_eq!(wf.name, "Test Flow");
        assert_eq!(wf.steps.len(), 1);
        match &wf.steps[0] {
            Step::Invoke(spec) => {
                assert_eq!(spec.instruction, "Hello, world!");
                assert!(spec.required);
                assert_eq!(spec.think_level, ThinkLevel::None);
                assert!(spec.capabilities.is_empty());
            }
            other => panic!("Expected invoke step, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_legacy_field_names() {
        let json = r#"{
  "name": "TDD Feature Development",
  "description": "Develop features using Test-Driven Development",
  "created": "2024-05-01T10:00:00Z",
  "steps": [
    {
      "name": "Analyze Requirements",
      "type": "claude_code",
      "prompt": "Analyze the requirements. Do NOT write code.",
      "tools": ["READ"],
      "think_level": "think hard"
    },
    {
      "name": "Parallel Analysis",
      "type": "parallel",
      "tasks": [
        {"prompt": "Security", "tools": ["READ", "GREP"], "think_level": "think hard"},
        {"prompt": "Maintainability", "tools": ["READ"], "think_level": "think", "required": false}
      ]
    },
    {"type": "wait", "seconds": 2}
  ]
}"#;
        let wf = Workflow::from_yaml(json).unwrap();
        assert_eq!(wf.steps.len(), 3);
        match &wf.steps[0] {
            Step::Invoke(spec) => {
                assert_eq!(spec.name.as_deref(), Some("Analyze Requirements"));
                assert_eq!(spec.capabilities, vec![Capability::Read]);
                assert_eq!(spec.think_level, ThinkLevel::Moderate);
            }
            other => panic!("Expected invoke step, got {:?}", other),
        }
        match &wf.steps[1] {
            Step::Parallel { tasks, .. } => {
                assert_eq!(tasks.len(), 2);
                assert_eq!(tasks[0].capabilities, vec![Capability::Read, Capability::Grep]);
                assert!(!tasks[1].required);
                assert_eq!(tasks[1].think_level, ThinkLevel::Light);
            }
            other => panic!("Expected parallel step, got {:?}", other),
        }
        assert_eq!(wf.steps[2], Step::wait(2.0));
    }

    #[test]
    fn test_unknown_tags_parse_forward_compatibly() {
        let yaml = r#"
name: "Future"
steps:
  - type: invoke
    instruction: "do it"
    capabilities: [Read, Teleport]
    think_level: galaxy-brain
"#;
        let wf = Workflow::from_yaml(yaml).unwrap();
        match &wf.steps[0] {
            Step::Invoke(spec) => {
                assert_eq!(
                    spec.capabilities,
                    vec![Capability::Read, Capability::Unknown("Teleport".to_string())]
                );
                assert_eq!(spec.think_level, ThinkLevel::Unknown);
            }
            other => panic!("Expected invoke step, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_capability_tag_survives_save() {
        let spec = TaskSpec::new("do it").with_capabilities([
            Capability::parse("run-shell"),
            Capability::parse("Teleport"),
        ]);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["capabilities"], serde_json::json!(["Bash", "Teleport"]));

        let back: TaskSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
        assert!(!back.capabilities[1].is_known());
    }

    #[test]
    fn test_unknown_step_type_is_rejected() {
        let yaml = r#"
name: "Bad"
steps:
  - type: teleport
    instruction: "x"
"#;
        assert!(matches!(
            Workflow::from_yaml(yaml),
            Err(WorkflowError::Serialization(_))
        ));
    }

    #[test]
    fn test_serialized_step_carries_only_its_own_fields() {
        let value = serde_json::to_value(Step::wait(3.0)).unwrap();
        assert_eq!(value, serde_json::json!({"type": "wait", "seconds": 3.0}));

        let value = serde_json::to_value(Step::invoke(TaskSpec::new("ls"))).unwrap();
        assert_eq!(value["type"], "invoke");
        assert!(value.get("seconds").is_none());
        assert!(value.get("tasks").is_none());
    }

    #[test]
    fn test_validation_rules() {
        assert!(Workflow::new("", "d", vec![Step::wait(1.0)]).is_err());
        assert!(Workflow::new("   ", "d", vec![Step::wait(1.0)]).is_err());
        assert!(Workflow::new("wf", "d", vec![]).is_err());
        assert!(Workflow::new("wf", "d", vec![Step::invoke(TaskSpec::new("  "))]).is_err());
        assert!(Workflow::new("wf", "d", vec![Step::wait(-1.0)]).is_err());
        assert!(Workflow::new("wf", "d", vec![Step::wait(f64::NAN)]).is_err());
        assert!(Workflow::new("wf", "d", vec![Step::parallel(vec![])]).is_err());
        assert!(Workflow::new("wf", "d", vec![Step::conditional("ready", vec![])]).is_err());
        assert!(Workflow::new(
            "wf",
            "d",
            vec![Step::conditional("__import__('os')", vec![Step::wait(0.0)])]
        )
        .is_err());
        assert!(Workflow::new(
            "wf",
            "d",
            vec![Step::conditional(
                "ready",
                vec![Step::invoke(TaskSpec::new(""))]
            )]
        )
        .is_err());
        assert!(Workflow::new("wf", "d", vec![Step::wait(0.0)]).is_ok());
    }

    #[test]
    fn test_think_level_ordering() {
        assert!(ThinkLevel::None < ThinkLevel::Light);
        assert!(ThinkLevel::Light < ThinkLevel::Moderate);
        assert!(ThinkLevel::Heavy < ThinkLevel::Maximum);
        assert_eq!(ThinkLevel::Wide.partial_cmp(&ThinkLevel::Maximum), None);
        assert_eq!(ThinkLevel::Wide.partial_cmp(&ThinkLevel::Wide), Some(Ordering::Equal));
    }

    #[test]
    fn test_think_level_apply() {
        assert_eq!(ThinkLevel::None.apply("list files"), "list files");
        assert_eq!(ThinkLevel::Moderate.apply("list files"), "think hard list files");
        assert_eq!(ThinkLevel::Wide.apply("plan"), "megathink plan");
        assert_eq!(ThinkLevel::Unknown.apply("plan"), "plan");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(Capability::parse("read-file"), Capability::Read);
        assert_eq!(Capability::parse("WebFetch"), Capability::WebFetch);
        assert_eq!(Capability::parse("LS"), Capability::Ls);
        assert_eq!(
            Capability::parse(" warp "),
            Capability::Unknown("warp".to_string())
        );
        assert_eq!(ThinkLevel::parse("ultrathink"), ThinkLevel::Maximum);
        assert_eq!(ThinkLevel::parse("heavy"), ThinkLevel::Heavy);
        assert_eq!(ThinkLevel::parse("???"), ThinkLevel::Unknown);
    }
}
