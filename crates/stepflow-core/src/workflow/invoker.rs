//! Task invoker — runs the external assistant for one instruction.
//!
//! The engine only depends on the [`TaskInvoker`] contract: instruction and
//! capabilities in, captured output or an [`InvokeError`] out.
//! [`ProcessInvoker`] satisfies it by spawning the assistant CLI:
//!
//! ```text
//! claude -p "<think hint> <instruction>" --allowedTools Read Grep
//! ```

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::InvokerConfig;
use crate::error::InvokeError;
use crate::logging::RunLogger;
use crate::workflow::schema::{truncate, Capability, TaskSpec, ThinkLevel};

/// Everything needed for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub instruction: String,
    pub capabilities: Vec<Capability>,
    pub think_level: ThinkLevel,
    pub timeout: Option<Duration>,
}

impl InvokeRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            capabilities: Vec::new(),
            think_level: ThinkLevel::None,
            timeout: None,
        }
    }

    /// Instruction with the think hint applied.
    pub fn prompt(&self) -> String {
        self.think_level.apply(&self.instruction)
    }

    /// Capabilities the assistant understands, without duplicates.
    pub fn known_capabilities(&self) -> Vec<Capability> {
        let mut known: Vec<Capability> = Vec::new();
        for cap in &self.capabilities {
            if cap.is_known() && !known.contains(cap) {
                known.push(cap.clone());
            }
        }
        known
    }
}

impl From<&TaskSpec> for InvokeRequest {
    fn from(spec: &TaskSpec) -> Self {
        Self {
            instruction: spec.instruction.clone(),
            capabilities: spec.capabilities.clone(),
            think_level: spec.think_level,
            timeout: spec.timeout(),
        }
    }
}

/// Something that can carry out an instruction.
///
/// Implementations are shared across concurrent parallel tasks and must not
/// keep per-call mutable state.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError>;
}

/// Spawns the assistant CLI as a child process per invocation.
pub struct ProcessInvoker {
    config: InvokerConfig,
    logger: Arc<dyn RunLogger>,
}

impl ProcessInvoker {
    pub fn new(config: InvokerConfig, logger: Arc<dyn RunLogger>) -> Self {
        Self { config, logger }
    }

    /// Full argument list for a request (without the program).
    pub fn build_args(&self, request: &InvokeRequest) -> Vec<String> {
        let mut args = self.config.extra_args.clone();
        args.push("-p".to_string());
        args.push(request.prompt());

        let tools: Vec<String> = request
            .known_capabilities()
            .iter()
            .filter_map(|c| c.tool_name())
            .map(str::to_string)
            .collect();
        if !tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.extend(tools);
        }
        args
    }

    async fn run(&self, args: Vec<String>, timeout: Option<Duration>) -> Result<String, InvokeError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&args);
        if let Some(ref dir) = self.config.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // The child is killed if the output future is dropped on timeout.
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            InvokeError::LaunchFailure(format!(
                "is '{}' installed? Error: {}",
                self.config.command, e
            ))
        })?;

        let output = match timeout {
            Some(duration) => tokio::time::timeout(duration, child.wait_with_output())
                .await
                .map_err(|_| InvokeError::Timeout(duration))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| InvokeError::LaunchFailure(e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(InvokeError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl TaskInvoker for ProcessInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        let unknown: Vec<&str> = request
            .capabilities
            .iter()
            .filter(|c| !c.is_known())
            .map(Capability::as_str)
            .collect();
        if !unknown.is_empty() {
            self.logger.warn(&format!(
                "[Invoker] Dropping unrecognized capabilities: {}",
                unknown.join(", ")
            ));
        }

        let args = self.build_args(request);
        let timeout = request.timeout.or(self.config.default_timeout);

        self.logger.info(&format!(
            "[Invoker] Running {}: {}",
            self.config.command,
            truncate(&request.prompt(), 80)
        ));
        if self.config.debug {
            self.logger.debug(&format!(
                "[Invoker] Full command: {} {}",
                self.config.command,
                args.join(" ")
            ));
        }

        let result = self.run(args, timeout).await;
        match &result {
            Ok(stdout) => self
                .logger
                .info(&format!("[Invoker] Completed ({} bytes of output)", stdout.len())),
            Err(e) => self.logger.warn(&format!("[Invoker] Invocation failed: {}", e)),
        }
        result
    }
}
