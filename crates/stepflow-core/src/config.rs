//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default history file name.
pub const DEFAULT_HISTORY_FILE: &str = "workflow-history.json";

/// Default directory for stored workflow definitions.
pub const DEFAULT_WORKFLOWS_DIR: &str = "workflows";

/// Configuration for spawning the external assistant.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Command to run (usually "claude")
    pub command: String,
    /// Arguments placed before the prompt flag
    pub extra_args: Vec<String>,
    /// Working directory; inherits the current one when absent
    pub cwd: Option<PathBuf>,
    /// Deadline applied when a task does not set its own
    pub default_timeout: Option<Duration>,
    /// Log the full command line at debug level
    pub debug: bool,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            extra_args: Vec::new(),
            cwd: None,
            default_timeout: None,
            debug: false,
        }
    }
}

/// Where definitions and history live, plus the invoker settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workflows_dir: PathBuf,
    pub history_path: PathBuf,
    pub invoker: InvokerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflows_dir: PathBuf::from(DEFAULT_WORKFLOWS_DIR),
            history_path: PathBuf::from(DEFAULT_HISTORY_FILE),
            invoker: InvokerConfig::default(),
        }
    }
}
