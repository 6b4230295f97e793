//! Workflow definition store — one pretty-printed JSON file per workflow.
//!
//! Storage path: `<dir>/<key>.json`, where the key is derived from the
//! workflow name (see [`storage_key`]). The store does not deduplicate:
//! creating a workflow with an existing name overwrites the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::WorkflowError;
use crate::logging::{RunLogger, TracingLogger};
use crate::workflow::schema::{Step, Workflow};

pub struct WorkflowStore {
    dir: PathBuf,
    logger: Arc<dyn RunLogger>,
}

impl WorkflowStore {
    /// A store under `dir` that logs through `tracing`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            logger: TracingLogger::shared(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path a workflow with `name` is stored under.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", storage_key(name)))
    }

    /// Validate and persist a new workflow definition.
    ///
    /// Nothing is written when validation fails.
    pub fn create(
        &self,
        name: &str,
        description: &str,
        steps: Vec<Step>,
    ) -> Result<Workflow, WorkflowError> {
        let workflow = Workflow::new(name, description, steps)?;
        self.save(&workflow)?;
        self.logger
            .info(&format!("[WorkflowStore] Created workflow: {}", workflow.name));
        Ok(workflow)
    }

    /// Persist an already-built workflow, overwriting any previous version.
    pub fn save(&self, workflow: &Workflow) -> Result<PathBuf, WorkflowError> {
        workflow.validate()?;

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            WorkflowError::Io(format!(
                "Failed to create workflow dir '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let json = serde_json::to_string_pretty(workflow)
            .map_err(|e| WorkflowError::Serialization(e.to_string()))?;
        let path = self.path_for(&workflow.name);
        std::fs::write(&path, json).map_err(|e| {
            WorkflowError::Io(format!("Failed to write '{}': {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Load a stored workflow by its name. Hand-edited files get the same
    /// validation as newly created ones.
    pub fn load(&self, name: &str) -> Result<Workflow, WorkflowError> {
        let path = self.path_for(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::NotFound(name.to_string()));
            }
            Err(e) => {
                return Err(WorkflowError::Io(format!(
                    "Failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };
        let workflow: Workflow = serde_json::from_str(&content).map_err(|e| {
            WorkflowError::Serialization(format!("Failed to parse '{}': {}", path.display(), e))
        })?;
        workflow.validate()?;
        self.logger.debug(&format!(
            "[WorkflowStore] Loaded '{}' from {}",
            workflow.name,
            path.display()
        ));
        Ok(workflow)
    }

    /// Storage keys of every stored workflow, sorted.
    pub fn list(&self) -> Result<Vec<String>, WorkflowError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkflowError::Io(e.to_string())),
        };

        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Filesystem-safe key for a workflow name: trimmed, lower-cased, whitespace
/// runs replaced by `-`, and anything outside `[a-z0-9_-]` replaced by `-`.
pub fn storage_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            if !in_space {
                key.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            key.push(c);
        } else {
            key.push('-');
        }
    }
    key
}
