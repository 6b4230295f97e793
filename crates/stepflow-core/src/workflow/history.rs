//! Execution history — one entry per completed invocation, written out on
//! demand as a single JSON document.
//!
//! Unlike an append-only trace log, `save` rewrites the whole file from the
//! in-memory buffer, so saving twice leaves the same content as saving once.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::workflow::invoker::InvokeRequest;
use crate::workflow::schema::{Capability, ThinkLevel};

/// What produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Invoke,
    ParallelTask,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    /// Instruction as sent, including any think hint
    pub instruction: String,
    pub capabilities: Vec<Capability>,
    pub think_level: ThinkLevel,
    pub success: bool,
}

impl HistoryEntry {
    pub fn for_invocation(kind: EntryKind, request: &InvokeRequest) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            instruction: request.prompt(),
            capabilities: request.known_capabilities(),
            think_level: request.think_level,
            success: true,
        }
    }

    pub fn for_wait(seconds: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: EntryKind::Wait,
            instruction: format!("wait {}s", seconds),
            capabilities: Vec::new(),
            think_level: ThinkLevel::None,
            success: true,
        }
    }
}

/// In-memory history buffer owned by a runner.
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    entries: Vec<HistoryEntry>,
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> Result<String, HistoryError> {
        serde_json::to_string_pretty(&self.entries)
            .map_err(|e| HistoryError::Serialization(e.to_string()))
    }

    /// Write the whole buffer to `path`, replacing any previous content.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let path = path.as_ref();
        let json = self.to_json()?;

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| HistoryError::Io(format!("Failed to create '{}': {}", dir.display(), e)))?;
        }

        tokio::fs::write(path, json)
            .await
            .map_err(|e| HistoryError::Io(format!("Failed to write '{}': {}", path.display(), e)))?;

        Ok(())
    }

    /// Read a previously saved history file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HistoryError::Io(format!("Failed to read '{}': {}", path.display(), e)))?;
        let entries = serde_json::from_str(&content)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;
        Ok(Self { entries })
    }
}
