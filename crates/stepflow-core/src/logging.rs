//! Run logging — an injected sink for engine log lines, plus the process-wide
//! `tracing` setup used by the CLI.
//!
//! The runner and the invoker never reach for a global logger directly; they
//! receive an `Arc<dyn RunLogger>` at construction. [`TracingLogger`] forwards
//! to `tracing`, [`RecordingLogger`] keeps lines in memory.
//!
//! [`init`] opens the subscriber at process start and returns a [`LogGuard`];
//! dropping the guard at process end flushes any buffered file output.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Sink for engine log lines. Implementations must not fail or panic.
pub trait RunLogger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }
}

/// Forwards every line to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RunLogger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            _ => tracing::trace!("{}", message),
        }
    }
}

impl TracingLogger {
    pub fn shared() -> Arc<dyn RunLogger> {
        Arc::new(Self)
    }
}

/// A captured log line.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

/// Keeps every line in memory, for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, level: Level) -> usize {
        self.lines().iter().filter(|l| l.level == level).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.message.contains(needle))
    }
}

impl RunLogger for RecordingLogger {
    fn log(&self, level: Level, message: &str) {
        let line = LogLine {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
        };
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

/// Keeps the non-blocking file writer alive; flushes when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global `tracing` subscriber.
///
/// Console output goes to stderr. When `log_file` is given, lines are also
/// appended there through a non-blocking writer. `RUST_LOG` overrides the
/// default filter.
pub fn init(debug: bool, log_file: Option<&Path>) -> std::io::Result<LogGuard> {
    let default_filter = if debug {
        "stepflow_core=debug,stepflow_cli=debug"
    } else {
        "stepflow_core=info,stepflow_cli=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "stepflow.log".to_string());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(LogGuard { _file: guard })
}
