//! stepflow CLI — run, validate and manage assistant workflows.
//!
//! Thin shell over `stepflow-core`: argument parsing, logging setup and
//! printing. All execution semantics live in the core crate.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stepflow_core::config::{DEFAULT_HISTORY_FILE, DEFAULT_WORKFLOWS_DIR};
use stepflow_core::{EngineConfig, InvokerConfig};

/// stepflow — multi-step workflows for a command-line assistant
#[derive(Parser)]
#[command(name = "stepflow", version, about = "Multi-step workflows for a command-line assistant")]
pub struct Cli {
    /// Directory holding stored workflow definitions
    #[arg(long, global = true, env = "STEPFLOW_WORKFLOWS_DIR", default_value = DEFAULT_WORKFLOWS_DIR)]
    workflows_dir: PathBuf,

    /// Assistant command to spawn for each task
    #[arg(long, global = true, env = "STEPFLOW_COMMAND", default_value = "claude")]
    command: String,

    /// Working directory for the assistant process
    #[arg(long, global = true, env = "STEPFLOW_CWD")]
    cwd: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, env = "STEPFLOW_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Verbose logging, including full assistant command lines
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand)]
enum Action {
    /// Run a workflow from a file or from the store
    Run {
        /// Path to a workflow file, or the name of a stored workflow
        workflow: String,
        /// Context value for conditions, as KEY=VALUE (VALUE may be JSON)
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
        /// Where to write the execution history
        #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
        history: PathBuf,
    },

    /// Validate a workflow file without running it
    Validate {
        /// Path to a workflow file (YAML or JSON)
        file: String,
    },

    /// Validate a workflow file and add it to the store
    Import {
        /// Path to a workflow file (YAML or JSON)
        file: String,
    },

    /// List stored workflows
    List,

    /// Run a single instruction through the assistant
    Invoke {
        /// Instruction to send
        instruction: String,
        /// Capability to grant (repeatable), e.g. Read, Bash, run-shell
        #[arg(long = "capability", value_name = "CAPABILITY")]
        capabilities: Vec<String>,
        /// Reasoning depth: think, think hard, think harder, ultrathink, megathink
        #[arg(long)]
        think_level: Option<String>,
        /// Kill the assistant after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Where to write the execution history
        #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
        history: PathBuf,
    },
}

impl Cli {
    fn engine_config(&self, history: Option<PathBuf>) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            workflows_dir: self.workflows_dir.clone(),
            history_path: history.unwrap_or(defaults.history_path),
            invoker: InvokerConfig {
                command: self.command.clone(),
                cwd: self.cwd.clone(),
                debug: self.debug,
                ..InvokerConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed.
    let guard = match stepflow_core::logging::init(cli.debug, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };

    let result = match &cli.action {
        Some(Action::Run {
            workflow,
            context,
            history,
        }) => {
            let config = cli.engine_config(Some(history.clone()));
            commands::workflow::run(&config, workflow, context).await
        }
        Some(Action::Validate { file }) => commands::workflow::validate(file),
        Some(Action::Import { file }) => {
            commands::workflow::import(&cli.engine_config(None), file)
        }
        Some(Action::List) => commands::workflow::list(&cli.engine_config(None)),
        Some(Action::Invoke {
            instruction,
            capabilities,
            think_level,
            timeout,
            history,
        }) => {
            let config = cli.engine_config(Some(history.clone()));
            commands::invoke::run(
                &config,
                instruction,
                capabilities,
                think_level.as_deref(),
                *timeout,
            )
            .await
        }
        None => {
            // No subcommand — show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        drop(guard);
        std::process::exit(1);
    }
}
