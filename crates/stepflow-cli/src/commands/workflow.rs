//! `stepflow run | validate | import | list` — workflow definitions.

use std::path::Path;

use stepflow_core::workflow::{RunContext, Step, Workflow, WorkflowStore};
use stepflow_core::EngineConfig;

/// Run a workflow given as a file path or a stored workflow name.
pub async fn run(config: &EngineConfig, workflow: &str, context: &[String]) -> Result<(), String> {
    let context = parse_context(context)?;
    let workflow = resolve(config, workflow)?;

    println!("📄 Loaded workflow: {}", workflow.name);
    if !workflow.description.is_empty() {
        println!("   {}", workflow.description);
    }
    println!("   {} step(s)", workflow.steps.len());
    println!();

    let mut runner = super::init_runner(config);
    let completed = runner.run(&workflow, &context).await;

    runner
        .save_history(&config.history_path)
        .await
        .map_err(|e| e.to_string())?;

    if completed {
        println!("\n🎉 Workflow completed successfully!");
        Ok(())
    } else {
        Err(format!("Workflow '{}' aborted", workflow.name))
    }
}

/// Validate a workflow file without executing it.
pub fn validate(workflow_file: &str) -> Result<(), String> {
    let workflow = Workflow::from_file(workflow_file).map_err(|e| e.to_string())?;

    println!("✅ Workflow '{}' is valid", workflow.name);
    println!("   Steps: {}", workflow.steps.len());
    print_outline(&workflow.steps, 1);
    Ok(())
}

/// Validate a workflow file and persist it in the store.
pub fn import(config: &EngineConfig, workflow_file: &str) -> Result<(), String> {
    let parsed = Workflow::from_file(workflow_file).map_err(|e| e.to_string())?;
    let store = WorkflowStore::new(&config.workflows_dir);
    let workflow = store
        .create(&parsed.name, &parsed.description, parsed.steps)
        .map_err(|e| e.to_string())?;

    println!(
        "✅ Imported '{}' as {}",
        workflow.name,
        store.path_for(&workflow.name).display()
    );
    Ok(())
}

/// List the workflows in the store.
pub fn list(config: &EngineConfig) -> Result<(), String> {
    let store = WorkflowStore::new(&config.workflows_dir);
    let keys = store.list().map_err(|e| e.to_string())?;

    if keys.is_empty() {
        println!("No workflows in '{}'", store.dir().display());
        return Ok(());
    }
    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

/// Prefer an existing file; otherwise look the name up in the store.
fn resolve(config: &EngineConfig, workflow: &str) -> Result<Workflow, String> {
    if Path::new(workflow).is_file() {
        return Workflow::from_file(workflow).map_err(|e| e.to_string());
    }
    WorkflowStore::new(&config.workflows_dir)
        .load(workflow)
        .map_err(|e| e.to_string())
}

fn print_outline(steps: &[Step], depth: usize) {
    let indent = "   ".repeat(depth);
    for (i, step) in steps.iter().enumerate() {
        println!("{}{}. {} ({})", indent, i + 1, step.label(), step.kind());
        if let Step::Conditional {
            condition, steps, ..
        } = step
        {
            println!("{}   when: {}", indent, condition);
            print_outline(steps, depth + 1);
        }
    }
}

/// Parse `KEY=VALUE` pairs. Values that parse as JSON keep their type;
/// anything else is taken as a plain string.
pub fn parse_context(pairs: &[String]) -> Result<RunContext, String> {
    let mut context = RunContext::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("Invalid context '{}': expected KEY=VALUE", pair));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid context '{}': empty key", pair));
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_context_values() {
        let ctx = parse_context(&[
            "branch=main".to_string(),
            "coverage=87.5".to_string(),
            "dry_run=false".to_string(),
            "meta={\"team\":\"core\"}".to_string(),
            "expr=a=b".to_string(),
        ])
        .unwrap();

        assert_eq!(ctx["branch"], json!("main"));
        assert_eq!(ctx["coverage"], json!(87.5));
        assert_eq!(ctx["dry_run"], json!(false));
        assert_eq!(ctx["meta"]["team"], json!("core"));
        assert_eq!(ctx["expr"], json!("a=b"));
    }

    #[test]
    fn test_parse_context_rejects_malformed_pairs() {
        assert!(parse_context(&["novalue".to_string()]).is_err());
        assert!(parse_context(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_prefers_file_then_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            workflows_dir: dir.path().join("store"),
            ..EngineConfig::default()
        };

        let file = dir.path().join("adhoc.yaml");
        std::fs::write(
            &file,
            "name: Adhoc\nsteps:\n  - type: wait\n    seconds: 0.1\n",
        )
        .unwrap();
        let from_file = resolve(&config, file.to_str().unwrap()).unwrap();
        assert_eq!(from_file.name, "Adhoc");

        import(&config, file.to_str().unwrap()).unwrap();
        let from_store = resolve(&config, "adhoc").unwrap();
        assert_eq!(from_store.steps, from_file.steps);

        assert!(resolve(&config, "missing").unwrap_err().contains("missing"));
    }
}
