//! `stepflow invoke` — send one instruction to the assistant.

use stepflow_core::workflow::{
    Capability, EntryKind, HistoryEntry, HistoryRecorder, InvokeRequest, ProcessInvoker,
    TaskInvoker, ThinkLevel,
};
use stepflow_core::{EngineConfig, TracingLogger};

/// Invoke the assistant once, print its output and record the call.
pub async fn run(
    config: &EngineConfig,
    instruction: &str,
    capabilities: &[String],
    think_level: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<(), String> {
    let request = build_request(instruction, capabilities, think_level, timeout_secs)?;

    let invoker = ProcessInvoker::new(config.invoker.clone(), TracingLogger::shared());
    let output = invoker.invoke(&request).await.map_err(|e| e.to_string())?;
    println!("{}", output.trim_end());

    let mut history = HistoryRecorder::new();
    history.record(HistoryEntry::for_invocation(EntryKind::Invoke, &request));
    history
        .save(&config.history_path)
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!(
        "[Invoke] Saved history to {}",
        config.history_path.display()
    );
    Ok(())
}

fn build_request(
    instruction: &str,
    capabilities: &[String],
    think_level: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<InvokeRequest, String> {
    if instruction.trim().is_empty() {
        return Err("Instruction must not be empty".to_string());
    }

    let think_level = match think_level {
        Some(tag) => match ThinkLevel::parse(tag) {
            ThinkLevel::Unknown => return Err(format!("Unknown think level '{}'", tag)),
            level => level,
        },
        None => ThinkLevel::None,
    };

    let mut request = InvokeRequest::new(instruction);
    request.capabilities = capabilities.iter().map(|c| Capability::parse(c)).collect();
    request.think_level = think_level;
    request.timeout = timeout_secs.map(std::time::Duration::from_secs);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_request() {
        let request = build_request(
            "review the diff",
            &["read".to_string(), "run-shell".to_string(), "teleport".to_string()],
            Some("think hard"),
            Some(45),
        )
        .unwrap();

        assert_eq!(request.prompt(), "think hard review the diff");
        assert_eq!(
            request.known_capabilities(),
            vec![Capability::Read, Capability::Bash]
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        assert!(build_request("  ", &[], None, None).is_err());
        assert!(build_request("x", &[], Some("ponder"), None).is_err());
    }
}
