//! `toolweave replay` — Drive the agent loop from a scripted transcript.
//!
//! The script holds one model response per block, blocks separated by a
//! line containing only `---`. Tools are the real built-ins.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use toolweave_agent::{LoopController, ScriptedModel};
use toolweave_config::AppConfig;
use toolweave_core::session::{AgentSession, SessionOutcome};
use toolweave_core::state::StateCell;

pub async fn run(config: &AppConfig, script: &Path, query: &str, json: bool) -> anyhow::Result<()> {
    let script = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let session = replay(config, &script, query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        print!("{}", summarize(&session));
    }

    if session.is_failed() {
        anyhow::bail!("session {} failed", session.id);
    }
    Ok(())
}

pub async fn replay(config: &AppConfig, script: &str, query: &str) -> anyhow::Result<AgentSession> {
    let model = Arc::new(ScriptedModel::from_script(script));
    let registry = Arc::new(toolweave_tools::default_registry(StateCell::new())?);

    let mut controller = LoopController::from_config(model, registry, config)?;
    if let Some(memory) = toolweave_memory::from_backend(
        &config.memory.backend,
        config.history_path(),
        config.memory.window,
    ) {
        controller = controller.with_memory(memory);
    }

    Ok(controller.run(query).await)
}

fn summarize(session: &AgentSession) -> String {
    let mut out = format!("Query: {}\n\n", session.query);
    for (i, record) in session.records.iter().enumerate() {
        out.push_str(&format!("Round {}\n  Thought: {}\n", i + 1, record.thought));
        if let Some(plan) = &record.plan {
            out.push_str(&format!("  Mode: {} ({} call(s))\n", plan.mode, plan.len()));
        }
        for line in record.observation.lines() {
            out.push_str(&format!("  | {line}\n"));
        }
        out.push('\n');
    }

    match &session.outcome {
        SessionOutcome::FinalAnswer { answer } => out.push_str(&format!("Answer: {answer}\n")),
        SessionOutcome::Exhausted { partial } => out.push_str(&format!(
            "Iteration limit reached after {} round(s). Partial answer:\n{partial}\n",
            session.iterations()
        )),
        SessionOutcome::Failed { cause } => out.push_str(&format!("Failed: {cause}\n")),
        SessionOutcome::Pending => out.push_str("Session did not finish\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
{"thought": "work it out", "execution_mode": "sequential",
 "actions": [{"tool": "calculator", "parameters": {"expression": "(2 + 3) * 4"}}]}
---
```json
{"thought": "the calculator said 20", "final_answer": "20", "finish": true}
```
"#;

    #[tokio::test]
    async fn replays_script_with_builtin_tools() {
        let session = replay(&AppConfig::default(), SCRIPT, "what is (2+3)*4?")
            .await
            .unwrap();
        assert_eq!(session.answer(), Some("20"));
        assert_eq!(session.records[0].results[0].output, "20");

        let text = summarize(&session);
        assert!(text.contains("Mode: sequential (1 call(s))"));
        assert!(text.contains("Answer: 20"));
    }

    #[tokio::test]
    async fn file_backend_persists_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.backend = "file".into();
        config.memory.path = Some(dir.path().join("history.jsonl"));

        replay(&config, SCRIPT, "q").await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("history.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_fails_session() {
        let session = replay(&AppConfig::default(), "", "q").await.unwrap();
        assert!(session.is_failed());
        assert!(summarize(&session).starts_with("Query: q"));
    }
}
