//! Prompt rendering for the planner.

use std::fmt::Write as _;
use toolweave_core::plan::ExecutionStrategy;
use toolweave_core::session::IterationRecord;
use toolweave_core::tool::{ToolDescription, render_descriptions};

const DEFAULT_INTRODUCTION: &str =
    "You are a tool-orchestrating assistant. You solve the user's request by planning \
     tool calls, reading their results, and answering once you have what you need.";

/// What the planner sees of the session so far.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    pub session_id: &'a str,
    pub query: &'a str,
    /// Records from earlier sessions, shown as background only
    pub prior: &'a [IterationRecord],
    /// Rounds of the current session
    pub rounds: &'a [IterationRecord],
}

impl<'a> History<'a> {
    pub fn new(session_id: &'a str, query: &'a str, rounds: &'a [IterationRecord]) -> Self {
        Self {
            session_id,
            query,
            prior: &[],
            rounds,
        }
    }

    pub fn with_prior(mut self, prior: &'a [IterationRecord]) -> Self {
        self.prior = prior;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    introduction: String,
    strategy: ExecutionStrategy,
}

impl PromptBuilder {
    pub fn new(strategy: ExecutionStrategy) -> Self {
        Self {
            introduction: DEFAULT_INTRODUCTION.to_string(),
            strategy,
        }
    }

    pub fn with_introduction(mut self, introduction: impl Into<String>) -> Self {
        let introduction = introduction.into();
        if !introduction.trim().is_empty() {
            self.introduction = introduction.trim().to_string();
        }
        self
    }

    /// Persona, tool listing, modes and response format.
    pub fn system(&self, tools: &[ToolDescription]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.introduction);

        if !self.strategy.uses_tools() {
            out.push_str(REASONING_FORMAT);
            return out;
        }

        let _ = writeln!(out, "AVAILABLE TOOLS:\n{}", render_descriptions(tools).trim_end());
        out.push('\n');

        match self.strategy.forced_mode() {
            Some(mode) => {
                let _ = writeln!(
                    out,
                    "EXECUTION MODE:\nEvery plan runs in {mode} mode for this session."
                );
            }
            None => out.push_str(MODE_GUIDE),
        }
        out.push('\n');
        out.push_str(TOOL_FORMAT);
        out
    }

    /// Background records, this session's rounds, the query, and an optional
    /// corrective instruction after a malformed response.
    pub fn prompt(&self, history: &History<'_>, correction: Option<&str>) -> String {
        let mut out = String::new();

        if !history.prior.is_empty() {
            out.push_str("EARLIER CONTEXT (from previous sessions):\n");
            for (i, record) in history.prior.iter().enumerate() {
                render_round(&mut out, i + 1, record);
            }
            out.push('\n');
        }

        let _ = writeln!(out, "Query: {}", history.query);

        if !history.rounds.is_empty() {
            out.push_str("\nPROGRESS SO FAR:\n");
            for (i, record) in history.rounds.iter().enumerate() {
                render_round(&mut out, i + 1, record);
            }
        }

        if let Some(problem) = correction {
            let _ = write!(
                out,
                "\nYour previous response could not be used: {problem}.\n\
                 Reply again with exactly one JSON object in the required format and nothing else.\n"
            );
        } else {
            out.push_str("\nDecide the next step. Respond with one JSON object:\n");
        }
        out
    }
}

fn render_round(out: &mut String, number: usize, record: &IterationRecord) {
    let _ = writeln!(out, "Round {number}:");
    if !record.thought.is_empty() {
        let _ = writeln!(out, "Thought: {}", record.thought);
    }
    if let Some(plan) = &record.plan {
        let _ = writeln!(out, "Mode: {}", plan.mode);
        let actions: Vec<String> = plan
            .calls
            .iter()
            .map(|c| format!("{}({})", c.tool, serde_json::Value::Object(c.arguments.clone())))
            .collect();
        let _ = writeln!(out, "Actions: {}", actions.join(", "));
    }
    if !record.observation.is_empty() && record.observation != record.thought {
        let _ = writeln!(out, "Observation:\n{}", record.observation.trim_end());
    }
}

const MODE_GUIDE: &str = "EXECUTION MODES:
- sequential: one call at a time, in order; use when later calls depend on earlier ones
- parallel: independent calls to different tools at once
- batch: the same tool with several different parameter sets
- mixed: a combination of the above, run concurrently
";

const TOOL_FORMAT: &str = r#"RESPONSE FORMAT:

To run tools:
{
    "thought": "your reasoning",
    "execution_mode": "sequential" | "parallel" | "batch" | "mixed",
    "actions": [
        {"tool": "tool_name", "parameters": {"param": "value"}}
    ],
    "final_answer": null,
    "finish": false
}

To answer:
{
    "thought": "I have everything I need",
    "actions": [],
    "final_answer": "the complete answer, with every relevant detail",
    "finish": true
}

RULES:
- Respond with valid JSON only
- Use the exact tool names listed above
- Batch plans call a single tool
- Include all details from tool results in final_answer; the user sees nothing else
"#;

const REASONING_FORMAT: &str = r#"Work through the problem one reasoning step per reply. No tools are available.

RESPONSE FORMAT:

For a reasoning step:
{"thought": "the next step of your reasoning", "final_answer": null, "finish": false}

To answer:
{"thought": "summary of the reasoning", "final_answer": "the complete answer", "finish": true}

Respond with valid JSON only.
"#;
