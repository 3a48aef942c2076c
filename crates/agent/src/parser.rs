//! Planner response parsing — raw model text into a [`Decision`].
//!
//! The model is asked for a single JSON object. It is located in this order:
//! a ```` ```json ```` fence, a bare ```` ``` ```` fence, a `'''json` fence,
//! and finally the outermost `{ ... }` span of the text.
//!
//! Accepted shapes:
//!
//! ```text
//! { "thought": "...", "execution_mode": "parallel",
//!   "actions": [{ "tool": "calc", "parameters": { "expression": "1+1" } }] }
//!
//! { "thought": "...", "final_answer": "...", "finish": true }
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use toolweave_core::plan::{ExecutionMode, ExecutionPlan, ExecutionStrategy, ToolCall};
use toolweave_core::tool::Arguments;

/// One structured decision from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The model is done.
    FinalAnswer { thought: String, answer: String },
    /// Tool calls to run this round.
    Plan { thought: String, plan: ExecutionPlan },
    /// A reasoning step with no tool use (reasoning-only strategy).
    Reflect { thought: String },
}

/// Why a response could not be turned into a decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
}

impl ParseError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDecision {
    #[serde(default, alias = "Thought")]
    thought: Option<Value>,

    #[serde(default, alias = "Execution Mode", alias = "mode")]
    execution_mode: Option<Value>,

    #[serde(default, alias = "Actions")]
    actions: Option<Value>,

    #[serde(default, alias = "Final Answer", alias = "answer")]
    final_answer: Option<Value>,

    #[serde(default, alias = "Finish")]
    finish: Option<Value>,

    #[serde(default, alias = "Reasoning Steps")]
    reasoning_steps: Option<Value>,
}

/// Turns raw model text into decisions under one execution strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    strategy: ExecutionStrategy,
}

impl ResponseParser {
    pub fn new(strategy: ExecutionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn parse(&self, raw: &str) -> Result<Decision, ParseError> {
        if raw.trim().is_empty() {
            return Err(ParseError::new("the response was empty"));
        }
        let value = extract_json(raw)?;
        let decision: RawDecision = serde_json::from_value(value)
            .map_err(|e| ParseError::new(format!("the JSON object has an invalid field: {e}")))?;

        let thought = decision.thought_text();

        if let Some(answer) = decision.answer()? {
            return Ok(Decision::FinalAnswer { thought, answer });
        }

        let actions = match &decision.actions {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(ParseError::new("\"actions\" must be a list")),
        };

        if !self.strategy.uses_tools() {
            if !actions.is_empty() {
                return Err(ParseError::new(
                    "tools are disabled for this session; reply with a thought or a final_answer",
                ));
            }
            if thought.is_empty() {
                return Err(ParseError::new(
                    "the response has neither a thought nor a final_answer",
                ));
            }
            return Ok(Decision::Reflect { thought });
        }

        if actions.is_empty() {
            return Err(ParseError::new(
                "the response has no actions and no final_answer",
            ));
        }

        let calls = actions
            .iter()
            .enumerate()
            .map(|(i, action)| parse_action(i, action))
            .collect::<Result<Vec<_>, _>>()?;

        let mode = match self.strategy.forced_mode() {
            Some(mode) => mode,
            None => match &decision.execution_mode {
                Some(Value::String(s)) => s.parse::<ExecutionMode>().map_err(ParseError::new)?,
                None | Some(Value::Null) => {
                    return Err(ParseError::new(
                        "\"execution_mode\" is required when actions are given",
                    ));
                }
                Some(other) => {
                    return Err(ParseError::new(format!(
                        "\"execution_mode\" must be a string, got {other}"
                    )));
                }
            },
        };

        if mode == ExecutionMode::Batch {
            let tools: BTreeSet<&str> = calls.iter().map(|c| c.tool.as_str()).collect();
            if tools.len() > 1 {
                return Err(ParseError::new(format!(
                    "batch mode runs one tool with several argument sets, but the actions name {}",
                    tools.into_iter().collect::<Vec<_>>().join(", ")
                )));
            }
        }

        Ok(Decision::Plan {
            thought,
            plan: ExecutionPlan::new(mode, calls),
        })
    }
}

impl RawDecision {
    fn thought_text(&self) -> String {
        let thought = match &self.thought {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        if !thought.is_empty() {
            return thought;
        }
        match &self.reasoning_steps {
            Some(Value::Array(steps)) => steps
                .iter()
                .map(|s| s.as_str().map(str::to_string).unwrap_or_else(|| s.to_string()))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        }
    }

    fn finished(&self) -> bool {
        match &self.finish {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// `finish` given and false, as opposed to absent.
    fn declared_unfinished(&self) -> bool {
        match &self.finish {
            Some(Value::Bool(b)) => !*b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("false"),
            _ => false,
        }
    }

    fn has_actions(&self) -> bool {
        matches!(&self.actions, Some(Value::Array(items)) if !items.is_empty())
    }

    fn answer(&self) -> Result<Option<String>, ParseError> {
        // An explicit `finish: false` with work to do is a plan; any
        // final_answer text alongside it is provisional
        if self.declared_unfinished() && self.has_actions() {
            return Ok(None);
        }
        let explicit = match &self.final_answer {
            Some(Value::String(s)) => {
                let s = s.trim();
                (!s.is_empty() && s != "None" && s != "null").then(|| decode_escapes(s))
            }
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        if explicit.is_some() {
            return Ok(explicit);
        }
        if self.finished() {
            let thought = self.thought_text();
            if thought.is_empty() {
                return Err(ParseError::new(
                    "\"finish\" is true but no final_answer was given",
                ));
            }
            return Ok(Some(decode_escapes(&thought)));
        }
        Ok(None)
    }
}

fn parse_action(index: usize, action: &Value) -> Result<ToolCall, ParseError> {
    let Value::Object(fields) = action else {
        return Err(ParseError::new(format!("action {} is not an object", index + 1)));
    };

    let tool = fields
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ParseError::new(format!("action {} has no \"tool\" name", index + 1)))?;

    let arguments = match fields.get("parameters").or_else(|| fields.get("arguments")) {
        None | Some(Value::Null) => Arguments::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) if s.trim().is_empty() || s.trim() == "None" => Arguments::new(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(ParseError::new(format!(
                    "parameters of action {} ({tool}) must be a JSON object",
                    index + 1
                )));
            }
        },
        Some(_) => {
            return Err(ParseError::new(format!(
                "parameters of action {} ({tool}) must be a JSON object",
                index + 1
            )));
        }
    };

    Ok(ToolCall::new(tool, arguments))
}

/// Locate and parse the JSON object in a raw response.
fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let mut last_error = None;
    for candidate in candidates(raw) {
        match serde_json::from_str::<Value>(candidate.trim()) {
            Ok(value @ Value::Object(_)) => return Ok(value),
            Ok(_) => last_error = Some("the JSON value is not an object".to_string()),
            Err(e) => last_error = Some(format!("the JSON is malformed: {e}")),
        }
    }
    Err(ParseError::new(
        last_error.unwrap_or_else(|| "no JSON object was found in the response".into()),
    ))
}

fn candidates(raw: &str) -> Vec<&str> {
    let mut found = Vec::new();
    if let Some(body) = fenced(raw, "```json", "```") {
        found.push(body);
    }
    if let Some(body) = fenced(raw, "```", "```") {
        // Skip an info string such as ```JSON
        let body = match body.split_once('\n') {
            Some((first, rest)) if !first.trim_start().starts_with('{') => rest,
            _ => body,
        };
        found.push(body);
    }
    if let Some(body) = fenced(raw, "'''json", "'''") {
        found.push(body);
    }
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            found.push(&raw[start..=end]);
        }
    }
    found
}

fn fenced<'a>(raw: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = raw.find(open)? + open.len();
    let rest = &raw[start..];
    let end = rest.find(close)?;
    Some(&rest[..end])
}

fn decode_escapes(text: &str) -> String {
    text.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adaptive() -> ResponseParser {
        ResponseParser::new(ExecutionStrategy::Adaptive)
    }

    #[test]
    fn parses_parallel_plan() {
        let raw = r#"{"thought": "look both up", "execution_mode": "parallel",
            "actions": [
                {"tool": "search_wiki", "parameters": {"q": "rust"}},
                {"tool": "search_news", "parameters": {"q": "rust"}}
            ]}"#;
        let Decision::Plan { thought, plan } = adaptive().parse(raw).unwrap() else {
            panic!("expected a plan");
        };
        assert_eq!(thought, "look both up");
        assert_eq!(plan.mode, ExecutionMode::Parallel);
        assert_eq!(plan.calls[0].tool, "search_wiki");
        assert_eq!(plan.calls[1].arguments["q"], json!("rust"));
    }

    #[test]
    fn locates_json_in_fences_and_prose() {
        let plan = r#"{"thought": "t", "execution_mode": "sequential", "actions": [{"tool": "a"}]}"#;
        let inputs = [
            format!("Sure!\n```json\n{plan}\n```\nDone."),
            format!("```\n{plan}\n```"),
            format!("```JSON\n{plan}\n```"),
            format!("'''json\n{plan}\n'''"),
            format!("Here is my plan: {plan} hope it helps"),
        ];
        for input in &inputs {
            assert!(
                matches!(adaptive().parse(input), Ok(Decision::Plan { .. })),
                "failed on {input}"
            );
        }
    }

    #[test]
    fn final_answer_shapes() {
        let parser = adaptive();
        assert_eq!(
            parser
                .parse(r#"{"thought": "done", "final_answer": "Line one\\nLine two", "finish": true}"#)
                .unwrap(),
            Decision::FinalAnswer {
                thought: "done".into(),
                answer: "Line one\nLine two".into()
            }
        );
        // Title-case spellings
        assert!(matches!(
            parser.parse(r#"{"Thought": "ok", "Final Answer": "42"}"#),
            Ok(Decision::FinalAnswer { answer, .. }) if answer == "42"
        ));
        // finish without answer falls back to the thought
        assert!(matches!(
            parser.parse(r#"{"thought": "It is 42", "finish": true, "actions": []}"#),
            Ok(Decision::FinalAnswer { answer, .. }) if answer == "It is 42"
        ));
        // "None" is not an answer
        assert!(parser.parse(r#"{"thought": "t", "final_answer": "None", "actions": []}"#).is_err());
    }

    #[test]
    fn unfinished_plan_ignores_provisional_answer() {
        let decision = adaptive()
            .parse(
                r#"{"thought": "search first", "execution_mode": "parallel",
                    "actions": [{"tool": "search_wiki", "parameters": {"q": "rust"}}],
                    "final_answer": "I will answer after searching", "finish": false}"#,
            )
            .unwrap();
        match decision {
            Decision::Plan { thought, plan } => {
                assert_eq!(thought, "search first");
                assert_eq!(plan.calls[0].tool, "search_wiki");
            }
            other => panic!("expected a plan, got {other:?}"),
        }

        // Without `finish`, a final_answer still ends the session
        assert!(matches!(
            adaptive().parse(
                r#"{"thought": "t", "execution_mode": "parallel",
                    "actions": [{"tool": "a"}], "final_answer": "42"}"#
            ),
            Ok(Decision::FinalAnswer { answer, .. }) if answer == "42"
        ));
    }

    #[test]
    fn finish_without_anything_is_malformed() {
        let err = adaptive().parse(r#"{"finish": true}"#).unwrap_err();
        assert!(err.reason.contains("finish"));
    }

    #[test]
    fn malformed_responses() {
        let parser = adaptive();
        assert!(parser.parse("").is_err());
        assert!(parser.parse("I think the answer is 4").is_err());
        assert!(parser.parse("{not json}").is_err());
        assert!(parser.parse(r#"{"thought": "t", "execution_mode": "parallel", "actions": []}"#).is_err());
        assert!(parser.parse(r#"{"thought": "t", "actions": [{"tool": "a"}]}"#).is_err());
        assert!(parser.parse(r#"{"thought": "t", "execution_mode": "whenever", "actions": [{"tool": "a"}]}"#).is_err());
        assert!(parser.parse(r#"{"thought": "t", "execution_mode": "parallel", "actions": [{"parameters": {}}]}"#).is_err());
        assert!(parser.parse(r#"{"thought": "t", "execution_mode": "parallel", "actions": [{"tool": "a", "parameters": 5}]}"#).is_err());
    }

    #[test]
    fn unknown_mode_error_names_valid_modes() {
        let err = adaptive()
            .parse(r#"{"thought": "t", "execution_mode": "whenever", "actions": [{"tool": "a"}]}"#)
            .unwrap_err();
        assert!(err.reason.contains("sequential"));
    }

    #[test]
    fn batch_must_name_one_tool() {
        let raw = r#"{"thought": "t", "execution_mode": "batch",
            "actions": [{"tool": "a", "parameters": {}}, {"tool": "b", "parameters": {}}]}"#;
        let err = adaptive().parse(raw).unwrap_err();
        assert!(err.reason.contains("batch"));
    }

    #[test]
    fn parameter_spellings() {
        let raw = r#"{"thought": "t", "execution_mode": "sequential", "actions": [
            {"tool": "a", "parameters": null},
            {"tool": "b", "parameters": "None"},
            {"tool": "c", "parameters": "{\"x\": 1}"},
            {"tool": "d", "arguments": {"y": 2}}
        ]}"#;
        let Decision::Plan { plan, .. } = adaptive().parse(raw).unwrap() else {
            panic!("expected a plan");
        };
        assert!(plan.calls[0].arguments.is_empty());
        assert!(plan.calls[1].arguments.is_empty());
        assert_eq!(plan.calls[2].arguments["x"], json!(1));
        assert_eq!(plan.calls[3].arguments["y"], json!(2));
    }

    #[test]
    fn forced_strategy_overrides_declared_mode() {
        let raw = r#"{"thought": "t", "execution_mode": "parallel", "actions": [{"tool": "a"}]}"#;
        let parser = ResponseParser::new(ExecutionStrategy::Sequential);
        let Decision::Plan { plan, .. } = parser.parse(raw).unwrap() else {
            panic!("expected a plan");
        };
        assert_eq!(plan.mode, ExecutionMode::Sequential);

        // A missing mode is fine when the strategy fixes it
        let raw = r#"{"thought": "t", "actions": [{"tool": "a"}]}"#;
        assert!(parser.parse(raw).is_ok());
    }

    #[test]
    fn mixed_mode_accepted() {
        let raw = r#"{"thought": "t", "execution_mode": "mixed",
            "actions": [{"tool": "a"}, {"tool": "a"}, {"tool": "b"}]}"#;
        let Decision::Plan { plan, .. } = adaptive().parse(raw).unwrap() else {
            panic!("expected a plan");
        };
        assert_eq!(plan.mode, ExecutionMode::Mixed);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn reasoning_only_rules() {
        let parser = ResponseParser::new(ExecutionStrategy::ReasoningOnly);
        assert_eq!(
            parser.parse(r#"{"thought": "first, factor it"}"#).unwrap(),
            Decision::Reflect {
                thought: "first, factor it".into()
            }
        );
        assert!(matches!(
            parser.parse(r#"{"Reasoning Steps": ["a", "b"], "finish": false}"#),
            Ok(Decision::Reflect { thought }) if thought == "a\nb"
        ));
        assert!(
            parser
                .parse(r#"{"thought": "t", "execution_mode": "parallel", "actions": [{"tool": "a"}]}"#)
                .is_err()
        );
        assert!(parser.parse(r#"{"finish": false}"#).is_err());
    }
}
