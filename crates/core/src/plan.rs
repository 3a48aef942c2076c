//! Plan types — what the planner asks for and what execution gives back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ToolError;
use crate::tool::Arguments;

/// A request to invoke one tool with concrete arguments.
///
/// Created by the planner from the model's decision and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub tool: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }

    /// Stable key identifying this exact tool + arguments pair.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.tool, serde_json::Value::Object(self.arguments.clone()))
    }
}

/// How the calls of one plan are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One at a time, in list order.
    Sequential,
    /// Independent calls, concurrently on the worker pool.
    Parallel,
    /// One tool, N argument sets, concurrently on the worker pool.
    Batch,
    /// Heterogeneous calls dispatched like `Parallel`.
    Mixed,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Batch => "batch",
            ExecutionMode::Mixed => "mixed",
        }
    }

    /// Whether calls in this mode run on the worker pool concurrently.
    pub fn is_concurrent(&self) -> bool {
        !matches!(self, ExecutionMode::Sequential)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            "batch" => Ok(ExecutionMode::Batch),
            "mixed" => Ok(ExecutionMode::Mixed),
            other => Err(format!(
                "unknown execution_mode '{other}' (expected sequential, parallel, batch or mixed)"
            )),
        }
    }
}

/// Loop-wide execution strategy, chosen by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Honor the mode the model declares for each plan.
    #[default]
    Adaptive,
    Sequential,
    Parallel,
    Batch,
    /// No tools; the model reasons in steps until it answers.
    ReasoningOnly,
}

impl ExecutionStrategy {
    /// The mode this strategy imposes on every plan, if any.
    pub fn forced_mode(&self) -> Option<ExecutionMode> {
        match self {
            ExecutionStrategy::Sequential => Some(ExecutionMode::Sequential),
            ExecutionStrategy::Parallel => Some(ExecutionMode::Parallel),
            ExecutionStrategy::Batch => Some(ExecutionMode::Batch),
            ExecutionStrategy::Adaptive | ExecutionStrategy::ReasoningOnly => None,
        }
    }

    pub fn uses_tools(&self) -> bool {
        !matches!(self, ExecutionStrategy::ReasoningOnly)
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "adaptive" => Ok(ExecutionStrategy::Adaptive),
            "sequential" => Ok(ExecutionStrategy::Sequential),
            "parallel" => Ok(ExecutionStrategy::Parallel),
            "batch" => Ok(ExecutionStrategy::Batch),
            "reasoning_only" => Ok(ExecutionStrategy::ReasoningOnly),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// One round's tool calls plus their dispatch mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    pub calls: Vec<ToolCall>,
}

impl ExecutionPlan {
    pub fn new(mode: ExecutionMode, calls: Vec<ToolCall>) -> Self {
        Self { mode, calls }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Outcome of one tool call, at the same index as its originating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Tool the call targeted
    pub tool: String,

    pub status: ExecutionStatus,

    /// Tool output on success, error description otherwise
    pub output: String,

    /// Wall time spent on the call
    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(tool: impl Into<String>, output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            status: ExecutionStatus::Success,
            output: output.into(),
            duration_ms,
        }
    }

    pub fn failure(tool: impl Into<String>, error: &ToolError, duration_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            status: ExecutionStatus::Error,
            output: error.to_string(),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Parallel".parse::<ExecutionMode>(), Ok(ExecutionMode::Parallel));
        assert_eq!(" batch ".parse::<ExecutionMode>(), Ok(ExecutionMode::Batch));
        assert!("eventually".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn strategy_forced_modes() {
        assert_eq!(ExecutionStrategy::Adaptive.forced_mode(), None);
        assert_eq!(ExecutionStrategy::Batch.forced_mode(), Some(ExecutionMode::Batch));
        assert!(!ExecutionStrategy::ReasoningOnly.uses_tools());
        assert_eq!("reasoning-only".parse::<ExecutionStrategy>(), Ok(ExecutionStrategy::ReasoningOnly));
    }

    #[test]
    fn fingerprint_distinguishes_arguments() {
        let a = ToolCall::new("search", json!({"q": "rust"}).as_object().cloned().unwrap());
        let b = ToolCall::new("search", json!({"q": "go"}).as_object().cloned().unwrap());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }

    #[test]
    fn failure_result_carries_error_text() {
        let err = ToolError::execution("calc", "division by zero");
        let result = ExecutionResult::failure("calc", &err, 3);
        assert!(!result.is_success());
        assert!(result.output.contains("division by zero"));
    }
}
