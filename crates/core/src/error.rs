//! Error types for the toolweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is the session-level
//! umbrella that only carries what is allowed to end a session.

use thiserror::Error;

/// The top-level error type for all toolweave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Model collaborator errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- History store errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Planner output that stayed malformed after the corrective retry ---
    #[error("Planner response format error after {attempts} attempt(s): {reason}")]
    PlannerFormat { reason: String, attempts: u32 },

    // --- Configuration errors (empty plan, bad worker count, ...) ---
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // --- Whole-session deadline ---
    #[error("Session timed out after {timeout_ms}ms")]
    SessionTimeout { timeout_ms: u64 },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool '{0}' is already registered")]
    Duplicate(String),

    #[error("Tool '{name}' not found{}", suggestion_suffix(.suggestion))]
    Unknown {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Invalid parameter '{parameter}' for tool '{tool}': {reason}")]
    InvalidParameter {
        tool: String,
        parameter: String,
        reason: String,
    },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    Execution { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool call abandoned at session deadline: {tool_name}")]
    Abandoned { tool_name: String },

    #[error("Tool call blocked: {tool_name} failed {failures} times with these arguments, try a different approach")]
    RepeatedFailure { tool_name: String, failures: u32 },
}

impl ToolError {
    /// Shorthand for an execution failure raised from inside a tool body.
    pub fn execution(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(hint) => format!(". {hint}"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model request timed out: {0}")]
    Timeout(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Model collaborator not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted history record: {0}")]
    Corrupted(String),
}
