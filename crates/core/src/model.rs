//! Model collaborator trait — the narrow seam to a language model.
//!
//! Transport, retries, backoff and provider payload shaping all live behind
//! this trait. The planner only sends a rendered context and reads raw text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The rendered context for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Persona, tool listing and response format
    pub system: String,

    /// Prior rounds, the user query, and any corrective instruction
    pub prompt: String,

    /// 1 for the first attempt of a round, 2 for the corrective retry
    pub attempt: u32,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier for logs (e.g., "openai/gpt-4o", "scripted").
    fn name(&self) -> &str;

    /// Send the context and return the model's raw text.
    async fn send(&self, request: &ModelRequest) -> std::result::Result<String, ModelError>;
}
