//! Scripted model — replays canned responses in order.
//!
//! Used by the test suites and by `toolweave replay` to drive the loop
//! without a real model behind it.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use toolweave_core::error::ModelError;
use toolweave_core::model::{ModelClient, ModelRequest};

/// Separator line between responses in a replay script.
pub const SCRIPT_SEPARATOR: &str = "---";

/// A model that answers with a fixed queue of responses.
///
/// Once the queue is empty every call fails with [`ModelError::Request`].
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Parse a replay script: responses separated by lines holding only `---`.
    pub fn from_script(script: &str) -> Self {
        let mut responses = Vec::new();
        let mut current = String::new();
        for line in script.lines() {
            if line.trim() == SCRIPT_SEPARATOR {
                responses.push(std::mem::take(&mut current));
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        if !current.trim().is_empty() {
            responses.push(current);
        }
        Self::new(responses.into_iter().map(|r| r.trim().to_string()))
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .map(|r| r.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| ModelError::Request("request log poisoned".into()))?;
        requests.push(request.clone());
        drop(requests);

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| ModelError::Request("response queue poisoned".into()))?;
        responses
            .pop_front()
            .ok_or_else(|| ModelError::Request("scripted model has no more responses".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            system: "sys".into(),
            prompt: "prompt".into(),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let model = ScriptedModel::new(["one", "two"]);
        assert_eq!(model.send(&request()).await.unwrap(), "one");
        assert_eq!(model.send(&request()).await.unwrap(), "two");
        assert!(model.send(&request()).await.is_err());
        assert_eq!(model.call_count(), 3);
    }

    #[test]
    fn script_parsing() {
        let script = "{\"a\": 1}\n---\n{\n  \"b\": 2\n}\n---\n\n{\"c\": 3}\n";
        let model = ScriptedModel::from_script(script);
        assert_eq!(model.remaining(), 3);
    }
}
