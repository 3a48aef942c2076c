//! Planner — one structured decision from the model per round.
//!
//! A malformed response gets exactly one corrective re-request. The retry
//! lives entirely inside [`Planner::decide`], so the loop never counts it
//! as a round.

use chrono::Utc;
use std::sync::Arc;
use toolweave_core::error::{Error, ModelError, Result};
use toolweave_core::event::{DomainEvent, EventBus};
use toolweave_core::model::{ModelClient, ModelRequest};
use toolweave_core::plan::ExecutionStrategy;
use toolweave_core::tool::ToolDescription;
use tracing::{debug, warn};

use crate::parser::{Decision, ResponseParser};
use crate::prompt::{History, PromptBuilder};

/// Attempts per round: the original request plus one corrective retry.
pub const MAX_ATTEMPTS: u32 = 2;

pub struct Planner {
    model: Arc<dyn ModelClient>,
    parser: ResponseParser,
    prompts: PromptBuilder,
    event_bus: Option<Arc<EventBus>>,
}

impl Planner {
    pub fn new(model: Arc<dyn ModelClient>, strategy: ExecutionStrategy) -> Self {
        Self {
            model,
            parser: ResponseParser::new(strategy),
            prompts: PromptBuilder::new(strategy),
            event_bus: None,
        }
    }

    pub fn with_introduction(mut self, introduction: impl Into<String>) -> Self {
        self.prompts = self.prompts.with_introduction(introduction);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.parser.strategy()
    }

    /// Ask the model for the next decision.
    ///
    /// Fails with [`Error::PlannerFormat`] when both attempts are malformed and
    /// with [`Error::Model`] when the model collaborator itself fails.
    pub async fn decide(
        &self,
        history: &History<'_>,
        tools: &[ToolDescription],
    ) -> Result<Decision> {
        let system = self.prompts.system(tools);

        let first = self.request(history, &system, None, 1).await?;
        let reason = match self.parser.parse(&first) {
            Ok(decision) => return Ok(decision),
            Err(e) => e.reason,
        };

        warn!(
            session_id = history.session_id,
            reason = %reason,
            "Malformed planner response, sending corrective retry"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::PlannerRetried {
                session_id: history.session_id.to_string(),
                reason: reason.clone(),
                timestamp: Utc::now(),
            });
        }

        let second = self.request(history, &system, Some(&reason), MAX_ATTEMPTS).await?;
        self.parser.parse(&second).map_err(|e| Error::PlannerFormat {
            reason: e.reason,
            attempts: MAX_ATTEMPTS,
        })
    }

    async fn request(
        &self,
        history: &History<'_>,
        system: &str,
        correction: Option<&str>,
        attempt: u32,
    ) -> Result<String> {
        let request = ModelRequest {
            system: system.to_string(),
            prompt: self.prompts.prompt(history, correction),
            attempt,
        };

        debug!(
            session_id = history.session_id,
            model = self.model.name(),
            attempt,
            "Requesting decision"
        );
        match self.model.send(&request).await {
            Ok(raw) => Ok(raw),
            // An empty reply is a format problem, not a transport one
            Err(ModelError::EmptyResponse) => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedModel;
    use toolweave_core::plan::ExecutionMode;

    const PLAN: &str = r#"{"thought": "add", "execution_mode": "sequential",
        "actions": [{"tool": "calc", "parameters": {"expression": "1+1"}}]}"#;

    fn history<'a>() -> History<'a> {
        History::new("session-1", "what is 1+1?", &[])
    }

    #[tokio::test]
    async fn valid_first_response() {
        let model = Arc::new(ScriptedModel::new([PLAN]));
        let planner = Planner::new(model.clone(), ExecutionStrategy::Adaptive);

        let decision = planner.decide(&history(), &[]).await.unwrap();
        assert!(matches!(decision, Decision::Plan { ref plan, .. } if plan.mode == ExecutionMode::Sequential));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn retries_once_with_correction() {
        let model = Arc::new(ScriptedModel::new(["this is not json", PLAN]));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let planner =
            Planner::new(model.clone(), ExecutionStrategy::Adaptive).with_event_bus(bus.clone());

        let decision = planner.decide(&history(), &[]).await.unwrap();
        assert!(matches!(decision, Decision::Plan { .. }));

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].attempt, 1);
        assert_eq!(requests[1].attempt, 2);
        assert!(requests[1].prompt.contains("could not be used"));
        assert!(!requests[0].prompt.contains("could not be used"));

        let event = rx.try_recv().unwrap();
        assert!(matches!(&*event, DomainEvent::PlannerRetried { session_id, .. } if session_id == "session-1"));
    }

    #[tokio::test]
    async fn second_failure_is_a_format_error() {
        let model = Arc::new(ScriptedModel::new(["nope", "still nope", PLAN]));
        let planner = Planner::new(model.clone(), ExecutionStrategy::Adaptive);

        let err = planner.decide(&history(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::PlannerFormat { attempts: 2, .. }));
        // Bounded to one retry
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_response_is_retried() {
        let model = Arc::new(ScriptedModel::new(["", PLAN]));
        let planner = Planner::new(model.clone(), ExecutionStrategy::Adaptive);
        assert!(planner.decide(&history(), &[]).await.is_ok());
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn model_failure_is_not_retried() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let planner = Planner::new(model.clone(), ExecutionStrategy::Adaptive);
        let err = planner.decide(&history(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert_eq!(model.call_count(), 1);
    }
}
