//! Session types — the execution trace of one agent invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::{ExecutionPlan, ExecutionResult};

/// Partial answer used when the ceiling is hit before any observation exists.
pub const NO_FINAL_ANSWER: &str = "no final answer reached";

/// One completed round: thought, plan, results, rendered observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// The planner's stated rationale
    pub thought: String,

    /// Plan issued this round; `None` for reasoning-only rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionPlan>,

    /// Results, index-aligned with `plan.calls`
    #[serde(default)]
    pub results: Vec<ExecutionResult>,

    /// Observation text fed back to the planner
    pub observation: String,

    pub timestamp: DateTime<Utc>,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Still running; only observable before the controller returns.
    Pending,
    /// The planner produced a final answer.
    FinalAnswer { answer: String },
    /// The iteration ceiling was reached; `partial` is the best available answer.
    Exhausted { partial: String },
    /// Unrecoverable planner, model, configuration or deadline error.
    Failed { cause: String },
}

/// The full trace of one invocation. Mutated only by the loop controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: Uuid,
    pub query: String,
    pub records: Vec<IterationRecord>,
    pub max_iterations: u32,
    pub outcome: SessionOutcome,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl AgentSession {
    pub fn new(query: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            records: Vec::new(),
            max_iterations,
            outcome: SessionOutcome::Pending,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Number of rounds recorded so far.
    pub fn iterations(&self) -> usize {
        self.records.len()
    }

    pub fn ceiling_reached(&self) -> bool {
        self.records.len() >= self.max_iterations as usize
    }

    /// The final or partial answer, if the session ended with one.
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            SessionOutcome::FinalAnswer { answer } => Some(answer),
            SessionOutcome::Exhausted { partial } => Some(partial),
            SessionOutcome::Pending | SessionOutcome::Failed { .. } => None,
        }
    }

    pub fn iterations_exhausted(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Exhausted { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, SessionOutcome::FinalAnswer { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Failed { .. })
    }

    /// Best partial answer for an exhausted session.
    pub fn partial_answer(&self) -> String {
        self.records
            .last()
            .map(|r| r.observation.clone())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| NO_FINAL_ANSWER.to_string())
    }

    /// Close the session with its terminal outcome.
    pub fn finish(&mut self, outcome: SessionOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(observation: &str) -> IterationRecord {
        IterationRecord {
            thought: "thinking".into(),
            plan: None,
            results: vec![],
            observation: observation.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_session_is_pending() {
        let session = AgentSession::new("hello", 3);
        assert_eq!(session.outcome, SessionOutcome::Pending);
        assert_eq!(session.iterations(), 0);
        assert!(session.answer().is_none());
        assert!(!session.ceiling_reached());
    }

    #[test]
    fn partial_answer_prefers_last_observation() {
        let mut session = AgentSession::new("q", 2);
        assert_eq!(session.partial_answer(), NO_FINAL_ANSWER);
        session.records.push(record("first"));
        session.records.push(record("second"));
        assert_eq!(session.partial_answer(), "second");
        assert!(session.ceiling_reached());
    }

    #[test]
    fn exhausted_outcome_flags() {
        let mut session = AgentSession::new("q", 1);
        session.finish(SessionOutcome::Exhausted {
            partial: NO_FINAL_ANSWER.into(),
        });
        assert!(session.iterations_exhausted());
        assert!(!session.is_finished());
        assert_eq!(session.answer(), Some(NO_FINAL_ANSWER));
        assert!(session.finished_at.is_some());
    }

    #[test]
    fn record_serializes_without_plan() {
        let json = serde_json::to_string(&record("obs")).unwrap();
        assert!(!json.contains("\"plan\""));
        let back: IterationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.observation, "obs");
    }
}
