//! The loop controller — the round-based state machine that owns a session.
//!
//! ```text
//! Thinking -> Planning -> Executing -> Observing -> Thinking ...
//!                |                         |
//!                +-> Finished              +-> Finished (return_direct tool)
//! Thinking -> Exhausted (ceiling reached)
//! any      -> Failed    (planner format, model, configuration, deadline)
//! ```
//!
//! Rounds are strictly sequential. All concurrency lives inside the
//! dispatcher during `Executing`.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use toolweave_config::AppConfig;
use toolweave_core::error::{Error, Result};
use toolweave_core::event::{DomainEvent, EventBus};
use toolweave_core::memory::HistoryStore;
use toolweave_core::model::ModelClient;
use toolweave_core::plan::{ExecutionPlan, ExecutionResult, ExecutionStrategy};
use toolweave_core::session::{AgentSession, IterationRecord, SessionOutcome};
use toolweave_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::aggregator::ResultAggregator;
use crate::dispatcher::{ExecutionDispatcher, FailureLedger, RoundDeadline};
use crate::parser::Decision;
use crate::planner::Planner;
use crate::prompt::History;

/// Tunables for one controller.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Hard ceiling on recorded rounds per session
    pub max_iterations: u32,
    pub strategy: ExecutionStrategy,
    /// Worker pool size for parallel, batch and mixed plans
    pub max_workers: usize,
    pub tool_timeout: Option<Duration>,
    pub session_timeout: Option<Duration>,
    /// How long in-flight calls may run past the session deadline
    pub grace_period: Duration,
    /// Identical failing calls allowed before refusal; 0 disables
    pub max_identical_failures: u32,
    pub max_output_chars: usize,
    pub introduction: Option<String>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            strategy: ExecutionStrategy::Adaptive,
            max_workers: 5,
            tool_timeout: Some(Duration::from_secs(30)),
            session_timeout: None,
            grace_period: Duration::from_secs(2),
            max_identical_failures: 3,
            max_output_chars: 4000,
            introduction: None,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_iterations: config.agent.max_iterations,
            strategy: config.agent.strategy,
            max_workers: config.execution.max_workers,
            tool_timeout: config.execution.tool_timeout(),
            session_timeout: config.execution.session_timeout(),
            grace_period: config.execution.grace_period(),
            max_identical_failures: config.agent.max_identical_failures,
            max_output_chars: config.observation.max_output_chars,
            introduction: config.agent.introduction.clone(),
        }
    }
}

enum LoopState {
    Thinking,
    Planning(Decision),
    Executing {
        thought: String,
        plan: ExecutionPlan,
    },
    Observing {
        thought: String,
        plan: Option<ExecutionPlan>,
        results: Vec<ExecutionResult>,
    },
    Finished(String),
    Exhausted,
    Failed(Error),
}

impl LoopState {
    fn name(&self) -> &'static str {
        match self {
            LoopState::Thinking => "thinking",
            LoopState::Planning(_) => "planning",
            LoopState::Executing { .. } => "executing",
            LoopState::Observing { .. } => "observing",
            LoopState::Finished(_) => "finished",
            LoopState::Exhausted => "exhausted",
            LoopState::Failed(_) => "failed",
        }
    }
}

/// Drives Think → Plan → Execute → Observe rounds until an answer, the
/// iteration ceiling, or an unrecoverable error.
pub struct LoopController {
    planner: Planner,
    dispatcher: ExecutionDispatcher,
    aggregator: ResultAggregator,
    settings: LoopSettings,
    memory: Option<Arc<dyn HistoryStore>>,
    event_bus: Arc<EventBus>,
}

impl LoopController {
    /// Fails with a configuration error for a zero iteration ceiling or a
    /// zero-sized worker pool.
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        settings: LoopSettings,
    ) -> Result<Self> {
        if settings.max_iterations == 0 {
            return Err(Error::config("max_iterations must be a positive integer"));
        }
        let event_bus = Arc::new(EventBus::default());

        let mut planner = Planner::new(model, settings.strategy).with_event_bus(event_bus.clone());
        if let Some(intro) = &settings.introduction {
            planner = planner.with_introduction(intro.clone());
        }
        let dispatcher = ExecutionDispatcher::new(registry, settings.max_workers)?
            .with_tool_timeout(settings.tool_timeout)
            .with_event_bus(event_bus.clone());

        Ok(Self {
            planner,
            dispatcher,
            aggregator: ResultAggregator::new(settings.max_output_chars),
            settings,
            memory: None,
            event_bus,
        })
    }

    pub fn from_config(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Result<Self> {
        Self::new(model, registry, LoopSettings::from_config(config))
    }

    /// Attach a history store; prior records become prompt context and each
    /// new round is appended.
    pub fn with_memory(mut self, memory: Arc<dyn HistoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Publish loop events on a caller-owned bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.planner = self.planner.with_event_bus(event_bus.clone());
        self.dispatcher = self.dispatcher.with_event_bus(event_bus.clone());
        self.event_bus = event_bus;
        self
    }

    /// A zero timeout disables the deadline.
    pub fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.session_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run one session to a terminal outcome.
    ///
    /// Never returns an error: failures end up in [`SessionOutcome::Failed`]
    /// with every round recorded before the failure intact.
    pub async fn run(&self, query: &str) -> AgentSession {
        let mut session = AgentSession::new(query, self.settings.max_iterations);
        let session_id = session.id.to_string();
        let deadline = self
            .settings
            .session_timeout
            .filter(|t| !t.is_zero())
            .map(|t| Instant::now() + t);
        let limit = deadline.map(|d| RoundDeadline::new(d, self.settings.grace_period));
        let prior = self.load_prior().await;
        let tools = if self.settings.strategy.uses_tools() {
            self.dispatcher.registry().describe_all()
        } else {
            Vec::new()
        };
        let mut ledger = FailureLedger::new(self.settings.max_identical_failures);

        info!(
            session_id = %session_id,
            strategy = ?self.settings.strategy,
            max_iterations = self.settings.max_iterations,
            tools = tools.len(),
            prior_records = prior.len(),
            "Session started"
        );

        let mut state = LoopState::Thinking;
        loop {
            debug!(session_id = %session_id, state = state.name(), "Loop state");
            state = match state {
                LoopState::Thinking => {
                    if session.ceiling_reached() {
                        LoopState::Exhausted
                    } else {
                        let iteration = session.iterations() as u32 + 1;
                        self.event_bus.publish(DomainEvent::RoundStarted {
                            session_id: session_id.clone(),
                            iteration,
                            timestamp: Utc::now(),
                        });
                        let history = History::new(&session_id, &session.query, &session.records)
                            .with_prior(&prior);
                        let decision = match deadline {
                            Some(deadline) => {
                                tokio::time::timeout_at(deadline, self.planner.decide(&history, &tools))
                                    .await
                                    .unwrap_or_else(|_| Err(self.timeout_error()))
                            }
                            None => self.planner.decide(&history, &tools).await,
                        };
                        match decision {
                            Ok(decision) => LoopState::Planning(decision),
                            Err(e) => LoopState::Failed(e),
                        }
                    }
                }

                LoopState::Planning(decision) => match decision {
                    Decision::FinalAnswer { thought, answer } => {
                        let record = IterationRecord {
                            thought,
                            plan: None,
                            results: Vec::new(),
                            observation: format!("Final answer: {answer}"),
                            timestamp: Utc::now(),
                        };
                        self.record(&mut session, record).await;
                        LoopState::Finished(answer)
                    }
                    Decision::Reflect { thought } => LoopState::Observing {
                        thought,
                        plan: None,
                        results: Vec::new(),
                    },
                    Decision::Plan { thought, plan } => LoopState::Executing { thought, plan },
                },

                LoopState::Executing { thought, plan } => {
                    self.event_bus.publish(DomainEvent::PlanDispatched {
                        session_id: session_id.clone(),
                        mode: plan.mode,
                        calls: plan.len(),
                        timestamp: Utc::now(),
                    });
                    match self.dispatcher.execute_with(&plan, limit, &mut ledger).await {
                        Ok(results) => LoopState::Observing {
                            thought,
                            plan: Some(plan),
                            results,
                        },
                        Err(e) => LoopState::Failed(e),
                    }
                }

                LoopState::Observing {
                    thought,
                    plan,
                    results,
                } => {
                    let (observation, successes, failures) = match &plan {
                        Some(_) => {
                            let rendered = self.aggregator.render(&results);
                            (rendered.text, rendered.successes, rendered.failures)
                        }
                        // Reasoning steps are their own observation
                        None => (thought.clone(), 0, 0),
                    };
                    let direct = self.direct_answer(plan.as_ref(), &results);

                    info!(
                        session_id = %session_id,
                        iteration = session.iterations() + 1,
                        mode = plan.as_ref().map(|p| p.mode.as_str()).unwrap_or("reasoning"),
                        successes,
                        failures,
                        "Round complete"
                    );
                    let record = IterationRecord {
                        thought,
                        plan,
                        results,
                        observation,
                        timestamp: Utc::now(),
                    };
                    self.record(&mut session, record).await;

                    if let Some(answer) = direct {
                        LoopState::Finished(answer)
                    } else if deadline.is_some_and(|d| Instant::now() >= d) {
                        LoopState::Failed(self.timeout_error())
                    } else {
                        LoopState::Thinking
                    }
                }

                LoopState::Finished(answer) => {
                    session.finish(SessionOutcome::FinalAnswer { answer });
                    break;
                }

                LoopState::Exhausted => {
                    warn!(
                        session_id = %session_id,
                        iterations = session.iterations(),
                        "Iteration ceiling reached without a final answer"
                    );
                    let partial = session.partial_answer();
                    session.finish(SessionOutcome::Exhausted { partial });
                    break;
                }

                LoopState::Failed(error) => {
                    warn!(session_id = %session_id, error = %error, "Session failed");
                    session.finish(SessionOutcome::Failed {
                        cause: error.to_string(),
                    });
                    break;
                }
            };
        }

        let outcome = match &session.outcome {
            SessionOutcome::FinalAnswer { .. } => "final_answer",
            SessionOutcome::Exhausted { .. } => "iterations_exhausted",
            SessionOutcome::Failed { .. } => "failed",
            SessionOutcome::Pending => "pending",
        };
        info!(
            session_id = %session_id,
            outcome,
            iterations = session.iterations(),
            "Session finished"
        );
        self.event_bus.publish(DomainEvent::SessionFinished {
            session_id,
            outcome: outcome.to_string(),
            iterations: session.iterations(),
            timestamp: Utc::now(),
        });
        session
    }

    fn timeout_error(&self) -> Error {
        Error::SessionTimeout {
            timeout_ms: self
                .settings
                .session_timeout
                .map(|t| t.as_millis() as u64)
                .unwrap_or(0),
        }
    }

    /// A lone successful call to a `return_direct` tool answers the query.
    fn direct_answer(
        &self,
        plan: Option<&ExecutionPlan>,
        results: &[ExecutionResult],
    ) -> Option<String> {
        let plan = plan?;
        let [call] = plan.calls.as_slice() else {
            return None;
        };
        let result = results.first().filter(|r| r.is_success())?;
        let tool = self.dispatcher.registry().lookup(&call.tool).ok()?;
        tool.return_direct().then(|| result.output.clone())
    }

    async fn load_prior(&self) -> Vec<IterationRecord> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        match memory.read().await {
            Ok(records) => records,
            Err(e) => {
                warn!(store = memory.name(), error = %e, "Failed to read history");
                Vec::new()
            }
        }
    }

    async fn record(&self, session: &mut AgentSession, record: IterationRecord) {
        if let Some(memory) = &self.memory {
            if let Err(e) = memory.append(&record).await {
                warn!(store = memory.name(), error = %e, "Failed to append history record");
            }
        }
        session.records.push(record);
    }
}
