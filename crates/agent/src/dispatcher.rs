//! Execution dispatcher — runs one plan under its mode.
//!
//! - `sequential`: calls run one at a time in list order.
//! - `parallel`, `batch`, `mixed`: calls run as tasks on a bounded worker
//!   pool (a semaphore with `max_workers` permits shared across rounds).
//!
//! Whatever the mode, result `i` always belongs to call `i`. Tool failures,
//! timeouts, panics and abandoned calls become error results at their
//! position; only configuration problems are returned as `Err`.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use toolweave_core::error::{Error, Result, ToolError};
use toolweave_core::event::{DomainEvent, EventBus};
use toolweave_core::plan::{ExecutionMode, ExecutionPlan, ExecutionResult, ToolCall};
use toolweave_core::tool::{Arguments, Tool, ToolRegistry};
use tracing::{debug, warn};

/// Session-scoped record of failing (tool, arguments) pairs.
///
/// After `threshold` failures an identical call is refused without being
/// invoked. A threshold of zero disables the guard.
#[derive(Debug, Clone, Default)]
pub struct FailureLedger {
    threshold: u32,
    failures: HashMap<String, u32>,
}

impl FailureLedger {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            failures: HashMap::new(),
        }
    }

    /// The refusal for `call`, if it has already failed too often.
    pub fn check(&self, call: &ToolCall) -> Option<ToolError> {
        if self.threshold == 0 {
            return None;
        }
        let failures = self.failures.get(&call.fingerprint()).copied().unwrap_or(0);
        (failures >= self.threshold).then(|| ToolError::RepeatedFailure {
            tool_name: call.tool.clone(),
            failures,
        })
    }

    pub fn record(&mut self, call: &ToolCall, result: &ExecutionResult) {
        let key = call.fingerprint();
        if result.is_success() {
            self.failures.remove(&key);
        } else {
            *self.failures.entry(key).or_insert(0) += 1;
        }
    }

    pub fn failures(&self, call: &ToolCall) -> u32 {
        self.failures.get(&call.fingerprint()).copied().unwrap_or(0)
    }
}

/// When a round has to stop.
///
/// No call starts at or after `deadline`; calls already running get until
/// `cutoff` and are abandoned after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundDeadline {
    pub deadline: Instant,
    pub cutoff: Instant,
}

impl RoundDeadline {
    pub fn new(deadline: Instant, grace: Duration) -> Self {
        Self {
            deadline,
            cutoff: deadline + grace,
        }
    }
}

/// A call that passed validation and may be invoked.
struct Prepared {
    tool: Arc<dyn Tool>,
    name: String,
    arguments: Arguments,
}

/// Executes plans against a shared, read-only registry.
pub struct ExecutionDispatcher {
    registry: Arc<ToolRegistry>,
    pool: Arc<Semaphore>,
    max_workers: usize,
    tool_timeout: Option<Duration>,
    event_bus: Option<Arc<EventBus>>,
}

impl ExecutionDispatcher {
    /// Fails with a configuration error when `max_workers` is zero.
    pub fn new(registry: Arc<ToolRegistry>, max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(Error::config("max_workers must be a positive integer"));
        }
        Ok(Self {
            registry,
            pool: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            tool_timeout: None,
            event_bus: None,
        })
    }

    /// Bound every individual invocation.
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a plan with no deadline and no failure guard.
    pub async fn execute(&self, plan: &ExecutionPlan) -> Result<Vec<ExecutionResult>> {
        self.execute_with(plan, None, &mut FailureLedger::new(0)).await
    }

    /// Run a plan.
    ///
    /// Calls not yet started at the round deadline are abandoned without
    /// being invoked; calls still running at its cutoff are abandoned too.
    /// `ledger` refuses repeated identical failures and is updated with the
    /// outcome of every call.
    pub async fn execute_with(
        &self,
        plan: &ExecutionPlan,
        limit: Option<RoundDeadline>,
        ledger: &mut FailureLedger,
    ) -> Result<Vec<ExecutionResult>> {
        self.check_plan(plan)?;

        debug!(
            mode = %plan.mode,
            calls = plan.len(),
            max_workers = self.max_workers,
            "Dispatching plan"
        );

        // Validation and the failure guard run before any tool body
        let guard: &FailureLedger = ledger;
        let prepared: Vec<std::result::Result<Prepared, ExecutionResult>> = plan
            .calls
            .iter()
            .map(|call| self.prepare(call, guard))
            .collect();

        let results = match plan.mode {
            ExecutionMode::Sequential => self.run_sequential(prepared, limit).await,
            ExecutionMode::Parallel | ExecutionMode::Batch | ExecutionMode::Mixed => {
                self.run_pooled(prepared, limit).await
            }
        };

        for (call, result) in plan.calls.iter().zip(&results) {
            ledger.record(call, result);
        }
        Ok(results)
    }

    fn check_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        if plan.is_empty() {
            return Err(Error::config("execution plan has no calls"));
        }
        if plan.mode == ExecutionMode::Batch {
            let tools: BTreeSet<&str> = plan.calls.iter().map(|c| c.tool.as_str()).collect();
            if tools.len() > 1 {
                return Err(Error::config(format!(
                    "batch plan must target a single tool, got {}",
                    tools.into_iter().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        Ok(())
    }

    fn prepare(
        &self,
        call: &ToolCall,
        ledger: &FailureLedger,
    ) -> std::result::Result<Prepared, ExecutionResult> {
        if let Some(refusal) = ledger.check(call) {
            warn!(tool = %call.tool, "Refusing repeated failing call");
            return Err(self.finish(ExecutionResult::failure(&call.tool, &refusal, 0)));
        }
        let arguments = self.registry.validate(call).map_err(|e| {
            warn!(tool = %call.tool, error = %e, "Tool call rejected before invocation");
            self.finish(ExecutionResult::failure(&call.tool, &e, 0))
        })?;
        let tool = self
            .registry
            .lookup(&call.tool)
            .map_err(|e| self.finish(ExecutionResult::failure(&call.tool, &e, 0)))?;
        Ok(Prepared {
            tool,
            name: call.tool.clone(),
            arguments,
        })
    }

    async fn run_sequential(
        &self,
        prepared: Vec<std::result::Result<Prepared, ExecutionResult>>,
        limit: Option<RoundDeadline>,
    ) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(prepared.len());
        for entry in prepared {
            let call = match entry {
                Ok(call) => call,
                Err(rejected) => {
                    results.push(rejected);
                    continue;
                }
            };
            let name = call.name.clone();
            let started = std::time::Instant::now();
            let result = match limit {
                Some(limit) if Instant::now() >= limit.deadline => abandoned(&name, started),
                Some(limit) => {
                    match tokio::time::timeout_at(limit.cutoff, invoke(call, self.tool_timeout)).await {
                        Ok(result) => result,
                        Err(_) => abandoned(&name, started),
                    }
                }
                None => invoke(call, self.tool_timeout).await,
            };
            results.push(self.finish(result));
        }
        results
    }

    async fn run_pooled(
        &self,
        prepared: Vec<std::result::Result<Prepared, ExecutionResult>>,
        limit: Option<RoundDeadline>,
    ) -> Vec<ExecutionResult> {
        enum Slot {
            Done(ExecutionResult),
            Running(String, JoinHandle<ExecutionResult>),
        }

        let started = std::time::Instant::now();
        let slots: Vec<Slot> = prepared
            .into_iter()
            .map(|entry| match entry {
                Err(rejected) => Slot::Done(rejected),
                Ok(call) => {
                    let name = call.name.clone();
                    let pool = Arc::clone(&self.pool);
                    let timeout = self.tool_timeout;
                    let handle = tokio::spawn(async move {
                        let queued = std::time::Instant::now();
                        // Excess calls wait here until a worker slot frees up
                        let acquired = match limit {
                            Some(limit) => tokio::select! {
                                biased;
                                _ = tokio::time::sleep_until(limit.deadline) => None,
                                permit = pool.acquire_owned() => Some(permit),
                            },
                            None => Some(pool.acquire_owned().await),
                        };
                        let _permit = match acquired {
                            Some(Ok(permit)) => permit,
                            Some(Err(_)) => {
                                let err = ToolError::execution(&call.name, "worker pool closed");
                                return ExecutionResult::failure(&call.name, &err, 0);
                            }
                            None => return abandoned(&call.name, queued),
                        };
                        invoke(call, timeout).await
                    });
                    Slot::Running(name, handle)
                }
            })
            .collect();

        // Await in submission order; completion order does not matter
        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Done(result) => result,
                Slot::Running(name, mut handle) => {
                    let joined = match limit {
                        Some(limit) => match tokio::time::timeout_at(limit.cutoff, &mut handle).await {
                            Ok(joined) => Some(joined),
                            Err(_) => {
                                handle.abort();
                                None
                            }
                        },
                        None => Some(handle.await),
                    };
                    match joined {
                        Some(Ok(result)) => self.finish(result),
                        Some(Err(e)) => {
                            let err = ToolError::execution(&name, format!("tool task failed: {e}"));
                            self.finish(ExecutionResult::failure(
                                &name,
                                &err,
                                started.elapsed().as_millis() as u64,
                            ))
                        }
                        None => self.finish(abandoned(&name, started)),
                    }
                }
            };
            results.push(result);
        }
        results
    }

    /// Log and publish one finished result.
    fn finish(&self, result: ExecutionResult) -> ExecutionResult {
        if result.is_success() {
            debug!(tool = %result.tool, duration_ms = result.duration_ms, "Tool call succeeded");
        } else {
            warn!(
                tool = %result.tool,
                duration_ms = result.duration_ms,
                error = %result.output,
                "Tool call failed"
            );
        }
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: result.tool.clone(),
                success: result.is_success(),
                duration_ms: result.duration_ms,
                timestamp: Utc::now(),
            });
        }
        result
    }
}

async fn invoke(call: Prepared, timeout: Option<Duration>) -> ExecutionResult {
    let started = std::time::Instant::now();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call.tool.invoke(call.arguments)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_ms: limit.as_millis() as u64,
            }),
        },
        None => call.tool.invoke(call.arguments).await,
    };
    let duration_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(output) => ExecutionResult::success(&call.name, output, duration_ms),
        Err(e) => ExecutionResult::failure(&call.name, &e, duration_ms),
    }
}

fn abandoned(name: &str, started: std::time::Instant) -> ExecutionResult {
    let err = ToolError::Abandoned {
        tool_name: name.to_string(),
    };
    ExecutionResult::failure(name, &err, started.elapsed().as_millis() as u64)
}
