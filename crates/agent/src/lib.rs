//! The agent loop — Think → Plan → Execute → Observe.
//!
//! 1. **Think**: the [`Planner`] asks the model for one structured decision
//! 2. **Plan**: the decision is either a final answer, a reasoning step, or
//!    an [`ExecutionPlan`](toolweave_core::ExecutionPlan)
//! 3. **Execute**: the [`ExecutionDispatcher`] runs the plan's calls in the
//!    requested mode, bounded by a worker pool
//! 4. **Observe**: the [`ResultAggregator`] folds the results into the text
//!    the model sees next round
//!
//! The [`LoopController`] repeats this until an answer, the iteration
//! ceiling, or an unrecoverable error.

pub mod aggregator;
pub mod dispatcher;
pub mod loop_runner;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod scripted;

pub use aggregator::{Observation, ResultAggregator};
pub use dispatcher::{ExecutionDispatcher, FailureLedger, RoundDeadline};
pub use loop_runner::{LoopController, LoopSettings};
pub use parser::{Decision, ParseError, ResponseParser};
pub use planner::Planner;
pub use prompt::{History, PromptBuilder};
pub use scripted::ScriptedModel;
