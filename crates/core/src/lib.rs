//! # toolweave core
//!
//! Domain types, traits, and error definitions for the toolweave
//! tool-orchestration engine. This crate has **no runtime logic beyond the
//! registry** — it defines the domain model the other crates build on.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (language model, tool, history store) is a
//! trait here. Implementations live in their own crates, which keeps the
//! dependency graph pointing inward and makes every seam mockable in tests.

pub mod error;
pub mod event;
pub mod memory;
pub mod model;
pub mod plan;
pub mod session;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use memory::HistoryStore;
pub use model::{ModelClient, ModelRequest};
pub use plan::{ExecutionMode, ExecutionPlan, ExecutionResult, ExecutionStatus, ExecutionStrategy, ToolCall};
pub use session::{AgentSession, IterationRecord, SessionOutcome};
pub use state::StateCell;
pub use tool::{Arguments, ParamSpec, ParamType, Tool, ToolDescription, ToolRegistry};
