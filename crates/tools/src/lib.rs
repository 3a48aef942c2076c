//! Built-in tools and tool construction helpers for toolweave.
//!
//! Tools are declared explicitly, either by implementing
//! [`toolweave_core::Tool`] or with [`ToolBuilder`], and grouped into
//! [`ToolBundle`]s that are registered once at startup.

pub mod builder;
pub mod bundle;
pub mod calculator;
pub mod clock;

pub use builder::{FunctionTool, ToolBuilder};
pub use bundle::{BuiltinBundle, StateBundle, ToolBundle};
pub use calculator::CalculatorTool;
pub use clock::CurrentTimeTool;

use toolweave_core::error::Error;
use toolweave_core::state::StateCell;
use toolweave_core::tool::ToolRegistry;

/// Create a registry with every built-in tool.
///
/// The state tools read from `latest`; pass a clone of the cell to whatever
/// produces text in the background.
pub fn default_registry(latest: StateCell<String>) -> Result<ToolRegistry, Error> {
    let mut registry = ToolRegistry::new();
    registry.register_all(BuiltinBundle.into_tools()?)?;
    registry.register_all(StateBundle::new(latest).into_tools()?)?;
    Ok(registry)
}
