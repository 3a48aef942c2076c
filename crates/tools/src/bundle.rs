//! Tool bundles — explicit factories that hand back a fixed list of tools.
//!
//! A bundle is consumed once at startup; the registry owns the tools it
//! yields. Bundles that close over shared state (see [`StateBundle`]) keep
//! a handle to it so the producer side can keep writing.

use std::sync::Arc;
use toolweave_core::error::Error;
use toolweave_core::state::StateCell;
use toolweave_core::tool::Tool;

use crate::builder::ToolBuilder;
use crate::calculator::CalculatorTool;
use crate::clock::CurrentTimeTool;

pub trait ToolBundle {
    fn into_tools(self) -> Result<Vec<Arc<dyn Tool>>, Error>;
}

/// The stateless built-ins: `calculator` and `current_time`.
pub struct BuiltinBundle;

impl ToolBundle for BuiltinBundle {
    fn into_tools(self) -> Result<Vec<Arc<dyn Tool>>, Error> {
        Ok(vec![
            Arc::new(CalculatorTool::new()),
            Arc::new(CurrentTimeTool::new()),
        ])
    }
}

/// Tools over the latest text a background producer recorded,
/// such as a transcription listener.
///
/// - `read_latest` returns the current text, or a notice when nothing has
///   been recorded yet.
/// - `clear_latest` empties the cell.
pub struct StateBundle {
    cell: StateCell<String>,
}

impl StateBundle {
    pub fn new(cell: StateCell<String>) -> Self {
        Self { cell }
    }
}

const NOTHING_RECORDED: &str = "No text has been recorded yet.";

impl ToolBundle for StateBundle {
    fn into_tools(self) -> Result<Vec<Arc<dyn Tool>>, Error> {
        let reader = self.cell.clone();
        let read = ToolBuilder::new("read_latest")
            .description("Return the most recently recorded text.")
            .blocking_handler(move |_| {
                Ok(reader
                    .get()
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| NOTHING_RECORDED.to_string()))
            })
            .build()?;

        let writer = self.cell;
        let clear = ToolBuilder::new("clear_latest")
            .description("Discard the most recently recorded text.")
            .blocking_handler(move |_| {
                Ok(match writer.clear() {
                    Some(_) => "Recorded text cleared.".to_string(),
                    None => "Nothing to clear.".to_string(),
                })
            })
            .build()?;

        Ok(vec![Arc::new(read), Arc::new(clear)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolweave_core::tool::Arguments;

    #[tokio::test]
    async fn state_bundle_reads_and_clears() {
        let cell = StateCell::new();
        let tools = StateBundle::new(cell.clone()).into_tools().unwrap();
        let read = &tools[0];
        let clear = &tools[1];
        assert_eq!(read.name(), "read_latest");
        assert_eq!(clear.name(), "clear_latest");

        assert_eq!(read.invoke(Arguments::new()).await.unwrap(), NOTHING_RECORDED);

        // Producer writes after the tools were built
        cell.set("turn on the lights".to_string());
        assert_eq!(read.invoke(Arguments::new()).await.unwrap(), "turn on the lights");

        assert_eq!(clear.invoke(Arguments::new()).await.unwrap(), "Recorded text cleared.");
        assert_eq!(cell.get(), None);
        assert_eq!(clear.invoke(Arguments::new()).await.unwrap(), "Nothing to clear.");
    }

    #[test]
    fn builtin_bundle_names() {
        let tools = BuiltinBundle.into_tools().unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["calculator", "current_time"]);
    }
}
