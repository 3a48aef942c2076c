//! Current time tool.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use toolweave_core::error::ToolError;
use toolweave_core::tool::{Arguments, ParamSpec, ParamType, Tool};

const DEFAULT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Reports the current UTC time, formatted with a strftime-style pattern.
pub struct CurrentTimeTool {
    parameters: BTreeMap<String, ParamSpec>,
}

impl CurrentTimeTool {
    pub fn new() -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "format".to_string(),
            ParamSpec::optional(ParamType::String)
                .with_default(DEFAULT_FORMAT.into())
                .with_description("strftime-style format string"),
        );
        Self { parameters }
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC."
    }

    fn parameters(&self) -> &BTreeMap<String, ParamSpec> {
        &self.parameters
    }

    async fn invoke(&self, arguments: Arguments) -> Result<String, ToolError> {
        let format = arguments
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_FORMAT);

        // chrono reports bad specifiers through fmt::Error rather than up front
        let mut out = String::new();
        write!(out, "{}", Utc::now().format(format)).map_err(|_| {
            ToolError::execution("current_time", format!("invalid time format '{format}'"))
        })?;
        Ok(out)
    }
}
