//! Tool builder — declare a tool from an explicit name, schema and handler.
//!
//! ```ignore
//! let tool = ToolBuilder::new("greet")
//!     .description("Say hello")
//!     .param("name", ParamSpec::required(ParamType::String))
//!     .handler(|args| async move {
//!         Ok(format!("hello {}", args["name"].as_str().unwrap_or_default()))
//!     })
//!     .build()?;
//! ```
//!
//! The result is an immutable [`FunctionTool`]; nothing is inferred from
//! the handler's signature.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use toolweave_core::error::{Error, ToolError};
use toolweave_core::tool::{Arguments, ParamSpec, Tool};
use tracing::debug;

type AsyncHandler =
    Arc<dyn Fn(Arguments) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;
type BlockingHandler = Arc<dyn Fn(Arguments) -> Result<String, ToolError> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Async(AsyncHandler),
    /// Runs on the blocking thread pool so CPU-bound or synchronous I/O work
    /// never stalls the runtime.
    Blocking(BlockingHandler),
}

/// A tool assembled by [`ToolBuilder`].
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: BTreeMap<String, ParamSpec>,
    return_direct: bool,
    handler: Handler,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_direct", &self.return_direct)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &BTreeMap<String, ParamSpec> {
        &self.parameters
    }

    fn return_direct(&self) -> bool {
        self.return_direct
    }

    async fn invoke(&self, arguments: Arguments) -> Result<String, ToolError> {
        debug!(tool = %self.name, "Invoking function tool");
        match &self.handler {
            Handler::Async(handler) => handler(arguments).await,
            Handler::Blocking(handler) => {
                let handler = Arc::clone(handler);
                tokio::task::spawn_blocking(move || handler(arguments))
                    .await
                    .map_err(|e| ToolError::execution(&self.name, format!("handler panicked: {e}")))?
            }
        }
    }
}

/// Fluent builder for [`FunctionTool`].
pub struct ToolBuilder {
    name: String,
    description: String,
    parameters: BTreeMap<String, ParamSpec>,
    return_direct: bool,
    handler: Option<Handler>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: BTreeMap::new(),
            return_direct: false,
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    /// Mark the tool so a lone successful call ends the session with its output.
    pub fn return_direct(mut self) -> Self {
        self.return_direct = true;
        self
    }

    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let wrapped: AsyncHandler = Arc::new(move |args| handler(args).boxed());
        self.handler = Some(Handler::Async(wrapped));
        self
    }

    pub fn blocking_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Arguments) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        self.handler = Some(Handler::Blocking(Arc::new(handler)));
        self
    }

    pub fn build(self) -> Result<FunctionTool, Error> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::config(format!(
                "tool name '{}' must be non-empty and contain no whitespace",
                self.name
            )));
        }
        let handler = self
            .handler
            .ok_or_else(|| Error::config(format!("tool '{name}' has no handler")))?;

        Ok(FunctionTool {
            name,
            description: self.description,
            parameters: self.parameters,
            return_direct: self.return_direct,
            handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolweave_core::tool::ParamType;

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn async_handler_invoked() {
        let tool = ToolBuilder::new("greet")
            .description("Say hello")
            .param("name", ParamSpec::required(ParamType::String))
            .handler(|args| async move {
                Ok(format!("hello {}", args["name"].as_str().unwrap_or_default()))
            })
            .build()
            .unwrap();

        assert_eq!(tool.name(), "greet");
        assert!(!tool.return_direct());
        assert_eq!(tool.invoke(args(json!({"name": "ada"}))).await.unwrap(), "hello ada");
    }

    #[tokio::test]
    async fn blocking_handler_runs_off_runtime() {
        let tool = ToolBuilder::new("sum")
            .param("values", ParamSpec::required(ParamType::Array))
            .blocking_handler(|args| {
                let total: i64 = args["values"]
                    .as_array()
                    .map(|v| v.iter().filter_map(|x| x.as_i64()).sum())
                    .unwrap_or(0);
                Ok(total.to_string())
            })
            .build()
            .unwrap();

        assert_eq!(tool.invoke(args(json!({"values": [1, 2, 3]}))).await.unwrap(), "6");
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let tool = ToolBuilder::new("boom")
            .handler(|_| async { Err(ToolError::execution("boom", "exploded")) })
            .build()
            .unwrap();
        let err = tool.invoke(Arguments::new()).await.unwrap_err();
        assert!(err.to_string().contains("exploded"));
    }

    #[tokio::test]
    async fn blocking_panic_becomes_error() {
        let tool = ToolBuilder::new("panics")
            .blocking_handler(|_| panic!("bad tool"))
            .build()
            .unwrap();
        let err = tool.invoke(Arguments::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[test]
    fn return_direct_flag() {
        let tool = ToolBuilder::new("final")
            .return_direct()
            .handler(|_| async { Ok("done".into()) })
            .build()
            .unwrap();
        assert!(tool.return_direct());
        assert_eq!(tool.describe().name, "final");
    }

    #[test]
    fn rejects_missing_handler_and_bad_names() {
        assert!(ToolBuilder::new("nohandler").build().is_err());
        assert!(
            ToolBuilder::new("has space")
                .handler(|_| async { Ok(String::new()) })
                .build()
                .is_err()
        );
        assert!(
            ToolBuilder::new("  ")
                .handler(|_| async { Ok(String::new()) })
                .build()
                .is_err()
        );
    }
}
