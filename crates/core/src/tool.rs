//! Tool trait — the abstraction over invocable capabilities.
//!
//! Tools are what let the model act: search, compute, read shared state.
//! The core only ever sees this contract; tool internals are opaque.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

use crate::error::ToolError;
use crate::plan::ToolCall;

/// Named arguments passed to a tool.
pub type Arguments = serde_json::Map<String, Value>;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    /// Whether a JSON value satisfies this declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema entry for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(kind: ParamType) -> Self {
        Self {
            kind,
            description: String::new(),
            required: true,
            default: None,
        }
    }

    pub fn optional(kind: ParamType) -> Self {
        Self {
            kind,
            description: String::new(),
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The core Tool trait.
///
/// Tools are built once at startup (see the `toolweave-tools` builder),
/// registered in a [`ToolRegistry`], and never mutated afterwards.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Parameter schema, keyed by parameter name.
    fn parameters(&self) -> &BTreeMap<String, ParamSpec>;

    /// When true, a lone successful call ends the session with this output.
    fn return_direct(&self) -> bool {
        false
    }

    /// Invoke the tool with already-validated arguments.
    async fn invoke(&self, arguments: Arguments) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a description for the planner prompt.
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().clone(),
        }
    }
}

/// Schema metadata handed to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParamSpec>,
}

/// Render descriptions as the tool listing embedded in the model prompt.
pub fn render_descriptions(descriptions: &[ToolDescription]) -> String {
    if descriptions.is_empty() {
        return "No tools available.".into();
    }

    let mut out = String::new();
    for (i, desc) in descriptions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "- {}: {}", desc.name, desc.description);
        if desc.parameters.is_empty() {
            out.push_str("    (no parameters)\n");
            continue;
        }
        for (name, spec) in &desc.parameters {
            let req = if spec.required { "required" } else { "optional" };
            let _ = write!(out, "    - {name} ({}, {req})", spec.kind.as_str());
            if let Some(default) = &spec.default {
                let _ = write!(out, " default={default}");
            }
            if !spec.description.is_empty() {
                let _ = write!(out, ": {}", spec.description);
            }
            out.push('\n');
        }
    }
    out
}

/// A registry of available tools.
///
/// Read-only once construction is done; share it behind an `Arc` across
/// concurrent tool invocations without locking.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Fails if a tool with the same name is present.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        debug!(tool = %name, "Registered tool");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register an explicit list of tools, stopping at the first duplicate.
    pub fn register_all(
        &mut self,
        tools: impl IntoIterator<Item = Arc<dyn Tool>>,
    ) -> std::result::Result<(), ToolError> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> std::result::Result<Arc<dyn Tool>, ToolError> {
        self.tools.get(name).cloned().ok_or_else(|| ToolError::Unknown {
            name: name.to_string(),
            suggestion: Some(self.suggest(name)),
        })
    }

    fn suggest(&self, name: &str) -> String {
        let needle = name.to_lowercase();
        let similar: Vec<&str> = self
            .order
            .iter()
            .filter(|known| {
                let known = known.to_lowercase();
                !needle.is_empty() && (known.contains(&needle) || needle.contains(&known))
            })
            .map(String::as_str)
            .collect();

        if !similar.is_empty() {
            format!("Did you mean: {}?", similar.join(", "))
        } else if self.order.is_empty() {
            "No tools are registered".into()
        } else {
            format!("Available tools: {}", self.order.join(", "))
        }
    }

    /// Describe every tool, in registration order.
    pub fn describe_all(&self) -> Vec<ToolDescription> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.describe())
            .collect()
    }

    /// Check a call against the target tool's schema without invoking it.
    ///
    /// Returns the argument map with declared defaults applied for omitted
    /// optional parameters.
    pub fn validate(&self, call: &ToolCall) -> std::result::Result<Arguments, ToolError> {
        let tool = self.lookup(&call.tool)?;
        let schema = tool.parameters();

        for (key, value) in &call.arguments {
            let Some(spec) = schema.get(key) else {
                return Err(ToolError::InvalidParameter {
                    tool: call.tool.clone(),
                    parameter: key.clone(),
                    reason: "unexpected parameter".into(),
                });
            };
            if !spec.kind.accepts(value) {
                return Err(ToolError::InvalidParameter {
                    tool: call.tool.clone(),
                    parameter: key.clone(),
                    reason: format!("expected {}, got {}", spec.kind.as_str(), json_kind(value)),
                });
            }
        }

        let mut resolved = call.arguments.clone();
        for (name, spec) in schema {
            if resolved.contains_key(name) {
                continue;
            }
            if spec.required {
                return Err(ToolError::InvalidParameter {
                    tool: call.tool.clone(),
                    parameter: name.clone(),
                    reason: "missing required parameter".into(),
                });
            }
            if let Some(default) = &spec.default {
                resolved.insert(name.clone(), default.clone());
            }
        }
        Ok(resolved)
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A simple test tool for unit tests.
    struct EchoTool {
        schema: BTreeMap<String, ParamSpec>,
        calls: AtomicUsize,
    }

    impl EchoTool {
        fn new() -> Self {
            let mut schema = BTreeMap::new();
            schema.insert("text".into(), ParamSpec::required(ParamType::String));
            schema.insert(
                "repeat".into(),
                ParamSpec::optional(ParamType::Integer).with_default(json!(1)),
            );
            Self {
                schema,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters(&self) -> &BTreeMap<String, ParamSpec> { &self.schema }
        async fn invoke(&self, arguments: Arguments) -> std::result::Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    fn call(tool: &str, args: Value) -> ToolCall {
        ToolCall::new(tool, args.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        assert!(registry.lookup("echo").is_ok());
        assert!(matches!(registry.lookup("nonexistent"), Err(ToolError::Unknown { .. })));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        let err = registry.register(Arc::new(EchoTool::new())).unwrap_err();
        assert_eq!(err, ToolError::Duplicate("echo".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_suggests_similar_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        let err = registry.lookup("ech").err().unwrap();
        assert!(err.to_string().contains("Did you mean: echo?"));

        let err = registry.lookup("weather").err().unwrap();
        assert!(err.to_string().contains("Available tools: echo"));
    }

    #[test]
    fn describe_all_lists_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        let defs = registry.describe_all();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert!(defs[0].parameters["text"].required);

        let text = render_descriptions(&defs);
        assert!(text.contains("- echo: Echoes back the input"));
        assert!(text.contains("text (string, required)"));
        assert!(text.contains("repeat (integer, optional) default=1"));
    }

    #[test]
    fn validate_applies_defaults() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        let args = registry.validate(&call("echo", json!({"text": "hi"}))).unwrap();
        assert_eq!(args["repeat"], json!(1));
        assert_eq!(args["text"], json!("hi"));
    }

    #[test]
    fn validate_rejects_bad_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();

        let missing = registry.validate(&call("echo", json!({}))).unwrap_err();
        assert!(matches!(missing, ToolError::InvalidParameter { ref parameter, .. } if parameter == "text"));

        let wrong_type = registry.validate(&call("echo", json!({"text": 42}))).unwrap_err();
        assert!(wrong_type.to_string().contains("expected string, got integer"));

        let extra = registry
            .validate(&call("echo", json!({"text": "a", "color": "red"})))
            .unwrap_err();
        assert!(matches!(extra, ToolError::InvalidParameter { ref parameter, .. } if parameter == "color"));

        let unknown = registry.validate(&call("nope", json!({}))).unwrap_err();
        assert!(matches!(unknown, ToolError::Unknown { .. }));
    }

    #[tokio::test]
    async fn validation_never_invokes_tool() {
        let tool = Arc::new(EchoTool::new());
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone()).unwrap();
        let _ = registry.validate(&call("echo", json!({"text": 1})));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);

        let args = registry.validate(&call("echo", json!({"text": "ok"}))).unwrap();
        let out = registry.lookup("echo").unwrap().invoke(args).await.unwrap();
        assert_eq!(out, "ok");
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }
}
