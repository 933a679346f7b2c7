//! Tool System
//!
//! Tools are registered once when the agent is built and looked up by name
//! whenever the backend asks for one. The registry is read-only afterwards and
//! is shared by every concurrently dispatched invocation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// Tool invocation request parsed from a backend response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned correlation id
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Set when the backend sent arguments that are not a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_error: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            argument_error: None,
        }
    }

    /// Build a call from a JSON value that should be an object
    pub fn from_value(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let mut call = Self::new(id, name, Map::new());
        match arguments {
            Value::Object(map) => call.arguments = map,
            Value::Null => {}
            other => {
                call.argument_error = Some(format!("expected a JSON object, got {other}"));
            }
        }
        call
    }

    /// Build a call from JSON-encoded argument text
    pub fn from_json_str(id: impl Into<String>, name: impl Into<String>, arguments: &str) -> Self {
        if arguments.trim().is_empty() {
            return Self::new(id, name, Map::new());
        }
        match serde_json::from_str::<Value>(arguments) {
            Ok(value) => Self::from_value(id, name, value),
            Err(e) => {
                let mut call = Self::new(id, name, Map::new());
                call.argument_error = Some(e.to_string());
                call
            }
        }
    }
}

/// Output value or error description, never both
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Output(Value),
    Error(String),
}

/// Result of one tool invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the originating request
    pub call_id: String,

    /// Tool that was asked for
    pub name: String,

    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: Value) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Output(output),
        }
    }

    pub fn failure(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Error(error.into()),
        }
    }

    pub const fn output(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Output(v) => Some(v),
            ToolOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Output(_) => None,
            ToolOutcome::Error(e) => Some(e),
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }
}

/// Backend-neutral tool description handed to provider adapters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the LLM)
    pub description: String,

    /// JSON Schema for the arguments object
    pub parameters: Value,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool with named arguments
    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`Tool`]
pub struct FnTool<F>(F);

impl<F> FnTool<F> {
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<Value> {
        (self.0)(arguments).await
    }
}

/// A registered tool: its description plus the callable behind it
#[derive(Clone)]
pub struct ToolBinding {
    pub spec: ToolSpec,
    pub callable: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBinding")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolBinding>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under `name`; a later registration with the same name wins
    pub fn register<T: Tool + 'static>(
        &mut self,
        name: impl Into<String>,
        callable: T,
        description: impl Into<String>,
        parameters: Value,
    ) -> Result<()> {
        self.register_arc(name, Arc::new(callable), description, parameters)
    }

    /// Register an already shared callable
    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        callable: Arc<dyn Tool>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AgentError::Registration("tool name must not be empty".into()));
        }

        let spec = ToolSpec {
            name: name.clone(),
            description: description.into(),
            parameters,
        };
        if self.tools.insert(name.clone(), ToolBinding { spec, callable }).is_some() {
            tracing::debug!(tool = %name, "Tool re-registered, previous binding replaced");
        }
        Ok(())
    }

    /// Register an async closure
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        f: F,
        description: impl Into<String>,
        parameters: Value,
    ) -> Result<()>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, FnTool::new(f), description, parameters)
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Option<&ToolBinding> {
        self.tools.get(name)
    }

    /// Tool descriptions, sorted by name so outbound requests are stable
    pub fn catalog(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|b| b.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Arguments helper for tools reading a required string
pub fn require_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> anyhow::Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}
