//! Reasoning Loop
//!
//! Drives the round-trip state machine:
//!
//! ```text
//! START → AWAITING_RESPONSE ─┬─ tool calls ──→ EXECUTING_TOOLS ─┐
//!            ↑               │                                  │
//!            └───────────────┼──────────────────────────────────┘
//!                            └─ text only ───→ DONE
//! ```
//!
//! Only the provider adapter can make a run fail. Tool problems are folded
//! back into the conversation, and hitting `max_iterations` is reported on
//! the [`RunOutcome`] rather than raised.

use std::sync::Arc;

use serde::Serialize;

use crate::config::AgentConfig;
use crate::dispatch::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::message::{Message, MessageLog};
use crate::provider::ProviderAdapter;
use crate::tool::{Tool, ToolRegistry};

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The backend produced a final answer
    Answered,
    /// `max_iterations` passes went by without a final answer
    IterationLimit,
}

/// Result of [`Agent::run`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Final answer; empty when the limit was hit first
    pub text: String,

    /// Backend round-trips performed
    pub passes: usize,

    /// Whether the loop stopped on `max_iterations`
    pub limit_reached: bool,
}

impl RunOutcome {
    pub const fn status(&self) -> RunStatus {
        if self.limit_reached {
            RunStatus::IterationLimit
        } else {
            RunStatus::Answered
        }
    }
}

/// Per-run bookkeeping, reset at the start of every run
#[derive(Debug, Default)]
struct RunState {
    iteration: usize,
    done: bool,
    final_text: String,
}

/// The main Agent struct
pub struct Agent {
    adapter: Arc<dyn ProviderAdapter>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
    log: MessageLog,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(tools, config.max_concurrent_tools)
            .with_timeout(config.tool_timeout);
        Self {
            adapter,
            dispatcher,
            config,
            log: MessageLog::new(),
        }
    }

    /// Run the agent on one user request
    pub async fn run(&mut self, user_input: &str) -> Result<RunOutcome> {
        self.log.reset(&self.config.system_prompt, user_input);
        let catalog = self.dispatcher.registry().catalog();
        let max = self.config.max_iterations;
        let mut state = RunState::default();

        while !state.done {
            state.iteration += 1;
            if state.iteration > max {
                tracing::warn!(max_iterations = max, "Maximum iterations reached");
                break;
            }
            tracing::debug!(
                adapter = self.adapter.name(),
                iteration = state.iteration,
                max_iterations = max,
                messages = self.log.snapshot().len(),
                "Requesting completion"
            );

            let request = self
                .adapter
                .build_request(self.log.snapshot(), &catalog, &self.config)?;
            let response = self.adapter.send(request).await?;
            let normalized = self.adapter.normalize(response)?;

            if normalized.has_tool_calls() {
                let calls = normalized.tool_calls.clone();
                self.log.append(normalized.into_message());

                tracing::debug!(count = calls.len(), "Executing tools");
                let results = self.dispatcher.dispatch(&calls).await;
                for message in self.adapter.fold_results(&results) {
                    self.log.append(message);
                }
            } else {
                state.final_text.clone_from(&normalized.text);
                self.log.append(normalized.into_message());
                state.done = true;
            }
        }

        Ok(RunOutcome {
            passes: state.iteration.min(max),
            limit_reached: !state.done,
            text: state.final_text,
        })
    }

    /// Conversation of the most recent run
    pub fn messages(&self) -> &[Message] {
        self.log.snapshot()
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

struct PendingTool {
    name: String,
    callable: Arc<dyn Tool>,
    description: String,
    parameters: serde_json::Value,
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    adapter: Option<Arc<dyn ProviderAdapter>>,
    registry: Option<Arc<ToolRegistry>>,
    pending: Vec<PendingTool>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            adapter: None,
            registry: None,
            pending: Vec::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an already built, shared registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(
        mut self,
        name: impl Into<String>,
        callable: T,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        self.pending.push(PendingTool {
            name: name.into(),
            callable: Arc::new(callable),
            description: description.into(),
            parameters,
        });
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let adapter = self
            .adapter
            .ok_or_else(|| AgentError::Config("Provider adapter is required".into()))?;
        self.config.validate()?;

        let registry = if self.pending.is_empty() {
            self.registry.unwrap_or_default()
        } else {
            let mut registry = match self.registry {
                Some(shared) => Arc::try_unwrap(shared).map_err(|_| {
                    AgentError::Config("cannot add tools to a registry that is still shared".into())
                })?,
                None => ToolRegistry::new(),
            };
            for tool in self.pending {
                registry.register_arc(tool.name, tool.callable, tool.description, tool.parameters)?;
            }
            Arc::new(registry)
        };

        Ok(Agent::new(adapter, registry, self.config))
    }
}
