//! Anthropic Messages Adapter
//!
//! Uses Anthropic's Messages API directly.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Tool calls are `tool_use` content blocks interleaved with text
//! - All results of a round go back in one user turn of `tool_result` blocks

use std::time::Duration;

use agent_core::{
    config::AgentConfig,
    error::{AgentError, Result},
    message::{Content, Message, Role},
    provider::{
        BackendRequest, BackendResponse, NormalizedResponse, ProviderAdapter, generated_call_id,
    },
    tool::{ToolCall, ToolOutcome, ToolResult, ToolSpec},
};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic adapter configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `ANTHROPIC_API_KEY` and optional `ANTHROPIC_BASE_URL`
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let mut config = Self::new(http::env_key("ANTHROPIC_API_KEY")?);
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = base_url;
        }
        config.timeout = timeout;
        Ok(config)
    }
}

/// Anthropic native Messages API adapter.
pub struct AnthropicAdapter {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    pub fn new(mut config: AnthropicConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client: http::build_client(config.timeout)?,
            config,
        })
    }

    /// Split system text out of the conversation; Anthropic wants it top-level.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut rest = Vec::new();

        for msg in messages {
            match (&msg.role, &msg.content) {
                (Role::System, Content::Text(text)) => system_parts.push(text),
                (_, Content::Native(raw)) => rest.push(raw.clone()),
                (Role::Assistant, Content::Text(text)) => {
                    rest.push(json!({ "role": "assistant", "content": text }));
                }
                (Role::User | Role::ToolResult, Content::Text(text)) => {
                    rest.push(json!({ "role": "user", "content": text }));
                }
            }
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, rest)
    }

    fn encode_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        config: &AgentConfig,
    ) -> Result<BackendRequest> {
        let (system, messages) = Self::extract_system(messages);

        let mut body = json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });

        if let Some(system) = system {
            body["system"] = json!(system);
        }

        if !tools.is_empty() {
            body["tools"] = json!(Self::encode_tools(tools));
        }

        Ok(BackendRequest { body })
    }

    async fn send(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = format!("{}/v1/messages", self.config.base_url);
        tracing::debug!(provider = "anthropic", model = %request.body["model"], "Sending completion request");

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request.body);
        let body = http::send_json(builder, "anthropic").await?;
        Ok(BackendResponse { body })
    }

    fn normalize(&self, response: BackendResponse) -> Result<NormalizedResponse> {
        let mut blocks = response
            .body
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| AgentError::Protocol("Anthropic response has no content blocks".into()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in &mut blocks {
            match block["type"].as_str() {
                Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                Some("tool_use") => {
                    // generated ids are written back so the tool_result can refer to them
                    let id = match block["id"].as_str() {
                        Some(id) => id.to_string(),
                        None => {
                            let id = generated_call_id();
                            block["id"] = json!(id);
                            id
                        }
                    };
                    let name = block["name"].as_str().unwrap_or_default();
                    tool_calls.push(ToolCall::from_value(id, name, block["input"].clone()));
                }
                // thinking and other block types are replayed but not interpreted
                _ => {}
            }
        }

        Ok(NormalizedResponse {
            text,
            tool_calls,
            raw: json!({ "role": "assistant", "content": blocks }),
        })
    }

    fn fold_results(&self, results: &[ToolResult]) -> Vec<Message> {
        if results.is_empty() {
            return Vec::new();
        }

        let blocks: Vec<Value> = results
            .iter()
            .map(|result| {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": result.call_id,
                });
                match &result.outcome {
                    ToolOutcome::Output(output) => {
                        block["content"] = json!(output.to_string());
                    }
                    ToolOutcome::Error(error) => {
                        block["content"] = json!(json!({ "error": error }).to_string());
                        block["is_error"] = json!(true);
                    }
                }
                block
            })
            .collect();

        let raw = json!({ "role": "user", "content": blocks });
        vec![Message::tool_results_native(raw, results.to_vec())]
    }
}
