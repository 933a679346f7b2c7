//! OpenAI Chat Completions Adapter
//!
//! - Bearer authentication
//! - System prompt stays in the message list
//! - Tool calls arrive in `choices[0].message.tool_calls`, arguments JSON-encoded
//! - One `role: "tool"` message per result, correlated by `tool_call_id`

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Reasoning model families; they take `max_completion_tokens` and reject `temperature`
const REASONING_PREFIXES: [&str; 3] = ["o1", "o3", "o4"];

fn is_reasoning_model(model: &str) -> bool {
    REASONING_PREFIXES.iter().any(|p| model.starts_with(p))
}

/// OpenAI adapter configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,

    /// Base URL without the `/v1/...` path
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let mut config = Self::new(http::env_key("OPENAI_API_KEY")?);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        config.timeout = timeout;
        Ok(config)
    }
}

/// OpenAI chat completions adapter
pub struct OpenAiAdapter {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiAdapter {
    pub fn new(mut config: OpenAiConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client: http::build_client(config.timeout)?,
            config,
        })
    }

    fn encode_message(message: &Message) -> Value {
        match &message.content {
            Content::Native(raw) => raw.clone(),
            Content::Text(text) => {
                let role = match message.role {
                    Role::System => "system",
                    Role::Assistant => "assistant",
                    // A plain-text tool-result turn has no call id to attach to
                    Role::User | Role::ToolResult => "user",
                };
                json!({ "role": role, "content": text })
            }
        }
    }

    fn encode_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    /// Give every tool call an id, writing generated ones back into the replayed turn
    fn decode_tool_call(raw: &mut Value) -> ToolCall {
        let id = match raw["id"].as_str() {
            Some(id) => id.to_string(),
            None => {
                let id = generated_call_id();
                raw["id"] = json!(id);
                id
            }
        };
        let name = raw["function"]["name"].as_str().unwrap_or_default();
        match &raw["function"]["arguments"] {
            Value::String(encoded) => ToolCall::from_json_str(id, name, encoded),
            other => ToolCall::from_value(id, name, other.clone()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        config: &AgentConfig,
    ) -> Result<BackendRequest> {
        let messages: Vec<Value> = messages.iter().map(Self::encode_message).collect();

        let mut body = json!({
            "model": config.model,
            "messages": messages,
        });

        if is_reasoning_model(&config.model) {
            body["max_completion_tokens"] = json!(config.max_tokens);
        } else {
            body["temperature"] = json!(config.temperature);
            body["max_tokens"] = json!(config.max_tokens);
        }

        if !tools.is_empty() {
            body["tools"] = json!(Self::encode_tools(tools));
            body["tool_choice"] = json!("auto");
        }

        Ok(BackendRequest { body })
    }

    async fn send(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        tracing::debug!(provider = "openai", model = %request.body["model"], "Sending completion request");

        let builder = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request.body);
        let body = http::send_json(builder, "openai").await?;
        Ok(BackendResponse { body })
    }

    fn normalize(&self, response: BackendResponse) -> Result<NormalizedResponse> {
        let mut message = response
            .body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .filter(|m| m.is_object())
            .cloned()
            .ok_or_else(|| AgentError::Protocol("OpenAI response has no choices[0].message".into()))?;

        let text = message["content"].as_str().unwrap_or_default().to_string();
        let tool_calls = message
            .get_mut("tool_calls")
            .and_then(Value::as_array_mut)
            .map(|calls| calls.iter_mut().map(Self::decode_tool_call).collect())
            .unwrap_or_default();

        Ok(NormalizedResponse {
            text,
            tool_calls,
            raw: message,
        })
    }

    fn fold_results(&self, results: &[ToolResult]) -> Vec<Message> {
        results
            .iter()
            .map(|result| {
                let content = match &result.outcome {
                    ToolOutcome::Output(output) => output.to_string(),
                    ToolOutcome::Error(error) => format!("Error: {error}"),
                };
                let raw = json!({
                    "role": "tool",
                    "tool_call_id": result.call_id,
                    "content": content,
                });
                Message::tool_results_native(raw, vec![result.clone()])
            })
            .collect()
    }
}
