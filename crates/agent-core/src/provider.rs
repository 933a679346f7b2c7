//! LLM Provider Adapter
//!
//! Each backend family places system instructions, tool metadata and tool
//! results in different parts of its wire schema. An adapter owns that
//! translation in both directions so the agent loop only ever sees
//! [`NormalizedResponse`] values and generic [`Message`]s.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::ProviderAdapter;
//!
//! let request = adapter.build_request(log.snapshot(), &registry.catalog(), &config)?;
//! let response = adapter.send(request).await?;
//! let normalized = adapter.normalize(response)?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AgentConfig;
use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolResult, ToolSpec};

/// Outbound request in the backend's native JSON shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub body: Value,
}

/// Inbound response in the backend's native JSON shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub body: Value,
}

/// Backend-neutral view of one response
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedResponse {
    /// Text payload, empty when the backend sent none
    pub text: String,

    /// Requested tool invocations, in backend order
    pub tool_calls: Vec<ToolCall>,

    /// The assistant turn as the backend must see it on the next round
    pub raw: Value,
}

impl NormalizedResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Assistant message carrying `raw` verbatim
    pub fn into_message(self) -> Message {
        Message::assistant_native(self.raw, self.tool_calls)
    }
}

/// Capability interface for one backend family
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Serialize the whole conversation plus the tool catalog
    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        config: &AgentConfig,
    ) -> Result<BackendRequest>;

    /// Perform the round-trip; every failure here aborts the run
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse>;

    /// Extract text and tool requests from a response
    fn normalize(&self, response: BackendResponse) -> Result<NormalizedResponse>;

    /// Encode a batch of results as the tool-result turn(s) this backend expects
    fn fold_results(&self, results: &[ToolResult]) -> Vec<Message>;
}

/// Fresh id for a tool call the backend did not label
pub fn generated_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}
