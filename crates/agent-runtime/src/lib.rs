//! # agent-runtime
//!
//! Provider adapters for the agent loop.
//!
//! ## Providers
//!
//! - **OpenAI**: chat completions with function tools
//! - **Anthropic**: messages API with `tool_use` / `tool_result` blocks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::adapter_for;
//!
//! let config = AgentConfig::from_env()?;
//! let agent = AgentBuilder::new()
//!     .adapter(adapter_for(&config)?)
//!     .config(config)
//!     .build()?;
//! ```

use std::sync::Arc;

use agent_core::{AgentConfig, AgentError, Backend, ProviderAdapter, Result};

mod http;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicAdapter, AnthropicConfig};
#[cfg(feature = "openai")]
pub use openai::{OpenAiAdapter, OpenAiConfig};

// Re-export core types for convenience
pub use agent_core::{Agent, AgentBuilder, Message, Role, RunOutcome, Tool, ToolRegistry};

/// Pick the adapter for the configured backend family, reading credentials from the environment
pub fn adapter_for(config: &AgentConfig) -> Result<Arc<dyn ProviderAdapter>> {
    match config.backend {
        #[cfg(feature = "openai")]
        Backend::OpenAi => {
            let adapter = OpenAiAdapter::new(OpenAiConfig::from_env(config.request_timeout)?)?;
            Ok(Arc::new(adapter))
        }
        #[cfg(feature = "anthropic")]
        Backend::Anthropic => {
            let adapter =
                AnthropicAdapter::new(AnthropicConfig::from_env(config.request_timeout)?)?;
            Ok(Arc::new(adapter))
        }
        #[allow(unreachable_patterns)]
        other => Err(AgentError::Config(format!(
            "backend '{other}' is not compiled into this build"
        ))),
    }
}
