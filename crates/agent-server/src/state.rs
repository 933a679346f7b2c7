//! Application State

use std::sync::Arc;

use agent_core::{AgentConfig, ProviderAdapter, ToolRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Adapter for the configured backend family
    pub adapter: Arc<dyn ProviderAdapter>,

    /// Tool registry, read-only once the server starts
    pub tools: Arc<ToolRegistry>,

    /// Base configuration every run starts from
    pub config: Arc<AgentConfig>,
}
