//! Agent Configuration
//!
//! One immutable record per agent instance: which backend family, which model,
//! sampling parameters and the loop bounds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Backend family the agent talks to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages
    Anthropic,
}

impl Backend {
    /// Guess the backend family from a model identifier
    pub fn infer_from_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if ["gpt", "o1", "o3", "o4"].iter().any(|p| model.starts_with(p)) {
            Self::OpenAi
        } else {
            Self::Anthropic
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(AgentError::Config(format!("Unsupported backend: {other}"))),
        }
    }
}

/// Agent configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Backend family
    pub backend: Backend,

    /// Model identifier (e.g., "gpt-4o", "claude-3-sonnet-20240229")
    pub model: String,

    /// Temperature for sampling
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on loop passes per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Fixed instruction preamble seeded as the system message
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Tool invocations allowed in flight at once within a round
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: usize,

    /// Wall-clock bound per tool invocation
    #[serde(default, with = "optional_secs")]
    pub tool_timeout: Option<Duration>,

    /// Wall-clock bound per backend request
    #[serde(default = "default_request_timeout", with = "secs")]
    pub request_timeout: Duration,
}

const fn default_temperature() -> f32 { 0.7 }
const fn default_max_tokens() -> u32 { 4000 }
const fn default_max_iterations() -> usize { 10 }
const fn default_max_concurrent_tools() -> usize { 8 }
const fn default_request_timeout() -> Duration { Duration::from_secs(120) }

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
Call tools when they help you answer accurately, read their results carefully, \
and reply with a concise final answer once you have what you need.";

impl Default for AgentConfig {
    fn default() -> Self {
        Self::for_model("gpt-4o")
    }
}

impl AgentConfig {
    /// Defaults for a model, with the backend inferred from its name
    pub fn for_model(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            backend: Backend::infer_from_model(&model),
            model,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            system_prompt: default_system_prompt(),
            max_concurrent_tools: default_max_concurrent_tools(),
            tool_timeout: None,
            request_timeout: default_request_timeout(),
        }
    }

    /// Build from `AGENT_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let model = std::env::var("AGENT_MODEL").unwrap_or_else(|_| "gpt-4o".into());
        let mut config = Self::for_model(model);

        if let Ok(backend) = std::env::var("AGENT_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(v) = env_parse("AGENT_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(v) = env_parse("AGENT_MAX_TOKENS")? {
            config.max_tokens = v;
        }
        if let Some(v) = env_parse("AGENT_MAX_ITERATIONS")? {
            config.max_iterations = v;
        }
        if let Some(v) = env_parse("AGENT_MAX_CONCURRENT_TOOLS")? {
            config.max_concurrent_tools = v;
        }
        if let Some(secs) = env_parse::<u64>("AGENT_TOOL_TIMEOUT_SECS")? {
            config.tool_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("AGENT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(path) = std::env::var("AGENT_SYSTEM_PROMPT_FILE") {
            config.system_prompt = std::fs::read_to_string(path)?.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentError::Config("model must not be empty".into()));
        }
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }
        if self.max_concurrent_tools == 0 {
            return Err(AgentError::Config("max_concurrent_tools must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AgentError::Config(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|o| o.map(Duration::from_secs))
    }
}
