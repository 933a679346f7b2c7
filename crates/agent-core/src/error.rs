//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Tool failures never surface here; the dispatcher captures them per call.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Backend returned a non-success status not covered below
    #[error("Provider error: {0}")]
    Provider(String),

    /// Backend could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Backend rejected the request shape, or answered with something unparseable
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Backend call exceeded its wall-clock bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid tool registration
    #[error("Tool registration error: {0}")]
    Registration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Whether the error came from the backend round-trip (and therefore aborted a run)
    pub const fn is_fatal_backend(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::Network(_)
                | Self::Auth(_)
                | Self::RateLimited(_)
                | Self::Protocol(_)
                | Self::Timeout(_)
        )
    }

    /// Short machine-readable code for callers
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Auth(_) => "AUTH_FAILED",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Registration(_) => "REGISTRATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::Network(_) => "The AI service is currently unreachable. Please try again.".into(),
            Self::Auth(_) => "Authentication with the AI service failed. Check the API key.".into(),
            Self::RateLimited(_) => "Too many requests to the AI service. Please wait a moment.".into(),
            Self::Protocol(msg) => format!("The AI service rejected or garbled the exchange: {msg}"),
            Self::Timeout(_) => "The AI service took too long to respond.".into(),
            Self::Registration(msg) | Self::Config(msg) => format!("Agent misconfigured: {msg}"),
            Self::Io(_) => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failures_are_fatal_but_config_is_not() {
        assert!(AgentError::Auth("bad key".into()).is_fatal_backend());
        assert!(AgentError::Protocol("no choices".into()).is_fatal_backend());
        assert!(!AgentError::Config("missing model".into()).is_fatal_backend());
        assert!(!AgentError::Io(std::io::Error::other("disk")).is_fatal_backend());
        assert_eq!(AgentError::Timeout("slow".into()).code(), "TIMEOUT");
    }
}
