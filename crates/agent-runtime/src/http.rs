//! Shared HTTP plumbing for the provider adapters
//!
//! Maps transport failures and non-success statuses onto `AgentError` so every
//! adapter reports fatal backend errors the same way.

use std::time::Duration;

use agent_core::error::{AgentError, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Send a prepared request and decode the JSON body of a success response
pub(crate) async fn send_json(builder: RequestBuilder, provider: &str) -> Result<Value> {
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status().as_u16();

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider, status, body = %body, "Backend rejected request");
        return Err(status_error(provider, status, &body));
    }

    response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            AgentError::Timeout(e.to_string())
        } else {
            AgentError::Protocol(format!("Failed to parse {provider} response: {e}"))
        }
    })
}

pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> AgentError {
    match status {
        401 | 403 => AgentError::Auth(format!("{provider} rejected the credentials: {body}")),
        429 => AgentError::RateLimited(format!("{provider} rate limit: {body}")),
        400 | 404 | 413 | 422 => {
            AgentError::Protocol(format!("{provider} rejected the request ({status}): {body}"))
        }
        _ => AgentError::Provider(format!("{provider} returned {status}: {body}")),
    }
}

fn transport_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(err.to_string())
    } else {
        AgentError::Network(err.to_string())
    }
}

/// Read an API key from the environment, treating blank values as missing
pub(crate) fn env_key(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AgentError::Config(format!("{name} is not set")))
}
