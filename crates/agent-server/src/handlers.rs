//! HTTP Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use agent_core::{Agent, AgentError, RunStatus, ToolSpec};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    pub model: String,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub input: String,

    /// Tighter loop bound for this run only
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: String,
    pub answer: String,
    pub status: RunStatus,
    pub passes: usize,
    pub limit_reached: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, err: &AgentError) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: err.code().into(),
        }),
    )
}

/// HTTP status for an error that escaped a run
pub fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AgentError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        AgentError::Config(_) | AgentError::Registration(_) => StatusCode::BAD_REQUEST,
        e if e.is_fatal_backend() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.config.backend.to_string(),
        model: state.config.model.clone(),
        tools: state.tools.len(),
    })
}

/// Tool catalog as the backend sees it
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSpec>> {
    Json(state.tools.catalog())
}

/// Run the agent loop on one request
pub async fn run_handler(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    if payload.input.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "input must not be empty".into(),
                code: "EMPTY_INPUT".into(),
            }),
        ));
    }

    let mut config = (*state.config).clone();
    if let Some(max) = payload.max_iterations {
        config.max_iterations = max.min(config.max_iterations);
        config
            .validate()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e))?;
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let mut agent = Agent::new(state.adapter.clone(), state.tools.clone(), config);

    let outcome = agent
        .run(&payload.input)
        .instrument(tracing::info_span!("run", %run_id))
        .await
        .map_err(|e| {
            tracing::error!(%run_id, error = %e, "Agent run failed");
            api_error(status_for(&e), &e)
        })?;

    if outcome.limit_reached {
        tracing::warn!(%run_id, passes = outcome.passes, "Run ended on the iteration limit");
    } else {
        tracing::info!(%run_id, passes = outcome.passes, "Run answered");
    }

    Ok(Json(RunResponse {
        run_id,
        status: outcome.status(),
        passes: outcome.passes,
        limit_reached: outcome.limit_reached,
        answer: outcome.text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agent_core::{
        AgentConfig, BackendRequest, BackendResponse, Message, NormalizedResponse,
        ProviderAdapter, ToolCall, ToolRegistry, ToolResult, builtin::register_builtins,
    };
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    /// Backend that always answers the same way
    enum Canned {
        Answer(&'static str),
        AlwaysTool,
        Unauthorized,
    }

    #[async_trait]
    impl ProviderAdapter for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn build_request(
            &self,
            _messages: &[Message],
            _tools: &[ToolSpec],
            _config: &AgentConfig,
        ) -> agent_core::Result<BackendRequest> {
            Ok(BackendRequest { body: Value::Null })
        }

        async fn send(&self, _request: BackendRequest) -> agent_core::Result<BackendResponse> {
            match self {
                Self::Answer(text) => Ok(BackendResponse { body: json!({ "text": text }) }),
                Self::AlwaysTool => Ok(BackendResponse { body: json!({ "tool": "datetime" }) }),
                Self::Unauthorized => Err(AgentError::Auth("bad key".into())),
            }
        }

        fn normalize(&self, response: BackendResponse) -> agent_core::Result<NormalizedResponse> {
            let tool_calls = response.body["tool"]
                .as_str()
                .map(|name| vec![ToolCall::new("call_1", name, serde_json::Map::new())])
                .unwrap_or_default();
            Ok(NormalizedResponse {
                text: response.body["text"].as_str().unwrap_or_default().into(),
                tool_calls,
                raw: response.body,
            })
        }

        fn fold_results(&self, results: &[ToolResult]) -> Vec<Message> {
            vec![Message::tool_results_native(Value::Null, results.to_vec())]
        }
    }

    fn state(adapter: Canned) -> AppState {
        let mut tools = ToolRegistry::new();
        register_builtins(&mut tools).unwrap();
        AppState {
            adapter: Arc::new(adapter),
            tools: Arc::new(tools),
            config: Arc::new(AgentConfig::for_model("gpt-4o")),
        }
    }

    async fn post_run(state: AppState, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/api/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = crate::router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn answered_run_returns_text() {
        let (status, body) = post_run(state(Canned::Answer("done")), json!({"input": "hi"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "done");
        assert_eq!(body["status"], "answered");
        assert_eq!(body["passes"], 1);
    }

    #[tokio::test]
    async fn iteration_limit_is_a_distinct_success_status() {
        let (status, body) = post_run(
            state(Canned::AlwaysTool),
            json!({"input": "what time is it", "max_iterations": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "iteration_limit");
        assert_eq!(body["limit_reached"], true);
        assert_eq!(body["passes"], 2);
        assert_eq!(body["answer"], "");
    }

    #[tokio::test]
    async fn backend_failure_maps_to_bad_gateway() {
        let (status, body) = post_run(state(Canned::Unauthorized), json!({"input": "hi"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "AUTH_FAILED");
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let (status, body) = post_run(state(Canned::Answer("x")), json!({"input": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_INPUT");
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&AgentError::Timeout("slow".into())),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&AgentError::RateLimited("wait".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&AgentError::Protocol("bad".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AgentError::Io(std::io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
