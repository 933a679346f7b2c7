//! Tool Dispatcher
//!
//! Runs one round's tool requests concurrently and returns exactly one result
//! per request, in request order. Each invocation is its own tokio task, so a
//! failure, panic or timeout in one call is turned into an error result for
//! that call alone.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};

use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Fan-out/fan-in executor over a shared registry
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    max_concurrency: usize,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, max_concurrency: usize) -> Self {
        Self {
            registry,
            max_concurrency: max_concurrency.max(1),
            timeout: None,
        }
    }

    /// Bound every invocation by a wall-clock timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a batch; resolves only once every request has a result
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        tracing::debug!(
            count = calls.len(),
            max_concurrency = self.max_concurrency,
            "Dispatching tool calls"
        );

        // `buffered` keeps at most `max_concurrency` calls in flight and yields
        // results in input order.
        let invocations: Vec<_> = calls.iter().map(|call| self.invoke(call)).collect();
        let results: Vec<ToolResult> = stream::iter(invocations)
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_error()).count();
        tracing::debug!(count = results.len(), failed, "Tool batch finished");
        results
    }

    async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let Some(binding) = self.registry.lookup(&call.name) else {
            tracing::warn!(tool = %call.name, id = %call.id, "Unknown tool requested");
            return ToolResult::failure(call, format!("Unknown tool: {}", call.name));
        };

        if let Some(detail) = &call.argument_error {
            tracing::warn!(tool = %call.name, id = %call.id, %detail, "Undecodable tool arguments");
            return ToolResult::failure(
                call,
                format!("Invalid arguments for {}: {detail}", call.name),
            );
        }

        let callable = Arc::clone(&binding.callable);
        let arguments = call.arguments.clone();
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, callable.call(arguments))
                    .await
                    .map_err(|_| limit),
                None => Ok(callable.call(arguments).await),
            }
        });
        let _abort = AbortOnDrop(handle.abort_handle());

        let result = match handle.await {
            Ok(Ok(Ok(output))) => ToolResult::success(call, output),
            Ok(Ok(Err(e))) => ToolResult::failure(call, e.to_string()),
            Ok(Err(limit)) => ToolResult::failure(
                call,
                format!("Tool '{}' timed out after {}ms", call.name, limit.as_millis()),
            ),
            Err(join_error) => ToolResult::failure(
                call,
                format!("Tool '{}' panicked: {}", call.name, panic_message(join_error)),
            ),
        };

        if let Some(error) = result.error() {
            tracing::warn!(tool = %call.name, id = %call.id, %error, "Tool call failed");
        } else {
            tracing::debug!(tool = %call.name, id = %call.id, "Tool call succeeded");
        }
        result
    }
}

/// Aborts the spawned invocation if the dispatching future is dropped first
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".into();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                "double",
                |args: Map<String, Value>| async move {
                    let n = args
                        .get("n")
                        .and_then(Value::as_i64)
                        .ok_or_else(|| anyhow::anyhow!("n must be an integer"))?;
                    Ok::<_, anyhow::Error>(json!(n * 2))
                },
                "Double a number",
                json!({"type": "object", "properties": {"n": {"type": "integer"}}}),
            )
            .unwrap();
        registry
            .register_fn(
                "fail",
                |_| async { Err::<Value, _>(anyhow::anyhow!("database offline")) },
                "Always fails",
                json!({}),
            )
            .unwrap();
        registry
            .register_fn(
                "slow",
                |_| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, anyhow::Error>(json!("late"))
                },
                "Sleeps",
                json!({}),
            )
            .unwrap();
        registry
            .register_fn("explode", explode, "Panics", json!({}))
            .unwrap();
        registry
    }

    async fn explode(_: Map<String, Value>) -> anyhow::Result<Value> {
        panic!("kaboom")
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall::from_value(id, name, args)
    }

    #[tokio::test]
    async fn results_match_requests_in_order() {
        let dispatcher = ToolDispatcher::new(Arc::new(registry()), 2);
        let calls: Vec<ToolCall> = (0..5)
            .map(|i| call(&format!("c{i}"), "double", json!({"n": i})))
            .collect();

        let results = dispatcher.dispatch(&calls).await;

        assert_eq!(results.len(), calls.len());
        for (i, (call, result)) in calls.iter().zip(&results).enumerate() {
            assert_eq!(result.call_id, call.id);
            assert_eq!(result.output(), Some(&json!(i64::try_from(i).unwrap() * 2)));
        }
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result() {
        let dispatcher = ToolDispatcher::new(Arc::new(registry()), 4);
        let results = dispatcher.dispatch(&[call("c1", "foo", json!({}))]).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error(), Some("Unknown tool: foo"));
        assert!(results[0].output().is_none());
    }

    #[tokio::test]
    async fn failing_tool_does_not_affect_siblings() {
        let dispatcher = ToolDispatcher::new(Arc::new(registry()), 4);
        let results = dispatcher
            .dispatch(&[
                call("a", "fail", json!({})),
                call("b", "double", json!({"n": 21})),
                call("c", "explode", json!({})),
                call("d", "double", json!({"n": "x"})),
            ])
            .await;

        assert_eq!(results[0].error(), Some("database offline"));
        assert!(results[0].output().is_none());
        assert_eq!(results[1].output(), Some(&json!(42)));
        assert!(results[2].error().unwrap().contains("panicked: kaboom"));
        assert_eq!(results[3].error(), Some("n must be an integer"));
    }

    #[tokio::test]
    async fn timeout_becomes_per_call_error() {
        let dispatcher = ToolDispatcher::new(Arc::new(registry()), 4)
            .with_timeout(Some(Duration::from_millis(20)));
        let results = dispatcher
            .dispatch(&[call("s", "slow", json!({})), call("d", "double", json!({"n": 1}))])
            .await;

        assert_eq!(results[0].error(), Some("Tool 'slow' timed out after 20ms"));
        assert_eq!(results[1].output(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported_per_call() {
        let dispatcher = ToolDispatcher::new(Arc::new(registry()), 4);
        let bad = ToolCall::from_json_str("c1", "double", "{oops");
        let results = dispatcher.dispatch(&[bad]).await;

        assert!(results[0].error().unwrap().starts_with("Invalid arguments for double"));
    }

    #[tokio::test]
    async fn dropping_a_dispatch_aborts_its_tool_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        {
            let finished = Arc::clone(&finished);
            registry
                .register_fn(
                    "lingering",
                    move |_| {
                        let finished = Arc::clone(&finished);
                        async move {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            finished.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, anyhow::Error>(Value::Null)
                        }
                    },
                    "Sleeps, then records completion",
                    json!({}),
                )
                .unwrap();
        }

        let dispatcher = ToolDispatcher::new(Arc::new(registry), 4);
        let calls = [
            call("a", "lingering", json!({})),
            call("b", "lingering", json!({})),
        ];
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), dispatcher.dispatch(&calls)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            registry
                .register_fn(
                    "track",
                    move |_| {
                        let in_flight = Arc::clone(&in_flight);
                        let peak = Arc::clone(&peak);
                        async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, anyhow::Error>(Value::Null)
                        }
                    },
                    "Tracks concurrency",
                    json!({}),
                )
                .unwrap();
        }

        let dispatcher = ToolDispatcher::new(Arc::new(registry), 3);
        let calls: Vec<ToolCall> = (0..10)
            .map(|i| call(&format!("c{i}"), "track", json!({})))
            .collect();
        let results = dispatcher.dispatch(&calls).await;

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }
}
