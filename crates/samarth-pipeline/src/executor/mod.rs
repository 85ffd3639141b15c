mod request_tracker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use uuid::Uuid;

pub use request_tracker::{Outcome, RequestTracker};

use crate::error::PipelineError;
use crate::event_bus::{Event, EventBus, Metadata, StageFailure, SubscriptionId, Topic};
use crate::pipeline::Pipeline;

/// Query Executor
///
/// Turns one logical request into an entry event on the pipeline and awaits
/// the terminal event (success or `pipeline.error`) that carries the same
/// correlation id.
///
/// ```text
/// query.received → parse → query.parsed
///                             ↓
///                          load → data.loaded
///                                    ↓
///                                analysis → analysis.complete
///                                              ↓
///                                           format → response.ready
/// ```
#[derive(Debug)]
pub struct QueryExecutor {
    bus: Arc<EventBus>,
    pipeline: Pipeline,
    tracker: Arc<RequestTracker>,
    timeout: Duration,
    subscriptions: Vec<SubscriptionId>,
}

impl QueryExecutor {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Subscribe the routing handlers on the terminal and error topics.
    pub fn new(bus: Arc<EventBus>, pipeline: Pipeline) -> Self {
        let tracker = Arc::new(RequestTracker::new());

        let on_result = {
            let tracker = tracker.clone();
            bus.subscribe_labeled(pipeline.terminal_topic(), "executor.result", move |event: &Event| {
                route(&tracker, event, Ok(event.payload.clone()));
                Ok(())
            })
        };
        let on_error = {
            let tracker = tracker.clone();
            bus.subscribe_labeled(Topic::PIPELINE_ERROR, "executor.error", move |event: &Event| {
                route(&tracker, event, Err(stage_error(event)));
                Ok(())
            })
        };

        tracing::info!(
            entry = %pipeline.entry_topic(),
            terminal = %pipeline.terminal_topic(),
            "query executor initialized"
        );

        Self {
            bus,
            pipeline,
            tracker,
            timeout: Self::DEFAULT_TIMEOUT,
            subscriptions: vec![on_result, on_error],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Execute one request with `{"source": "api"}` metadata.
    pub async fn execute(&self, payload: Value) -> Outcome {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("api"));
        self.execute_with_metadata(payload, metadata).await
    }

    /// Execute one request through the pipeline and wait for its outcome.
    ///
    /// A `correlation_id` entry in `metadata` is overwritten with a fresh id.
    pub async fn execute_with_metadata(&self, payload: Value, mut metadata: Metadata) -> Outcome {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();
        let mut rx = self.tracker.track_request(correlation_id, self.timeout)?;
        let _guard = PendingGuard {
            tracker: &self.tracker,
            correlation_id,
        };

        metadata.insert(
            Event::CORRELATION_ID.to_string(),
            Value::String(correlation_id.to_string()),
        );

        tracing::info!(
            correlation_id = %correlation_id,
            entry = %self.pipeline.entry_topic(),
            "executing request"
        );

        // Dispatch runs the whole chain synchronously; keep it off this task
        // so the deadline below is observed even while a stage is busy
        let bus = self.bus.clone();
        let entry = self.pipeline.entry_topic().to_string();
        let _dispatch = tokio::task::spawn_blocking(move || bus.publish(entry, payload, metadata));

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(outcome)) => {
                match &outcome {
                    Ok(_) => tracing::info!(correlation_id = %correlation_id, "request completed"),
                    Err(err) => tracing::warn!(correlation_id = %correlation_id, error = %err, "request failed"),
                }
                outcome
            }
            Ok(Err(_)) => Err(PipelineError::Abandoned(correlation_id)),
            Err(_) => {
                if !self.tracker.cancel_request(correlation_id) {
                    // Resolved between the deadline firing and the cancel
                    if let Ok(outcome) = rx.try_recv() {
                        return outcome;
                    }
                }
                let elapsed = started.elapsed();
                tracing::error!(
                    correlation_id = %correlation_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "request timed out"
                );
                Err(PipelineError::Timeout {
                    correlation_id,
                    elapsed,
                })
            }
        }
    }
}

impl Drop for QueryExecutor {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

/// Removes the pending entry if the awaiting future is dropped early.
struct PendingGuard<'a> {
    tracker: &'a RequestTracker,
    correlation_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.tracker.cancel_request(self.correlation_id);
    }
}

fn route(tracker: &RequestTracker, event: &Event, outcome: Outcome) {
    let correlation_id = event.correlation_id();
    let routed = correlation_id.is_some_and(|id| tracker.complete_request(id, outcome));
    if !routed {
        let err = PipelineError::Unroutable {
            topic: event.topic.clone(),
            correlation_id,
        };
        tracing::warn!(cursor = event.cursor, error = %err, "dropping terminal event");
    }
}

fn stage_error(event: &Event) -> PipelineError {
    match serde_json::from_value::<StageFailure>(event.payload.clone()) {
        Ok(failure) => PipelineError::StageProcessing {
            stage: failure.stage_name,
            kind: failure.error_kind,
            message: failure.error_message,
        },
        Err(err) => PipelineError::MalformedEvent(format!(
            "'{}' payload is not a stage failure: {err}",
            event.topic
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::event_bus::metadata_with_correlation;
    use crate::pipeline::StageSpec;

    fn echo_executor() -> QueryExecutor {
        let bus = Arc::new(EventBus::new());
        let pipeline = Pipeline::wire(
            &bus,
            vec![StageSpec::new(
                "echo",
                "echo.in",
                "echo.out",
                |payload: &Value, _: &Metadata| -> Result<Value, StageError> { Ok(payload.clone()) },
            )],
        )
        .unwrap();
        QueryExecutor::new(bus, pipeline)
    }

    #[tokio::test]
    async fn test_execute_resolves_terminal_payload() {
        let executor = echo_executor();

        let result = executor.execute(json!({"question": "hi"})).await.unwrap();

        assert_eq!(result, json!({"question": "hi"}));
        assert_eq!(executor.tracker().pending_count(), 0);
        let history = executor.bus().history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].metadata["source"], "api");
        assert_eq!(history[0].correlation_id(), history[1].correlation_id());
    }

    #[tokio::test]
    async fn test_terminal_event_without_pending_request_is_dropped() {
        let executor = echo_executor();

        // Neither publish has anyone waiting; both must be harmless
        executor
            .bus()
            .publish("echo.out", json!(1), metadata_with_correlation(Uuid::new_v4()));
        executor.bus().publish("echo.out", json!(2), Metadata::new());

        assert_eq!(executor.tracker().pending_count(), 0);
    }

    #[test]
    fn test_stage_error_decoding() {
        let failure = StageFailure {
            stage_name: "analysis".into(),
            error_kind: "no_data".into(),
            error_message: "empty".into(),
        };
        let event = Event::new(
            Topic::PIPELINE_ERROR,
            serde_json::to_value(failure).unwrap(),
            Metadata::new(),
        );
        assert_eq!(event_stage(&event), Some("analysis".to_string()));

        let garbage = Event::new(Topic::PIPELINE_ERROR, json!("oops"), Metadata::new());
        assert!(matches!(stage_error(&garbage), PipelineError::MalformedEvent(_)));
    }

    fn event_stage(event: &Event) -> Option<String> {
        stage_error(event).stage().map(str::to_string)
    }

    #[test]
    fn test_dropping_executor_unsubscribes_routes() {
        let executor = echo_executor();
        let bus = executor.bus().clone();
        assert_eq!(bus.subscriber_count("echo.out"), 1);
        assert_eq!(bus.subscriber_count(Topic::PIPELINE_ERROR), 1);

        drop(executor);

        assert_eq!(bus.subscriber_count("echo.out"), 0);
        assert_eq!(bus.subscriber_count(Topic::PIPELINE_ERROR), 0);
        assert_eq!(bus.subscriber_count("echo.in"), 0);
    }
}
