use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{HandlerError, StageError};
use crate::event_bus::bus::panic_message;
use crate::event_bus::{Event, EventBus, Metadata, StageFailure, SubscriptionId, Topic};

/// The one method a concrete stage implements.
pub trait StageProcessor: Send + Sync {
    fn process(&self, payload: &Value, metadata: &Metadata) -> Result<Value, StageError>;
}

impl<F> StageProcessor for F
where
    F: Fn(&Value, &Metadata) -> Result<Value, StageError> + Send + Sync,
{
    fn process(&self, payload: &Value, metadata: &Metadata) -> Result<Value, StageError> {
        self(payload, metadata)
    }
}

/// Static description of a stage: where it listens, where it publishes and
/// what it does in between.
#[derive(Clone)]
pub struct StageSpec {
    pub name: String,
    pub input_topic: String,
    pub output_topic: String,
    pub processor: Arc<dyn StageProcessor>,
}

impl StageSpec {
    pub fn new(
        name: impl Into<String>,
        input_topic: impl Into<String>,
        output_topic: impl Into<String>,
        processor: impl StageProcessor + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            input_topic: input_topic.into(),
            output_topic: output_topic.into(),
            processor: Arc::new(processor),
        }
    }
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("input_topic", &self.input_topic)
            .field("output_topic", &self.output_topic)
            .finish_non_exhaustive()
    }
}

/// A stage attached to a bus.
///
/// Each stage:
/// 1. Subscribes to its input topic
/// 2. Runs its processor on the event payload
/// 3. Publishes the result to its output topic, metadata unchanged,
///    or a [`StageFailure`] to `pipeline.error` when processing fails
///
/// Dropping the stage removes its subscription.
#[derive(Debug)]
pub struct Stage {
    name: String,
    input_topic: String,
    output_topic: String,
    bus: Arc<EventBus>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl Stage {
    /// Register the stage with the bus.
    pub fn attach(bus: &Arc<EventBus>, spec: StageSpec) -> Self {
        let StageSpec {
            name,
            input_topic,
            output_topic,
            processor,
        } = spec;

        // Weak: the bus owns this handler, so a strong ref would be a cycle
        let weak = Arc::downgrade(bus);
        let stage_name = name.clone();
        let target = output_topic.clone();
        let subscription = bus.subscribe_labeled(input_topic.clone(), name.clone(), move |event: &Event| {
            let bus = weak
                .upgrade()
                .ok_or_else(|| HandlerError::new("event bus dropped"))?;
            run_stage(&bus, &stage_name, &target, processor.as_ref(), event)
        });

        tracing::info!(
            stage = %name,
            input = %input_topic,
            output = %output_topic,
            "stage registered"
        );

        Self {
            name,
            input_topic,
            output_topic,
            bus: bus.clone(),
            subscription: Mutex::new(Some(subscription)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_topic(&self) -> &str {
        &self.input_topic
    }

    pub fn output_topic(&self) -> &str {
        &self.output_topic
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Stop receiving events. Returns false if already detached.
    pub fn detach(&self) -> bool {
        match self.subscription.lock().take() {
            Some(id) => {
                tracing::info!(stage = %self.name, input = %self.input_topic, "stage detached");
                self.bus.unsubscribe(id)
            }
            None => false,
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.detach();
    }
}

fn run_stage(
    bus: &EventBus,
    name: &str,
    output_topic: &str,
    processor: &dyn StageProcessor,
    event: &Event,
) -> Result<(), HandlerError> {
    tracing::debug!(stage = name, topic = %event.topic, cursor = event.cursor, "stage processing event");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        processor.process(&event.payload, &event.metadata)
    }));

    match outcome {
        Ok(Ok(result)) => {
            bus.publish(output_topic, result, event.metadata.clone());
            tracing::debug!(stage = name, topic = output_topic, "stage published result");
            Ok(())
        }
        Ok(Err(err)) => {
            tracing::error!(stage = name, kind = err.kind(), error = %err, "stage failed");
            publish_failure(bus, name, err.kind(), err.to_string(), event);
            Ok(())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            publish_failure(bus, name, "panic", message.clone(), event);
            Err(HandlerError::new(format!("stage '{name}' panicked: {message}")))
        }
    }
}

fn publish_failure(bus: &EventBus, stage: &str, kind: &str, message: String, event: &Event) {
    let failure = StageFailure {
        stage_name: stage.to_string(),
        error_kind: kind.to_string(),
        error_message: message,
    };
    let payload = match serde_json::to_value(&failure) {
        Ok(value) => value,
        Err(err) => Value::String(format!("{stage}: {err}")),
    };
    bus.publish(Topic::PIPELINE_ERROR, payload, event.metadata.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(bus: &EventBus, topic: &str) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(topic, move |event: &Event| {
            sink.lock().push(event.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn test_stage_forwards_result_and_metadata() {
        let bus = Arc::new(EventBus::new());
        let _stage = Stage::attach(
            &bus,
            StageSpec::new("double", "num.in", "num.out", |payload: &Value, _: &Metadata| -> Result<Value, StageError> {
                let n = payload.as_i64().ok_or_else(|| StageError::InvalidInput("not a number".into()))?;
                Ok(json!(n * 2))
            }),
        );
        let out = collect(&bus, "num.out");

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("test"));
        bus.publish("num.in", json!(21), metadata.clone());

        let out = out.lock();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload, json!(42));
        assert_eq!(out[0].metadata, metadata);
    }

    #[test]
    fn test_stage_error_goes_to_error_topic_only() {
        let bus = Arc::new(EventBus::new());
        let _stage = Stage::attach(
            &bus,
            StageSpec::new("picky", "num.in", "num.out", |_: &Value, _: &Metadata| -> Result<Value, StageError> {
                Err(StageError::NoData("nothing here".into()))
            }),
        );
        let out = collect(&bus, "num.out");
        let errors = collect(&bus, Topic::PIPELINE_ERROR);

        let publication = bus.publish("num.in", json!(1), Metadata::new());

        assert!(publication.is_clean());
        assert!(out.lock().is_empty());
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        let failure: StageFailure = serde_json::from_value(errors[0].payload.clone()).unwrap();
        assert_eq!(failure.stage_name, "picky");
        assert_eq!(failure.error_kind, "no_data");
        assert_eq!(failure.error_message, "no data: nothing here");
    }

    #[test]
    fn test_panicking_processor_degrades_to_stage_failure() {
        let bus = Arc::new(EventBus::new());
        let _stage = Stage::attach(
            &bus,
            StageSpec::new("fragile", "num.in", "num.out", |_: &Value, _: &Metadata| -> Result<Value, StageError> {
                panic!("index out of range")
            }),
        );
        let errors = collect(&bus, Topic::PIPELINE_ERROR);

        let publication = bus.publish("num.in", json!(1), Metadata::new());

        assert_eq!(publication.failures.len(), 1);
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].payload["stage_name"], "fragile");
        assert_eq!(errors[0].payload["error_kind"], "panic");
    }

    #[test]
    fn test_detach_and_drop_unsubscribe() {
        let bus = Arc::new(EventBus::new());
        let noop = |payload: &Value, _: &Metadata| -> Result<Value, StageError> { Ok(payload.clone()) };
        let stage = Stage::attach(&bus, StageSpec::new("noop", "a.in", "a.out", noop));
        assert_eq!(bus.subscriber_count("a.in"), 1);

        assert!(stage.detach());
        assert!(!stage.is_attached());
        assert!(!stage.detach());
        assert_eq!(bus.subscriber_count("a.in"), 0);

        {
            let _scoped = Stage::attach(&bus, StageSpec::new("noop", "a.in", "a.out", noop));
            assert_eq!(bus.subscriber_count("a.in"), 1);
        }
        assert_eq!(bus.subscriber_count("a.in"), 0);
    }
}
