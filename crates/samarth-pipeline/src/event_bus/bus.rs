use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use super::types::{Event, Metadata};
use crate::error::{HandlerError, PipelineError};

/// Callback invoked for every event published on a subscribed topic.
pub type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    label: Arc<str>,
    handler: Handler,
}

#[derive(Default)]
struct History {
    events: VecDeque<Event>,
    last_cursor: u64,
}

/// Outcome of a single `publish` call.
#[derive(Debug, Clone)]
pub struct Publication {
    /// Cursor assigned to the published event
    pub cursor: u64,
    /// Number of handlers the event was dispatched to
    pub delivered: usize,
    /// One `PipelineError::Dispatch` per handler that failed or panicked
    pub failures: Vec<PipelineError>,
}

impl Publication {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Event Bus
///
/// Topic → ordered list of subscribers, plus an append-only history of every
/// published event:
/// 1. `publish` assigns a cursor and records the event
/// 2. Every handler currently subscribed to the topic runs, in order
///
/// Locks are released before handlers run, so a handler may publish (that is
/// how stages chain) or subscribe without deadlocking.
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscription>>>,
    history: Mutex<History>,
    max_history: Option<usize>,
    next_subscription: AtomicU64,
}

impl EventBus {
    /// Events kept in history by [`EventBus::new`].
    pub const DEFAULT_MAX_HISTORY: usize = 100;

    pub fn new() -> Self {
        Self::with_max_history(Some(Self::DEFAULT_MAX_HISTORY))
    }

    /// `None` keeps every event ever published.
    pub fn with_max_history(max_history: Option<usize>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            history: Mutex::new(History::default()),
            max_history,
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Subscribe to every future event on `topic`.
    ///
    /// Registering the same handler twice makes it run twice per publish.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe_labeled(topic, "anonymous", handler)
    }

    /// Same as [`EventBus::subscribe`], with a label used in logs and
    /// dispatch failures.
    pub fn subscribe_labeled<F>(
        &self,
        topic: impl Into<String>,
        label: impl Into<String>,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let label: Arc<str> = Arc::from(label.into());
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);

        tracing::debug!(topic = %topic, handler = %label, "subscribed handler");

        self.subscribers
            .write()
            .entry(topic)
            .or_default()
            .push(Subscription {
                id,
                label,
                handler: Arc::new(handler),
            });

        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        for (topic, list) in subscribers.iter_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                let removed = list.remove(pos);
                tracing::debug!(topic = %topic, handler = %removed.label, "unsubscribed handler");
                return true;
            }
        }
        false
    }

    /// Clear all subscriptions
    pub fn clear_subscribers(&self) {
        self.subscribers.write().clear();
        tracing::debug!("cleared all subscribers");
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().get(topic).map_or(0, Vec::len)
    }

    /// Publish an event to all subscribers of `topic`.
    ///
    /// Handler failures and panics are caught per handler: they are logged and
    /// returned in the [`Publication`], and the remaining handlers still run.
    pub fn publish(
        &self,
        topic: impl Into<String>,
        payload: Value,
        metadata: Metadata,
    ) -> Publication {
        let event = self.record(Event::new(topic, payload, metadata));

        // Snapshot so handlers run without the subscriber lock held
        let subscriptions = self
            .subscribers
            .read()
            .get(&event.topic)
            .cloned()
            .unwrap_or_default();

        if subscriptions.is_empty() {
            tracing::warn!(topic = %event.topic, cursor = event.cursor, "no subscribers for topic");
        } else {
            tracing::debug!(
                topic = %event.topic,
                cursor = event.cursor,
                subscribers = subscriptions.len(),
                "publishing event"
            );
        }

        let mut failures = Vec::new();
        for subscription in &subscriptions {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscription.handler)(&event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => format!("handler panicked: {}", panic_message(payload.as_ref())),
            };

            tracing::error!(
                topic = %event.topic,
                cursor = event.cursor,
                handler = %subscription.label,
                error = %message,
                "handler failed"
            );
            failures.push(PipelineError::Dispatch {
                topic: event.topic.clone(),
                handler: subscription.label.to_string(),
                message,
            });
        }

        Publication {
            cursor: event.cursor,
            delivered: subscriptions.len(),
            failures,
        }
    }

    /// Snapshot of the recorded history, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.history.lock().events.iter().cloned().collect()
    }

    pub fn history_for_topic(&self, topic: &str) -> Vec<Event> {
        self.history
            .lock()
            .events
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Every recorded event of one logical request, in publish order.
    pub fn history_for_correlation(&self, correlation_id: Uuid) -> Vec<Event> {
        self.history
            .lock()
            .events
            .iter()
            .filter(|e| e.correlation_id() == Some(correlation_id))
            .cloned()
            .collect()
    }

    fn record(&self, mut event: Event) -> Event {
        let mut history = self.history.lock();
        history.last_cursor += 1;
        event.cursor = history.last_cursor;
        history.events.push_back(event.clone());
        if let Some(max) = self.max_history {
            while history.events.len() > max {
                history.events.pop_front();
            }
        }
        event
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics: Vec<(String, usize)> = self
            .subscribers
            .read()
            .iter()
            .map(|(topic, list)| (topic.clone(), list.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &topics)
            .field("max_history", &self.max_history)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let make = move |name: &str| -> Handler {
            let sink = sink.clone();
            let name = name.to_string();
            Arc::new(move |event: &Event| {
                sink.lock().push(format!("{name}:{}", event.topic));
                Ok(())
            })
        };
        (calls, make)
    }

    fn subscribe_handler(bus: &EventBus, topic: &str, handler: Handler) -> SubscriptionId {
        bus.subscribe(topic, move |event: &Event| handler(event))
    }

    #[test]
    fn test_topic_isolation() {
        let bus = EventBus::new();
        let (calls, make) = recorder();
        subscribe_handler(&bus, "a.one", make("h1"));

        let publication = bus.publish("b.two", json!(1), Metadata::new());

        assert_eq!(publication.delivered, 0);
        assert!(calls.lock().is_empty());

        bus.publish("a.one", json!(2), Metadata::new());
        assert_eq!(*calls.lock(), vec!["h1:a.one"]);
    }

    #[test]
    fn test_fan_out_preserves_subscription_order() {
        let bus = EventBus::new();
        let (calls, make) = recorder();
        for name in ["h1", "h2", "h3", "h4"] {
            subscribe_handler(&bus, "query.received", make(name));
        }

        let publication = bus.publish("query.received", json!({}), Metadata::new());

        assert_eq!(publication.delivered, 4);
        assert!(publication.is_clean());
        assert_eq!(
            *calls.lock(),
            vec![
                "h1:query.received",
                "h2:query.received",
                "h3:query.received",
                "h4:query.received"
            ]
        );
    }

    #[test]
    fn test_duplicate_subscription_fires_twice() {
        let bus = EventBus::new();
        let (calls, make) = recorder();
        let handler = make("same");
        subscribe_handler(&bus, "t.x", handler.clone());
        subscribe_handler(&bus, "t.x", handler);

        bus.publish("t.x", Value::Null, Metadata::new());

        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn test_failing_handler_does_not_block_siblings() {
        let bus = EventBus::new();
        let (calls, make) = recorder();
        subscribe_handler(&bus, "t.x", make("before"));
        bus.subscribe_labeled("t.x", "broken", |_: &Event| Err(HandlerError::new("nope")));
        bus.subscribe_labeled("t.x", "panicky", |_: &Event| -> Result<(), HandlerError> {
            panic!("kaboom")
        });
        subscribe_handler(&bus, "t.x", make("after"));

        let publication = bus.publish("t.x", Value::Null, Metadata::new());

        assert_eq!(publication.delivered, 4);
        assert_eq!(*calls.lock(), vec!["before:t.x", "after:t.x"]);
        assert_eq!(publication.failures.len(), 2);
        assert_eq!(
            publication.failures[0],
            PipelineError::Dispatch {
                topic: "t.x".to_string(),
                handler: "broken".to_string(),
                message: "nope".to_string(),
            }
        );
        match &publication.failures[1] {
            PipelineError::Dispatch { handler, message, .. } => {
                assert_eq!(handler, "panicky");
                assert!(message.contains("kaboom"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_handler_can_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let weak = Arc::downgrade(&bus);
        bus.subscribe("first.step", move |event: &Event| {
            let bus = weak.upgrade().ok_or_else(|| HandlerError::new("bus dropped"))?;
            bus.publish("second.step", event.payload.clone(), event.metadata.clone());
            Ok(())
        });
        let (calls, make) = recorder();
        subscribe_handler(&bus, "second.step", make("tail"));

        bus.publish("first.step", json!("hello"), Metadata::new());

        assert_eq!(*calls.lock(), vec!["tail:second.step"]);
        let topics: Vec<String> = bus.history().into_iter().map(|e| e.topic).collect();
        assert_eq!(topics, vec!["first.step", "second.step"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (calls, make) = recorder();
        let id = subscribe_handler(&bus, "t.x", make("gone"));
        subscribe_handler(&bus, "t.x", make("kept"));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count("t.x"), 1);

        bus.publish("t.x", Value::Null, Metadata::new());
        assert_eq!(*calls.lock(), vec!["kept:t.x"]);

        bus.clear_subscribers();
        assert_eq!(bus.subscriber_count("t.x"), 0);
    }

    #[test]
    fn test_history_records_unsubscribed_topics_and_cursors() {
        let bus = EventBus::new();
        let a = bus.publish("nobody.listens", json!(1), Metadata::new());
        let b = bus.publish("nobody.listens", json!(2), Metadata::new());

        assert!(b.cursor > a.cursor);
        let history = bus.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].payload, json!(1));
        assert_eq!(bus.history_for_topic("nobody.listens").len(), 2);
        assert!(bus.history_for_topic("other.topic").is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let bus = EventBus::with_max_history(Some(3));
        for i in 0..5 {
            bus.publish("t.x", json!(i), Metadata::new());
        }

        let payloads: Vec<Value> = bus.history().into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_history_for_correlation() {
        let bus = EventBus::with_max_history(None);
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        bus.publish("t.a", json!(1), crate::event_bus::metadata_with_correlation(mine));
        bus.publish("t.a", json!(2), crate::event_bus::metadata_with_correlation(theirs));
        bus.publish("t.b", json!(3), crate::event_bus::metadata_with_correlation(mine));

        let events = bus.history_for_correlation(mine);
        let topics: Vec<&str> = events.iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["t.a", "t.b"]);
    }
}
