// Event Bus
//
// In-process, topic-scoped publish/subscribe. Dispatch is synchronous: every
// handler subscribed to a topic runs, in subscription order, inside `publish`.

pub mod bus;
pub mod kinds;
pub mod types;

pub use bus::{EventBus, Handler, Publication, SubscriptionId};
pub use kinds::Topic;
pub use types::{Event, Metadata, StageFailure, correlation_id, metadata_with_correlation};
