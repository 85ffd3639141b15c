//! Event-driven pipeline core.
//!
//! A topic-based [`EventBus`] dispatches events synchronously to ordered
//! subscribers. A [`Pipeline`] chains [`Stage`]s by topic name, and a
//! [`QueryExecutor`] turns one logical request into an entry event and awaits
//! the terminal event carrying the same correlation id.

pub mod error;
pub mod event_bus;
pub mod executor;
pub mod pipeline;

pub use error::{HandlerError, PipelineError, StageError};
pub use event_bus::{Event, EventBus, Metadata, Publication, StageFailure, SubscriptionId, Topic};
pub use executor::{Outcome, QueryExecutor, RequestTracker};
pub use pipeline::{Pipeline, Stage, StageProcessor, StageSpec};
