// Pipeline wiring
//
// A pipeline is an ordered list of stages whose topics chain: the output topic
// of stage N is the input topic of stage N+1. Reordering or inserting a stage
// only changes topic names; stages never reference each other.

mod stage;

use std::collections::HashSet;
use std::sync::Arc;

pub use stage::{Stage, StageProcessor, StageSpec};

use crate::error::PipelineError;
use crate::event_bus::{EventBus, Topic};

#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
    entry_topic: String,
    terminal_topic: String,
}

impl Pipeline {
    /// Validate the stage list and attach every stage to the bus.
    ///
    /// All stages are subscribed before this returns, so nothing published on
    /// the entry topic afterwards can reach zero subscribers.
    pub fn wire(bus: &Arc<EventBus>, specs: Vec<StageSpec>) -> Result<Self, PipelineError> {
        Self::validate(&specs)?;

        let entry_topic = specs[0].input_topic.clone();
        let terminal_topic = specs[specs.len() - 1].output_topic.clone();
        let stages: Vec<Stage> = specs.into_iter().map(|spec| Stage::attach(bus, spec)).collect();

        tracing::info!(
            stages = stages.len(),
            entry = %entry_topic,
            terminal = %terminal_topic,
            "pipeline wired"
        );

        Ok(Self {
            stages,
            entry_topic,
            terminal_topic,
        })
    }

    /// Check that `specs` form a linear, acyclic topic chain.
    pub fn validate(specs: &[StageSpec]) -> Result<(), PipelineError> {
        let Some(first) = specs.first() else {
            return Err(PipelineError::InvalidPipeline("no stages".to_string()));
        };

        let mut names = HashSet::new();
        for spec in specs {
            if !names.insert(spec.name.as_str()) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "duplicate stage name '{}'",
                    spec.name
                )));
            }
        }

        for pair in specs.windows(2) {
            if pair[0].output_topic != pair[1].input_topic {
                return Err(PipelineError::InvalidPipeline(format!(
                    "stage '{}' publishes '{}' but stage '{}' listens on '{}'",
                    pair[0].name, pair[0].output_topic, pair[1].name, pair[1].input_topic
                )));
            }
        }

        let mut topics = HashSet::new();
        let chain = std::iter::once(first.input_topic.as_str())
            .chain(specs.iter().map(|s| s.output_topic.as_str()));
        for topic in chain {
            if topic == Topic::PIPELINE_ERROR {
                return Err(PipelineError::InvalidPipeline(format!(
                    "'{topic}' is reserved for stage failures"
                )));
            }
            if !topics.insert(topic) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "topic '{topic}' appears twice, the chain would loop"
                )));
            }
        }

        Ok(())
    }

    pub fn entry_topic(&self) -> &str {
        &self.entry_topic
    }

    pub fn terminal_topic(&self) -> &str {
        &self.terminal_topic
    }

    /// Topics in the order a request traverses them, entry first.
    pub fn topics(&self) -> Vec<&str> {
        std::iter::once(self.entry_topic.as_str())
            .chain(self.stages.iter().map(Stage::output_topic))
            .collect()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    /// Unsubscribe one stage; requests reaching it will stall until timeout.
    pub fn detach_stage(&self, name: &str) -> bool {
        self.stage(name).is_some_and(Stage::detach)
    }
}
