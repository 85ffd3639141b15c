//! Agriculture and rainfall question answering over an event-driven pipeline.
//!
//! [`build_executor`] wires the four stages (parse, load, analysis, format)
//! onto a fresh bus; [`ask`] runs one question through them.

pub mod config;
pub mod data;
pub mod parser;
pub mod stages;

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use samarth_pipeline::{EventBus, Pipeline, PipelineError, QueryExecutor, StageSpec, Topic};

use crate::config::Settings;
use crate::data::DataSource;
use crate::stages::{Answer, LoadStage};

#[derive(Debug, Error)]
pub enum AskError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The stage list, in traversal order.
pub fn stage_specs(source: Arc<dyn DataSource>) -> Vec<StageSpec> {
    vec![
        StageSpec::new("parse", Topic::QUERY_RECEIVED, Topic::QUERY_PARSED, stages::parse::process),
        StageSpec::new("load", Topic::QUERY_PARSED, Topic::DATA_LOADED, LoadStage::new(source)),
        StageSpec::new(
            "analysis",
            Topic::DATA_LOADED,
            Topic::ANALYSIS_COMPLETE,
            stages::analysis::process,
        ),
        StageSpec::new(
            "format",
            Topic::ANALYSIS_COMPLETE,
            Topic::RESPONSE_READY,
            stages::format::process,
        ),
    ]
}

/// Create a bus, wire every stage onto it and wrap it in an executor.
pub fn build_executor(settings: &Settings, source: Arc<dyn DataSource>) -> Result<QueryExecutor, PipelineError> {
    let bus = Arc::new(EventBus::with_max_history(settings.pipeline.history_limit()));
    let pipeline = Pipeline::wire(&bus, stage_specs(source))?;
    Ok(QueryExecutor::new(bus, pipeline).with_timeout(settings.pipeline.timeout()))
}

/// Answer one question.
pub async fn ask(executor: &QueryExecutor, question: &str) -> Result<Answer, AskError> {
    let response = executor.execute(json!({ "question": question })).await?;
    Ok(serde_json::from_value(response)?)
}
