//! Stage processors of the question-answering pipeline
//!
//! Each stage reads the payload the previous one published and extends it:
//!
//! ```text
//! {question} → parse → {question, query}
//!            → load → {question, query, datasets}
//!            → analysis → {question, query, results}
//!            → format → Answer
//! ```

pub mod analysis;
pub mod format;
pub mod load;
pub mod parse;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use samarth_pipeline::StageError;

use crate::data::Datasets;
use crate::parser::Intent;

pub use analysis::Analysis;
pub use format::{Answer, Citation, Table};
pub use load::LoadStage;

/// Output of the parse stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub question: String,
    pub query: Intent,
}

/// Output of the load stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedQuery {
    pub question: String,
    pub query: Intent,
    pub datasets: Datasets,
}

/// Output of the analysis stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedQuery {
    pub question: String,
    pub query: Intent,
    pub results: Analysis,
}

fn decode<T: DeserializeOwned>(payload: &Value) -> Result<T, StageError> {
    Ok(T::deserialize(payload)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, StageError> {
    Ok(serde_json::to_value(value)?)
}
