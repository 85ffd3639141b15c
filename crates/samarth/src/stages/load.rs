use std::sync::Arc;

use serde_json::Value;

use samarth_pipeline::{Metadata, StageError, StageProcessor};

use super::{LoadedQuery, ParsedQuery, decode, encode};
use crate::data::{DataSource, Datasets};

/// Attaches the datasets the query's intent needs.
pub struct LoadStage {
    source: Arc<dyn DataSource>,
}

impl LoadStage {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }
}

impl StageProcessor for LoadStage {
    fn process(&self, payload: &Value, _metadata: &Metadata) -> Result<Value, StageError> {
        let ParsedQuery { question, query } = decode(payload)?;

        let mut datasets = Datasets::default();
        if query.needs_agriculture() {
            let records = self.source.agriculture().map_err(anyhow::Error::from)?;
            datasets.agriculture = Some(records);
        }
        if query.needs_rainfall() {
            let records = self.source.rainfall().map_err(anyhow::Error::from)?;
            datasets.rainfall = Some(records);
        }

        tracing::debug!(
            intent = query.name(),
            agriculture = datasets.agriculture.as_ref().map_or(0, Vec::len),
            rainfall = datasets.rainfall.as_ref().map_or(0, Vec::len),
            "datasets loaded"
        );

        encode(&LoadedQuery {
            question,
            query,
            datasets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataSource;
    use crate::parser::Intent;

    fn load(query: Intent) -> Result<LoadedQuery, StageError> {
        let stage = LoadStage::new(Arc::new(InMemoryDataSource::sample()));
        let payload = encode(&ParsedQuery {
            question: "q".into(),
            query,
        })?;
        decode(&stage.process(&payload, &Metadata::new())?)
    }

    #[test]
    fn test_loads_only_needed_datasets() {
        let loaded = load(Intent::DistrictExtremes {
            state_a: None,
            state_b: None,
            crop: None,
            year: None,
        })
        .unwrap();
        assert!(loaded.datasets.agriculture.is_some());
        assert!(loaded.datasets.rainfall.is_none());

        let loaded = load(Intent::Unknown { raw: "q".into() }).unwrap();
        assert_eq!(loaded.datasets, Datasets::default());
    }

    #[test]
    fn test_source_failure_is_internal() {
        let stage = LoadStage::new(Arc::new(crate::data::JsonDirSource::new("/nonexistent/samarth")));
        let payload = encode(&ParsedQuery {
            question: "q".into(),
            query: Intent::ProductionTrendWithClimate {
                region: None,
                crop: None,
                years: None,
            },
        })
        .unwrap();

        let err = stage.process(&payload, &Metadata::new()).unwrap_err();
        assert_eq!(err.kind(), "internal");
    }
}
