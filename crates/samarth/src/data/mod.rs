//! Crop production and rainfall datasets

mod sample;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DataSettings;

/// One district's production of one crop in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRecord {
    pub state: String,
    pub district: String,
    pub crop: String,
    pub year: i32,
    pub production_tonnes: f64,
}

/// A state's annual rainfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallRecord {
    pub state: String,
    pub year: i32,
    pub annual_rainfall_mm: f64,
}

/// Datasets attached to a query by the load stage.
///
/// A dataset the intent does not need stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datasets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agriculture: Option<Vec<CropRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<Vec<RainfallRecord>>,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the load stage gets its records from.
pub trait DataSource: Send + Sync {
    fn agriculture(&self) -> Result<Vec<CropRecord>, DataError>;
    fn rainfall(&self) -> Result<Vec<RainfallRecord>, DataError>;
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    agriculture: Vec<CropRecord>,
    rainfall: Vec<RainfallRecord>,
}

impl InMemoryDataSource {
    pub fn new(agriculture: Vec<CropRecord>, rainfall: Vec<RainfallRecord>) -> Self {
        Self {
            agriculture,
            rainfall,
        }
    }

    /// Deterministic sample covering Kerala, Punjab, Maharashtra and
    /// Karnataka for 2017 to 2021.
    pub fn sample() -> Self {
        Self::new(sample::agriculture(), sample::rainfall())
    }
}

impl DataSource for InMemoryDataSource {
    fn agriculture(&self) -> Result<Vec<CropRecord>, DataError> {
        Ok(self.agriculture.clone())
    }

    fn rainfall(&self) -> Result<Vec<RainfallRecord>, DataError> {
        Ok(self.rainfall.clone())
    }
}

/// Reads `agriculture.json` and `rainfall.json` from a directory on every load.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub const AGRICULTURE_FILE: &'static str = "agriculture.json";
    pub const RAINFALL_FILE: &'static str = "rainfall.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, DataError> {
        let path = self.dir.join(file);
        let raw = fs::read_to_string(&path).map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        let records: Vec<T> =
            serde_json::from_str(&raw).map_err(|source| DataError::Json { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), records = records.len(), "dataset read");
        Ok(records)
    }
}

impl DataSource for JsonDirSource {
    fn agriculture(&self) -> Result<Vec<CropRecord>, DataError> {
        self.read(Self::AGRICULTURE_FILE)
    }

    fn rainfall(&self) -> Result<Vec<RainfallRecord>, DataError> {
        self.read(Self::RAINFALL_FILE)
    }
}

/// Pick the data source the settings ask for.
pub fn source_from_settings(settings: &DataSettings) -> Arc<dyn DataSource> {
    match &settings.dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "using JSON datasets");
            Arc::new(JsonDirSource::new(dir))
        }
        None => {
            tracing::info!("using built-in sample datasets");
            Arc::new(InMemoryDataSource::sample())
        }
    }
}
