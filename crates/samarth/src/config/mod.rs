use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Pipeline and executor tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineSettings {
    /// Seconds a request may take before it fails with a timeout (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Events kept in the bus history; 0 keeps everything (default: 100)
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_history() -> usize {
    100
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_history: default_max_history(),
        }
    }
}

impl PipelineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn history_limit(&self) -> Option<usize> {
        (self.max_history > 0).then_some(self.max_history)
    }
}

/// Where datasets come from
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DataSettings {
    /// Directory holding `agriculture.json` and `rainfall.json`.
    /// Built-in sample data is used when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub data: DataSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with defaults
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (not tracked by git)
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from environment variables (e.g. SAMARTH_PIPELINE__TIMEOUT_SECS)
            .add_source(Environment::with_prefix("SAMARTH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
