/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: georank.toml (in working directory)
/// 3. Environment variables: prefixed GEORANK_ (e.g., GEORANK_LOG_LEVEL=debug,
///    nested keys split on __: GEORANK_PIPELINE__BATCH_SIZE=50)

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::GeorankError;
use crate::prerank::{DEFAULT_BATCH_SIZE, DEFAULT_RESULT_LIMIT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Pipeline sizing knobs, applied to sessions built from this config.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-cycle cap on candidates forwarded to the ranker.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total candidates accepted across one session.
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            batch_size: default_batch_size(),
            result_limit: default_result_limit(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: GEORANK_LOG_LEVEL=debug overrides log_level in georank.toml
    pub fn load() -> Result<Config, GeorankError> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("georank.toml"))
            .merge(Env::prefixed("GEORANK_").split("__"))
            .extract()
            .map_err(|e| GeorankError::Config(format!("Failed to load config: {}", e)))
    }
}
