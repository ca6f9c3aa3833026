//! Configuration management.
//!
//! Configuration is assembled from a TOML file and/or environment variables
//! (environment takes precedence), with defaults suitable for a local
//! development setup. Invalid configuration is fatal at startup, before any
//! document is processed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// External service endpoints
    pub services: ServiceConfig,

    /// Relation classifier subprocess
    pub classifier: ClassifierConfig,

    /// Relation linking
    pub linker: LinkerConfig,

    /// Index batching
    pub indexing: IndexingConfig,

    /// Logging
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables on top of defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Overlay environment variables (env takes precedence).
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("CONVERSION_URL") {
            self.services.conversion_url = url;
        }
        if let Ok(url) = std::env::var("ANNOTATION_URL") {
            self.services.annotation_url = url;
        }
        if let Ok(url) = std::env::var("INDEX_URL") {
            self.services.index_url = url;
        }
        if let Ok(secs) = std::env::var("REQUEST_TIMEOUT_SECS") {
            self.services.request_timeout_secs =
                secs.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "REQUEST_TIMEOUT_SECS".to_string(),
                    value: secs,
                })?;
        }
        if let Ok(size) = std::env::var("INDEX_BATCH_SIZE") {
            self.indexing.batch_size = size.parse().map_err(|_| ConfigError::InvalidValue {
                key: "INDEX_BATCH_SIZE".to_string(),
                value: size,
            })?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(self)
    }
}

/// External service endpoints and the shared per-call timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Document-conversion service URL
    pub conversion_url: String,

    /// Sentence/token/NER annotation service URL
    pub annotation_url: String,

    /// Search index core URL
    pub index_url: String,

    /// Per-call timeout for all service requests, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            conversion_url: "http://localhost:9998".to_string(),
            annotation_url: "http://localhost:9000".to_string(),
            index_url: "http://localhost:8983/solr/docs".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Relation classifier subprocess configuration.
///
/// The classifier is an external batch predictor: it reads a file of
/// feature-record lines and writes one numeric label per input line. Model
/// paths are optional here; whether one is required depends on the linking
/// method and is checked at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Program to invoke
    pub command: String,

    /// Arguments placed before the input/model/output paths
    pub args: Vec<String>,

    /// Trained container-role model
    pub container_model: Option<PathBuf>,

    /// Trained containee-role model
    pub containee_model: Option<PathBuf>,

    /// Trained pairwise relation model
    pub pairwise_model: Option<PathBuf>,

    /// Directory for the classifier's input/output files
    pub tmp_dir: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            command: "java".to_string(),
            args: vec!["-mx256M".to_string(), "org.itc.irst.tcc.sre.Predict".to_string()],
            container_model: None,
            containee_model: None,
            pairwise_model: None,
            tmp_dir: PathBuf::from("/tmp"),
        }
    }
}

/// Relation linking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Default linking method name
    pub method: String,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            method: "closest_container_closest_containee".to_string(),
        }
    }
}

/// Index batching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Records per batch post
    pub batch_size: usize,

    /// Commit after each batch
    pub commit: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            commit: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),
}
