use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::audio::CaptureConfig;
use crate::domain::Language;

/// Pipeline service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the pipeline service.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Translation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Default target language for new sessions.
    pub default_target: Language,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            default_target: Language::default(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for generated speech files. Defaults to `speech/` under
    /// the application data directory when unset.
    pub speech_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub audio: CaptureConfig,
    pub translation: TranslationConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
