//! Service configuration
//!
//! Layered as built-in defaults, then an optional TOML file, then
//! `READMISSION__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use explainer::SampleBudget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub explainer: ExplainerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// JSON model bundle (schema, specialties, preprocessor, classifier)
    pub bundle_path: PathBuf,
    /// Decision threshold file
    pub threshold_path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            bundle_path: PathBuf::from("models/readmission_model.json"),
            threshold_path: PathBuf::from("models/best_threshold.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerSettings {
    /// Coalitions per explanation; automatic when unset
    pub nsamples: Option<usize>,
    /// Seed for coalition sampling
    pub seed: u64,
}

impl ExplainerSettings {
    pub fn budget(&self) -> SampleBudget {
        SampleBudget::from(self.nsamples)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("READMISSION")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.explainer.nsamples == Some(0) {
            return Err(ConfigError::Message(
                "explainer.nsamples must be positive when set".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Message("logging.level must not be empty".to_string()));
        }
        Ok(())
    }
}
