//! Configuration management.

use crate::error::{AppResult, ProbeError};
use config::Config;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Default tracing filter directive (e.g. "info").
    pub log_level: String,
    /// Contact-quality worker settings.
    pub contact_quality: ContactQualitySettings,
    /// Per-role instrument configuration, passed through to the driver layer.
    #[serde(default)]
    pub instruments: HashMap<String, toml::Value>,
}

/// Settings for the contact-quality background worker.
#[derive(Debug, Deserialize, Clone)]
pub struct ContactQualitySettings {
    /// Pause between two acquisitions.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Matrix channels closed for the duration of a run.
    #[serde(default)]
    pub matrix_channels: Vec<String>,
}

impl Settings {
    /// Load settings from `config/<name>.toml` (default: `config/default`).
    pub fn new(config_name: Option<&str>) -> AppResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        Self::load(config::File::with_name(&config_path))
    }

    /// Load settings from an explicit file path.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        Self::load(config::File::from(path))
    }

    fn load(source: config::File<config::FileSourceFile, config::FileFormat>) -> AppResult<Self> {
        let settings: Self = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check semantic constraints that parsing cannot.
    pub fn validate(&self) -> AppResult<()> {
        if self.contact_quality.interval.is_zero() {
            return Err(ProbeError::Configuration(
                "contact_quality.interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
