//! Configuration loader with layered sources and write-back.

use crate::AppConfig;
use config::{Config, Environment, File};
use queuectl_core::{QueueError, QueueResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./queuectl.toml";

/// Loads configuration from a TOML file layered with environment
/// overrides, and writes updated values back to the same file.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a loader for the given configuration file path.
    ///
    /// Sources, in order of precedence:
    /// 1. Built-in defaults
    /// 2. The TOML file (optional — defaults apply if absent)
    /// 3. Environment variables with a `QUEUECTL_` prefix
    ///    (`QUEUECTL_WORKER__COUNT=4` overrides `worker.count`)
    pub fn new(path: impl Into<PathBuf>) -> QueueResult<Self> {
        let path = path.into();
        let config = Self::load_config(&path)?;
        Ok(Self { config, path })
    }

    /// Loads configuration from the default location (`./queuectl.toml`).
    pub fn from_default_location() -> QueueResult<Self> {
        Self::new(DEFAULT_CONFIG_PATH)
    }

    /// Returns the loaded configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    fn load_config(path: &Path) -> QueueResult<AppConfig> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        let mut builder = Config::builder();

        if path.exists() {
            debug!("Loading config from: {}", path.display());
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("QUEUECTL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| QueueError::Configuration(e.to_string()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| QueueError::Configuration(e.to_string()))?;

        Self::validate(&app_config)?;

        Ok(app_config)
    }

    fn validate(config: &AppConfig) -> QueueResult<()> {
        if config.retry.base < 1 {
            return Err(QueueError::Configuration(
                "retry.base must be at least 1".to_string(),
            ));
        }
        if config.worker.count < 1 {
            return Err(QueueError::Configuration(
                "worker.count must be at least 1".to_string(),
            ));
        }
        if config.worker.poll_interval_ms < 1 {
            return Err(QueueError::Configuration(
                "worker.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Gets a configuration value by dot-notation key path
    /// (e.g. `retry.max_retries`).
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(&self.config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        Some(current.clone())
    }

    /// Sets a configuration value by dot-notation key path and persists
    /// the updated file.
    ///
    /// The raw value is coerced to a number or boolean where it parses as
    /// one, otherwise kept as a string. Unknown keys and type mismatches
    /// are rejected before anything is written.
    pub fn set_value(&mut self, key: &str, raw: &str) -> QueueResult<()> {
        let mut json = serde_json::to_value(&self.config)
            .map_err(|e| QueueError::Internal(e.to_string()))?;

        let parts: Vec<&str> = key.split('.').collect();
        let (leaf, sections) = parts
            .split_last()
            .ok_or_else(|| QueueError::Configuration("empty configuration key".to_string()))?;

        let mut current = &mut json;
        for part in sections {
            current = current
                .get_mut(*part)
                .ok_or_else(|| {
                    QueueError::Configuration(format!("unknown configuration key: {key}"))
                })?;
        }

        let map = current.as_object_mut().ok_or_else(|| {
            QueueError::Configuration(format!("unknown configuration key: {key}"))
        })?;
        map.insert((*leaf).to_string(), coerce_scalar(raw));

        // Round-trip through AppConfig so unknown keys and bad types fail
        // here instead of corrupting the file.
        let updated: AppConfig = serde_json::from_value(json)
            .map_err(|e| QueueError::Configuration(format!("invalid value for {key}: {e}")))?;
        Self::validate(&updated)?;

        self.config = updated;
        self.save()
    }

    /// Persists the current configuration to the loader's file as TOML.
    pub fn save(&self) -> QueueResult<()> {
        let rendered = toml::to_string_pretty(&self.config)
            .map_err(|e| QueueError::Internal(e.to_string()))?;
        std::fs::write(&self.path, rendered)
            .map_err(|e| QueueError::Store(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

/// Coerces a raw CLI string to the closest JSON scalar.
fn coerce_scalar(raw: &str) -> serde_json::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return serde_json::Value::Bool(b);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(raw.to_string())
}
