use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: PathBuf,
    pub batch: BatchConfig,
}

/// Knobs for the delayed batch updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub idle_threshold_ms: u64,
    pub high_water_mark: usize,
    pub chunk_size: usize,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            idle_threshold_ms: 500,
            high_water_mark: 1000,
            chunk_size: 500,
            poll_interval_ms: 50,
        }
    }
}

impl Config {
    pub fn with_storage_path(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: path.into(),
            ..Config::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

impl BatchConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            storage_path = "/var/lib/schemadex"

            [batch]
            high_water_mark = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_path, PathBuf::from("/var/lib/schemadex"));
        assert_eq!(config.batch.high_water_mark, 25);
        assert_eq!(config.batch.chunk_size, 500);
        assert_eq!(config.batch.idle_threshold(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("batch = 3").unwrap_err();
        assert!(matches!(err, crate::core::error::Error::Config(_)));
    }

    #[test]
    fn test_zero_knobs_are_clamped() {
        let batch = BatchConfig {
            chunk_size: 0,
            poll_interval_ms: 0,
            ..BatchConfig::default()
        };
        assert_eq!(batch.chunk_size(), 1);
        assert_eq!(batch.poll_interval(), Duration::from_millis(1));
    }
}
