//! Benchmark configuration model.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{MountatError, Result};

/// Root configuration for a benchmark or verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Lower-layer counts to exercise, one case per entry.
    pub layers: Vec<usize>,
    /// Mount/unmount cycles per case.
    pub iterations: u32,
    /// Retry policy applied to detach-unmount.
    pub unmount: RetryConfig,
    /// Whether every mount is walked and verified before unmounting.
    pub verify: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            layers: constants::DEFAULT_LAYER_COUNTS.to_vec(),
            iterations: constants::DEFAULT_ITERATIONS,
            unmount: RetryConfig::default(),
            verify: false,
        }
    }
}

impl BenchConfig {
    /// Loads a configuration from a JSON file; missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MountatError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a meaningful run.
    ///
    /// # Errors
    ///
    /// Returns [`MountatError::Config`] describing the invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(MountatError::Config {
                message: "at least one layer count is required".into(),
            });
        }
        if self.layers.contains(&0) {
            return Err(MountatError::Config {
                message: "layer counts must be at least 1".into(),
            });
        }
        if self.iterations == 0 {
            return Err(MountatError::Config {
                message: "iterations must be at least 1".into(),
            });
        }
        if self.unmount.max_attempts == 0 {
            return Err(MountatError::Config {
                message: "unmount.max_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Bounded retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::UNMOUNT_MAX_ATTEMPTS,
            interval_ms: constants::UNMOUNT_INTERVAL_MS,
        }
    }
}

impl RetryConfig {
    /// Delay between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_layer_counts() {
        let config = BenchConfig::default();
        assert_eq!(config.layers, vec![16, 32, 64, 128]);
        assert_eq!(config.unmount.max_attempts, 50);
        assert_eq!(config.unmount.interval(), Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bench.json");
        std::fs::write(&path, r#"{"layers":[4],"unmount":{"interval_ms":5}}"#).expect("write");

        let config = BenchConfig::load(&path).expect("load");
        assert_eq!(config.layers, vec![4]);
        assert_eq!(config.iterations, 10);
        assert_eq!(config.unmount.max_attempts, 50);
        assert_eq!(config.unmount.interval_ms, 5);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = BenchConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MountatError::Io { .. }));
    }

    #[test]
    fn validate_rejects_zero_layers() {
        let config = BenchConfig {
            layers: vec![8, 0],
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_iterations() {
        let config = BenchConfig {
            iterations: 0,
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
