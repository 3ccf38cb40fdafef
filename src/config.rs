//! Engine configuration
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! yields a working configuration. Values are range-checked by
//! [`EngineConfig::validate`] after loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub context: ContextConfig,
    pub validator: ValidatorConfig,
    pub dedup: DedupConfig,
}

/// Relationship detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Pairs without keyword evidence and with context strength below this are pruned
    /// Pairs with context strength below this are never scored further
    pub context_floor: f32,
    /// Default candidate threshold for `detect`
    pub min_strength: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            context_floor: 0.1,
            min_strength: 0.5,
        }
    }
}

/// Location-proximity tiers, in pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub near_page_window: u32,
    pub far_page_window: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            near_page_window: 1,
            far_page_window: 3,
        }
    }
}

/// External validator call limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum validator calls in flight
    pub concurrency: usize,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// llm-orc ensemble invoked by the network validator
    pub ensemble: String,
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_ms: 30_000,
            ensemble: "concept-relationship-judgment".to_string(),
        }
    }
}

/// Pre-filter applied before pairwise similarity scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blocking {
    /// Score every pair
    #[default]
    None,
    /// Only score pairs whose terms share a first alphanumeric character
    TermPrefix,
}

/// Duplicate detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub threshold: f32,
    pub blocking: Blocking,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            blocking: Blocking::None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = if yaml.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::load(p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("classifier.context_floor", self.classifier.context_floor)?;
        check_unit("classifier.min_strength", self.classifier.min_strength)?;
        check_unit("dedup.threshold", self.dedup.threshold)?;
        if self.validator.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "validator.concurrency must be at least 1".to_string(),
            ));
        }
        if self.validator.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "validator.timeout_ms must be positive".to_string(),
            ));
        }
        if self.context.near_page_window > self.context.far_page_window {
            return Err(ConfigError::Invalid(format!(
                "context.near_page_window ({}) exceeds far_page_window ({})",
                self.context.near_page_window, self.context.far_page_window
            )));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be in [0, 1], got {}", name, value)))
    }
}

/// Default config location (~/.config/concord/config.yaml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("concord").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = EngineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.dedup.threshold, 0.95);
        assert_eq!(config.validator.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = "validator:\n  concurrency: 2\ndedup:\n  blocking: term_prefix\n";
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.validator.concurrency, 2);
        assert_eq!(config.validator.timeout_ms, 30_000);
        assert_eq!(config.dedup.blocking, Blocking::TermPrefix);
        assert_eq!(config.classifier, ClassifierConfig::default());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = EngineConfig::from_yaml_str("dedup:\n  threshold: 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = EngineConfig::from_yaml_str("validator:\n  concurrency: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "classifier:\n  min_strength: 0.3").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.classifier.min_strength, 0.3);
    }
}
