use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Settings for the [`crate::dispatcher::CryptoDispatcher`] worker pool.
///
/// ```yaml
/// max_concurrent_tasks: 4
/// refresh_kappa: 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How many crypto operations may run on the blocking pool at the same time.
    pub max_concurrent_tasks: usize,
    /// The cut-and-choose parameter used for new refresh sessions.
    pub refresh_kappa: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let max_concurrent_tasks = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { max_concurrent_tasks, refresh_kappa: 3 }
    }
}

impl DispatcherConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid("max_concurrent_tasks must be at least 1".into()));
        }
        if self.refresh_kappa == 0 {
            return Err(ConfigError::Invalid("refresh_kappa must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error reading configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error decoding configuration: {0}")]
    Serde(#[from] serde_yml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
