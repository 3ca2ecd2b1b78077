use super::schema::FormLearnConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "FORMLEARN_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. `$FORMLEARN_CONFIG`
    /// 2. ./formlearn.yaml
    /// 3. ~/.formlearn/config.yaml
    /// 4. Default configuration
    pub async fn load_default() -> Result<FormLearnConfig, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            tracing::debug!("Loading config from ${}: {}", CONFIG_ENV_VAR, path.display());
            return Self::load_from(&path).await;
        }

        let local_config = PathBuf::from("./formlearn.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".formlearn").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(FormLearnConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<FormLearnConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        // An empty file means "all defaults"
        if content.trim().is_empty() {
            return Ok(FormLearnConfig::default());
        }
        let config: FormLearnConfig = serde_yaml::from_str(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
