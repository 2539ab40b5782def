use super::schema::SondeConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid battery step '{name}': {reason}")]
    InvalidStep { name: String, reason: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./sonde.yaml
    /// 2. ~/.sonde/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<SondeConfig, ConfigError> {
        // Check current directory
        let local_config = PathBuf::from("./sonde.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".sonde").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        // Return default
        Ok(SondeConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<SondeConfig, ConfigError> {
        info!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse YAML and reject battery steps that depend on, or set up
    /// through, a capability not defined earlier in the battery.
    pub fn parse(content: &str) -> Result<SondeConfig, ConfigError> {
        let config: SondeConfig = serde_yaml::from_str(content)?;
        // No battery section means the built-in one, which is known good
        let Some(battery) = &config.battery else {
            return Ok(config);
        };

        let mut seen: Vec<&str> = Vec::new();
        for step in &battery.steps {
            let name = step.descriptor.name.as_str();
            let earlier = [("requires", &step.requires), ("setup", &step.setup)];
            for (field, target) in earlier {
                if let Some(target) = target
                    && !seen.contains(&target.as_str())
                {
                    return Err(ConfigError::InvalidStep {
                        name: name.to_string(),
                        reason: format!("{} '{}', which does not run before it", field, target),
                    });
                }
            }
            // Later steps may refer to this one
            seen.push(name);
        }
        Ok(config)
    }
}
