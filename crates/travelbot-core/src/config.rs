use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{ChatError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
pub const ENDPOINT_ENV: &str = "TRAVELBOT_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the chat backend; requests go to `{endpoint}/api/chat`.
    pub endpoint: String,
    /// Where the conversation is saved. `None` uses the platform data dir.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_probe_interval() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            store_path: None,
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl Config {
    /// Load from the config file, then apply the environment override.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint;
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&config_content)
            .map_err(|e| ChatError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ChatError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let config_content = serde_json::to_string_pretty(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, config_content)
            .map_err(|e| ChatError::Config(format!("Failed to write config: {}", e)))?;
        Ok(())
    }

    /// URL the chat transport posts to.
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.endpoint.trim_end_matches('/'))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChatError::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("travelbot").join("config.json"))
    }
}
