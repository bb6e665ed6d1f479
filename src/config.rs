use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// External registry tool invocation.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolConfig {
    pub program: String,
    /// Arguments placed between the program and the RECmd options
    /// (e.g. the RECmd.dll path when running through `dotnet`).
    #[serde(default)]
    pub args_prefix: Vec<String>,
    pub batch_file: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    Native,
    SevenZip,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub task_name: String,
    pub tool: ToolConfig,
    pub heartbeat_interval_ms: u64,
    pub extractor: ExtractorKind,
    pub seven_zip_program: String,
    #[serde(default)]
    pub fail_on_tool_error: bool,
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::Invalid("tool.program is empty".to_string()));
        }
        if self.tool.batch_file.trim().is_empty() {
            return Err(ConfigError::Invalid("tool.batch_file is empty".to_string()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.extractor == ExtractorKind::SevenZip && self.seven_zip_program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "seven_zip_program is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WorkerConfig,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p)?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };

    let config: WorkerConfig = serde_yaml::from_slice(&bytes)?;
    config.validate()?;

    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}
