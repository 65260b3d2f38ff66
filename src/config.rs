// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_source_length: usize,
    pub min_source_length: usize,
    pub timeout_seconds: u64,
    pub worker_threads: usize,
    pub enable_literal_decoding: bool,
    pub enable_control_flow: bool,
    pub enable_vm_reconstruction: bool,
    pub enable_anti_tamper: bool,
    pub scoring: ScoringConfig,
    pub summary_entries: usize,
    pub output_prefix: String,
    pub default_filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub baseline: u32,
    pub per_change: u32,
    pub weight_signatures: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            baseline: 50,
            per_change: 5,
            weight_signatures: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_source_length: 5 * 1024 * 1024,
            min_source_length: 5,
            timeout_seconds: 60,
            worker_threads: num_cpus::get(),
            enable_literal_decoding: true,
            enable_control_flow: true,
            enable_vm_reconstruction: true,
            enable_anti_tamper: true,
            scoring: ScoringConfig::default(),
            summary_entries: 15,
            output_prefix: "deobfuscated_".to_string(),
            default_filename: "script.lua".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_max_source_length(mut self, length: usize) -> Self {
        self.max_source_length = length;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.worker_threads == 0 {
            return Err("worker_threads must be greater than 0".to_string());
        }
        if self.timeout_seconds == 0 {
            return Err("timeout_seconds must be greater than 0".to_string());
        }
        if self.min_source_length > self.max_source_length {
            return Err("min_source_length must not exceed max_source_length".to_string());
        }
        if self.scoring.baseline > 100 {
            return Err("scoring.baseline must be between 0 and 100".to_string());
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err("output_prefix must not contain path separators".to_string());
        }
        Ok(())
    }
}
