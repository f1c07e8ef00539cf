//! Configuration loading for platescan
//!
//! Resolution priority per key, highest first:
//! 1. Environment variable (`PLATESCAN_*`)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5810
}

/// Object-detection oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Hosted inference endpoint, e.g. `https://detect.example.com/plates/2`
    pub endpoint_url: String,
    pub api_key: String,
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,
    #[serde(default = "default_overlap")]
    pub overlap_threshold: f32,
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_confidence() -> f32 {
    0.3
}

fn default_overlap() -> f32 {
    0.3
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

/// Layout-parsing OCR oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub endpoint_url: String,
    pub token: String,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_ocr_timeout() -> u64 {
    60
}

/// Language-model oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint_url: String,
    pub api_key: String,
    pub model: String,
}

/// Vehicle registry datastore + object storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry service (REST + storage under one host)
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,
}

fn default_bucket() -> String {
    "plate-crops".to_string()
}

/// Full service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatescanConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub detector: DetectorConfig,
    pub ocr: OcrConfig,
    pub llm: LlmConfig,
    pub registry: RegistryConfig,
}

impl PlatescanConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
        let mut config: PlatescanConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?;
        config.apply_env_overrides();
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Apply `PLATESCAN_*` environment variables over file-sourced values.
    pub fn apply_env_overrides(&mut self) {
        override_string("PLATESCAN_HOST", &mut self.server.host);
        if let Ok(port) = std::env::var("PLATESCAN_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid PLATESCAN_PORT"),
            }
        }
        override_string("PLATESCAN_DETECTOR_URL", &mut self.detector.endpoint_url);
        override_string("PLATESCAN_DETECTOR_API_KEY", &mut self.detector.api_key);
        override_string("PLATESCAN_OCR_URL", &mut self.ocr.endpoint_url);
        override_string("PLATESCAN_OCR_TOKEN", &mut self.ocr.token);
        override_string("PLATESCAN_LLM_URL", &mut self.llm.endpoint_url);
        override_string("PLATESCAN_LLM_API_KEY", &mut self.llm.api_key);
        override_string("PLATESCAN_LLM_MODEL", &mut self.llm.model);
        override_string("PLATESCAN_REGISTRY_URL", &mut self.registry.url);
        override_string("PLATESCAN_REGISTRY_API_KEY", &mut self.registry.api_key);
        override_string("PLATESCAN_STORAGE_BUCKET", &mut self.registry.storage_bucket);
    }

    /// Validate that every credential-bearing field is non-empty.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("detector.api_key", &self.detector.api_key),
            ("ocr.token", &self.ocr.token),
            ("llm.api_key", &self.llm.api_key),
            ("registry.api_key", &self.registry.api_key),
        ];
        for (name, value) in checks {
            if value.trim().is_empty() {
                return Err(Error::Config(format!(
                    "{} is not configured (set it in the config file or via PLATESCAN_* environment)",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            info!(var = var, "Using environment override");
            *target = value;
        }
    }
}
