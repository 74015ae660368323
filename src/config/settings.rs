//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::plugin::PluginKind;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body; images arrive base64-encoded
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

/// Inference worker hosting the inpainting models and plugins
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_worker_timeout")]
    pub timeout_ms: u64,
}

fn default_worker_endpoint() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_worker_timeout() -> u64 {
    600_000
}

/// Inpainting model selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub disable_model_switch: bool,
    /// Offer ControlNet conditioning when the active backend supports it
    #[serde(default)]
    pub enable_controlnet: bool,
    #[serde(default)]
    pub controlnet_method: Option<String>,
}

fn default_model_name() -> String {
    "lama".to_string()
}

/// Input/output locations and encoding quality
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    95
}

impl StorageConfig {
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(PathBuf::from)
    }

    pub fn input_path(&self) -> Option<PathBuf> {
        self.input.as_ref().map(PathBuf::from)
    }
}

/// A plugin enabled at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginConfig {
    pub name: PluginKind,
    /// Selected sub-model, for plugins that have a model catalog
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides `worker.endpoint` for this plugin
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Correlation cache bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

fn default_max_entries() -> usize {
    64
}

fn default_ttl() -> u64 {
    6 * 60 * 60
}

/// Outbound fetches for the ingestion path
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_ms: u64,
}

fn default_fetch_timeout() -> u64 {
    30_000
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    20
}

fn default_burst() -> u32 {
    40
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.max_body_bytes", default_max_body_bytes() as i64)?
            .set_default("worker.endpoint", default_worker_endpoint())?
            .set_default("worker.timeout_ms", default_worker_timeout() as i64)?
            .set_default("model.name", default_model_name())?
            .set_default("model.disable_model_switch", false)?
            .set_default("model.enable_controlnet", false)?
            .set_default("storage.quality", default_quality() as i64)?
            .set_default("cache.max_entries", default_max_entries() as i64)?
            .set_default("cache.ttl_secs", default_ttl() as i64)?
            .set_default("fetch.timeout_ms", default_fetch_timeout() as i64)?
            .set_default("rate_limit.enabled", false)?
            .set_default("rate_limit.requests_per_second", default_rps() as i64)?
            .set_default("rate_limit.burst_size", default_burst() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with INPAINT_GATEWAY_)
            .add_source(
                Environment::with_prefix("INPAINT_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.server.max_body_bytes == 0 {
            return Err(invalid("Server max_body_bytes must be at least 1"));
        }

        if self.worker.endpoint.trim().is_empty() {
            return Err(invalid("Worker endpoint cannot be empty"));
        }

        if !(1..=100).contains(&self.storage.quality) {
            return Err(invalid(format!(
                "Storage quality must be within 1..=100, got {}",
                self.storage.quality
            )));
        }

        if self.cache.max_entries == 0 {
            return Err(invalid("Cache max_entries must be at least 1"));
        }

        let mut seen = HashSet::new();
        for plugin in &self.plugins {
            if !seen.insert(plugin.name) {
                return Err(invalid(format!(
                    "Plugin '{}' is configured more than once",
                    plugin.name.as_str()
                )));
            }
        }

        Ok(())
    }

    /// Configured plugin entry by plugin name
    pub fn plugin(&self, name: &str) -> Option<&PluginConfig> {
        self.plugins.iter().find(|p| p.name.as_str() == name)
    }

    /// Mutable plugin entry by plugin name
    pub fn plugin_mut(&mut self, name: &str) -> Option<&mut PluginConfig> {
        self.plugins.iter_mut().find(|p| p.name.as_str() == name)
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                max_body_bytes: default_max_body_bytes(),
            },
            worker: WorkerConfig {
                endpoint: default_worker_endpoint(),
                timeout_ms: default_worker_timeout(),
            },
            model: ModelConfig {
                name: default_model_name(),
                disable_model_switch: false,
                enable_controlnet: false,
                controlnet_method: None,
            },
            storage: StorageConfig {
                output_dir: None,
                input: None,
                quality: default_quality(),
            },
            plugins: vec![],
            cache: CacheConfig {
                max_entries: default_max_entries(),
                ttl_secs: default_ttl(),
            },
            fetch: FetchConfig {
                timeout_ms: default_fetch_timeout(),
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: default_rps(),
                burst_size: default_burst(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
