use crate::error::{DocforgeError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServicesConfig
// ---------------------------------------------------------------------------

/// Endpoints of the external retrieval and generation services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_retrieval_url")]
    pub retrieval_url: String,
    #[serde(default = "default_generation_url")]
    pub generation_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

fn default_retrieval_url() -> String {
    "http://localhost:8091".to_string()
}

fn default_generation_url() -> String {
    "http://localhost:8092".to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            retrieval_url: default_retrieval_url(),
            generation_url: default_generation_url(),
            api_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt, so total attempts = max_retries + 1.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events replayed to a reconnecting subscriber.
    #[serde(default = "default_backlog_size")]
    pub backlog_size: usize,
}

fn default_backlog_size() -> usize {
    64
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            backlog_size: default_backlog_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Terminal rows older than this are eligible for pruning.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// A run silent for longer than this is treated as dead on recovery.
    #[serde(default = "default_liveness_timeout_minutes")]
    pub liveness_timeout_minutes: u32,
}

fn default_retention_days() -> u32 {
    30
}

fn default_liveness_timeout_minutes() -> u32 {
    15
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            liveness_timeout_minutes: default_liveness_timeout_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3900
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            services: ServicesConfig::default(),
            retry: RetryConfig::default(),
            events: EventsConfig::default(),
            ledger: LedgerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(DocforgeError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (name, url) in [
            ("services.retrieval_url", &self.services.retrieval_url),
            ("services.generation_url", &self.services.generation_url),
        ] {
            if url.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{name} is empty"),
                });
            } else if !url.starts_with("http://") && !url.starts_with("https://") {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{name} does not look like an http(s) URL: {url}"),
                });
            }
        }

        if self.retry.max_retries > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "retry.max_retries = {} will hold a project lock for a long time",
                    self.retry.max_retries
                ),
            });
        }
        if self.retry.multiplier < 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "retry.multiplier = {} shrinks the backoff instead of growing it",
                    self.retry.multiplier
                ),
            });
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "retry.max_delay_ms is below retry.base_delay_ms".to_string(),
            });
        }

        if self.events.backlog_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "events.backlog_size = 0 disables reconnect replay".to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.retry.max_retries, 3);
        assert_eq!(loaded.retry.base_delay_ms, 1_000);
        assert_eq!(loaded.events.backlog_size, 64);
        assert_eq!(loaded.server.port, 3900);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        match Config::load(dir.path()) {
            Err(DocforgeError::NotInitialized) => {}
            other => panic!("expected NotInitialized, got {other:?}"),
        }
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let yaml = "version: 1\nretry:\n  max_retries: 5\n";
        crate::io::atomic_write(&paths::config_path(dir.path()), yaml.as_bytes()).unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.multiplier, 2.0);
        assert_eq!(cfg.ledger.retention_days, 30);
    }

    #[test]
    fn validate_flags_suspect_values() {
        let mut cfg = Config::default();
        cfg.services.retrieval_url = String::new();
        cfg.retry.max_retries = 50;
        cfg.retry.multiplier = 0.5;
        cfg.events.backlog_size = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn validate_clean_default() {
        assert!(Config::default().validate().is_empty());
    }
}
