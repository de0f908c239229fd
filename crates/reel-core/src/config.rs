use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const BASE_URL_ENV: &str = "REEL_API_BASE_URL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub lifecycle: LifecycleConfig,
    pub notifications: NotificationConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply_base_url_override(&mut self, base_url: Option<String>) {
        if let Some(base_url) = base_url.filter(|value| !value.trim().is_empty()) {
            self.api.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    pub workflow_interval_ms: u64,
    pub ab_status_interval_ms: u64,
    pub workflow_list_interval_ms: u64,
    pub health_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            workflow_interval_ms: 2_000,
            ab_status_interval_ms: 5_000,
            workflow_list_interval_ms: 5_000,
            health_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub redirect_grace_ms: u64,
    pub waiting_impressions_threshold: u64,
    pub test_window_hours: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            redirect_grace_ms: 3_000,
            waiting_impressions_threshold: 50,
            test_window_hours: 72,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    pub ttl_ms: u64,
    pub capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 4_000,
            capacity: 32,
        }
    }
}
