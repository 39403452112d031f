//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub locator: LocatorConfig,

    #[serde(default)]
    pub bus: BusConfig,
}

/// Collaborator API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Language requested for tooltips.
    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            lang: default_lang(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Element locator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// How long to wait for a selector to appear.
    #[serde(default = "default_locate_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_locate_timeout_ms(),
        }
    }
}

fn default_locate_timeout_ms() -> u64 {
    5000
}

/// Message bus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Caller-side timeout for runtime requests.
    #[serde(default = "default_bus_timeout_ms")]
    pub request_timeout_ms: u64,

    /// URL patterns of tabs hosting the web application. Picker results are
    /// broadcast to matching tabs; empty means every tab.
    #[serde(default)]
    pub web_app_urls: Vec<String>,

    /// Origins allowed on the external channel.
    #[serde(default)]
    pub allowed_external_origins: Vec<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_bus_timeout_ms(),
            web_app_urls: Vec::new(),
            allowed_external_origins: Vec::new(),
        }
    }
}

fn default_bus_timeout_ms() -> u64 {
    10_000
}

/// Default configuration file location (`~/.waymark/config.toml`).
pub fn default_config_path() -> PathBuf {
    waymark_dir().join("config.toml")
}

/// The `~/.waymark` directory.
pub fn waymark_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".waymark"))
        .unwrap_or_else(|| PathBuf::from(".waymark"))
}
