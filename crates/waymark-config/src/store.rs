//! Loaded configuration with persist-on-change.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::loader::ConfigLoader;
use crate::schema::ExtensionConfig;

/// Configuration owned by the background process.
///
/// Handlers read a snapshot; every mutation is written to disk before it
/// becomes visible, so a failed write leaves the in-memory state untouched.
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: RwLock<ExtensionConfig>,
}

impl ConfigStore {
    /// Load the configuration at `path`, falling back to defaults when the
    /// file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = match ConfigLoader::load(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(ConfigError::NotFound(_)) => {
                info!("No config at {}, using defaults", path.display());
                ExtensionConfig::default()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path: Some(path),
            config: RwLock::new(config),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(config: ExtensionConfig) -> Self {
        Self {
            path: None,
            config: RwLock::new(config),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current configuration.
    pub fn snapshot(&self) -> ExtensionConfig {
        self.config.read().clone()
    }

    /// Replace the API token.
    pub fn set_api_token(&self, token: impl Into<String>) -> Result<(), ConfigError> {
        let token = token.into();
        let token = token.trim();
        self.update(|config| {
            config.api.token = if token.is_empty() {
                None
            } else {
                Some(token.to_string())
            };
            Ok(())
        })
    }

    /// Replace the API base URL. Trailing slashes are dropped.
    pub fn set_api_url(&self, url: impl Into<String>) -> Result<(), ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/');
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url".to_string(),
                message: "must start with http:// or https://".to_string(),
            });
        }
        self.update(|config| {
            config.api.base_url = url.to_string();
            Ok(())
        })
    }

    /// Apply `f` to a copy, persist it, then publish it.
    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut ExtensionConfig) -> Result<(), ConfigError>,
    {
        let mut guard = self.config.write();
        let mut next = guard.clone();
        f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, config: &ExtensionConfig) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(config)?)?;
        debug!("Persisted config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(dir.path().join("config.toml")).unwrap();
        assert_eq!(store.snapshot(), ExtensionConfig::default());
    }

    #[test]
    fn test_set_token_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let store = ConfigStore::open(&path).unwrap();

        store.set_api_token("tok-1").unwrap();
        assert_eq!(store.snapshot().api.token.as_deref(), Some("tok-1"));

        let reloaded = ConfigStore::open(&path).unwrap();
        assert_eq!(reloaded.snapshot().api.token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_empty_token_clears() {
        let store = ConfigStore::in_memory(ExtensionConfig::default());
        store.set_api_token("abc").unwrap();
        store.set_api_token("   ").unwrap();
        assert!(store.snapshot().api.token.is_none());
    }

    #[test]
    fn test_set_url_trims_trailing_slash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::open(&path).unwrap();
        store.set_api_url("https://guides.example.com/api/").unwrap();

        let reloaded = ConfigStore::open(&path).unwrap();
        assert_eq!(reloaded.snapshot().api.base_url, "https://guides.example.com/api");
    }

    #[test]
    fn test_set_url_rejects_non_http() {
        let store = ConfigStore::in_memory(ExtensionConfig::default());
        let result = store.set_api_url("ftp://files.example.com");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert_eq!(store.snapshot().api.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn test_failed_update_leaves_state() {
        let store = ConfigStore::in_memory(ExtensionConfig::default());
        let result = store.update(|config| {
            config.locator.timeout_ms = 1;
            Err(ConfigError::InvalidValue {
                field: "locator.timeout_ms".to_string(),
                message: "too small".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().locator.timeout_ms, 5000);
    }

    #[test]
    fn test_open_invalid_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbroken").unwrap();
        assert!(ConfigStore::open(&path).is_err());
    }
}
