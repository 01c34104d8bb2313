//! Configuration management

use crate::error::{DistributeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Deployment Constants
// ============================================================================

/// Default deployment environment (also the object store container).
pub const DEFAULT_CONTAINER_BASE: &str = "development";

/// Default name of the primary object store in the datastore registry.
pub const DEFAULT_PRIMARY_DATASTORE: &str = "objectstore";

/// Default location of the datastore registry file.
pub const DEFAULT_DATASTORE_CONFIG_FILE: &str = "datastores.json";

// ============================================================================
// Export API Constants
// ============================================================================

/// Default export products service.
pub const DEFAULT_EXPORT_API_HOST: &str = "http://localhost:8168";

/// Default request timeout in seconds.
pub const DEFAULT_EXPORT_API_TIMEOUT_SECS: u64 = 60;

/// Default number of attempts for retryable failures.
pub const DEFAULT_EXPORT_API_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts in milliseconds (doubled per attempt).
pub const DEFAULT_EXPORT_API_BACKOFF_MS: u64 = 1000;

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub container_base: String,
    pub primary_datastore: String,
    pub datastore_config_file: PathBuf,
    pub export_api: ExportApiSettings,
}

/// Export products endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportApiSettings {
    pub host: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl ExportApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Load settings from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Self::from_env();
        settings.validate()?;
        Ok(settings)
    }

    /// Read the environment without touching `.env` or validating
    pub fn from_env() -> Self {
        Self {
            container_base: env_or("CONTAINER_BASE", DEFAULT_CONTAINER_BASE),
            primary_datastore: env_or("PRIMARY_DATASTORE", DEFAULT_PRIMARY_DATASTORE),
            datastore_config_file: PathBuf::from(env_or(
                "DATASTORE_CONFIG_FILE",
                DEFAULT_DATASTORE_CONFIG_FILE,
            )),
            export_api: ExportApiSettings {
                host: env_or("EXPORT_API_HOST", DEFAULT_EXPORT_API_HOST),
                timeout_secs: env_parse("EXPORT_API_TIMEOUT_SECS", DEFAULT_EXPORT_API_TIMEOUT_SECS),
                max_retries: env_parse("EXPORT_API_MAX_RETRIES", DEFAULT_EXPORT_API_MAX_RETRIES),
                backoff_ms: env_parse("EXPORT_API_BACKOFF_MS", DEFAULT_EXPORT_API_BACKOFF_MS),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.container_base.trim().is_empty() {
            return Err(DistributeError::settings("CONTAINER_BASE cannot be empty"));
        }

        if self.container_base.contains('/') {
            return Err(DistributeError::settings(format!(
                "CONTAINER_BASE must be a single path segment, got '{}'",
                self.container_base
            )));
        }

        if self.primary_datastore.trim().is_empty() {
            return Err(DistributeError::settings("PRIMARY_DATASTORE cannot be empty"));
        }

        if !self.export_api.host.starts_with("http://") && !self.export_api.host.starts_with("https://")
        {
            return Err(DistributeError::settings(format!(
                "EXPORT_API_HOST must be an http(s) URL, got '{}'",
                self.export_api.host
            )));
        }

        if self.export_api.max_retries == 0 {
            return Err(DistributeError::settings("EXPORT_API_MAX_RETRIES must be greater than 0"));
        }

        if self.export_api.timeout_secs == 0 {
            tracing::warn!("EXPORT_API_TIMEOUT_SECS is 0 - requests to the export API will time out immediately");
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            container_base: DEFAULT_CONTAINER_BASE.to_string(),
            primary_datastore: DEFAULT_PRIMARY_DATASTORE.to_string(),
            datastore_config_file: PathBuf::from(DEFAULT_DATASTORE_CONFIG_FILE),
            export_api: ExportApiSettings {
                host: DEFAULT_EXPORT_API_HOST.to_string(),
                timeout_secs: DEFAULT_EXPORT_API_TIMEOUT_SECS,
                max_retries: DEFAULT_EXPORT_API_MAX_RETRIES,
                backoff_ms: DEFAULT_EXPORT_API_BACKOFF_MS,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 7] = [
        "CONTAINER_BASE",
        "PRIMARY_DATASTORE",
        "DATASTORE_CONFIG_FILE",
        "EXPORT_API_HOST",
        "EXPORT_API_TIMEOUT_SECS",
        "EXPORT_API_MAX_RETRIES",
        "EXPORT_API_BACKOFF_MS",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let settings = Settings::from_env();
        assert_eq!(settings.container_base, "development");
        assert_eq!(settings.primary_datastore, "objectstore");
        assert_eq!(settings.export_api.host, "http://localhost:8168");
        assert_eq!(settings.export_api.max_retries, 3);
        assert_eq!(settings.export_api.backoff(), Duration::from_secs(1));
        settings.validate().unwrap();
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("CONTAINER_BASE", "acceptatie");
        std::env::set_var("EXPORT_API_HOST", "http://export:8080");
        std::env::set_var("EXPORT_API_MAX_RETRIES", "5");
        std::env::set_var("EXPORT_API_TIMEOUT_SECS", "not-a-number");

        let settings = Settings::from_env();
        clear_env();

        assert_eq!(settings.container_base, "acceptatie");
        assert_eq!(settings.export_api.host, "http://export:8080");
        assert_eq!(settings.export_api.max_retries, 5);
        assert_eq!(settings.export_api.timeout_secs, DEFAULT_EXPORT_API_TIMEOUT_SECS);
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let mut settings = Settings::default();
        settings.export_api.host = "localhost:8168".into();
        assert!(matches!(settings.validate(), Err(DistributeError::Settings(_))));
    }

    #[test]
    fn test_validate_rejects_nested_container() {
        let mut settings = Settings::default();
        settings.container_base = "a/b".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut settings = Settings::default();
        settings.export_api.max_retries = 0;
        assert!(settings.validate().is_err());
    }
}
