//! Datastore connection parameters
//!
//! The registry file maps a datastore name to its connection parameters:
//!
//! ```json
//! {
//!   "objectstore": { "type": "objectstore", "region": "eu-west-1", "access_key": "...", "secret_key": "..." },
//!   "ftp-export": { "type": "ftp", "host": "ftp.example.org", "username": "gob", "password": "..." },
//!   "local-share": { "type": "local", "root": "/mnt/share" }
//! }
//! ```

use crate::error::{DatastoreError, DatastoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default region for S3-compatible stores
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Default FTP control port
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Connection parameters for one named datastore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatastoreConfig {
    Objectstore(ObjectStoreConfig),
    Ftp(FtpConfig),
    Local(LocalConfig),
}

impl DatastoreConfig {
    /// Directory prepended to every destination location
    ///
    /// Object stores already scope paths by bucket, so they default to no
    /// prefix; other backends default to `"{container_base}/"`.
    pub fn base_directory(&self, container_base: &str) -> String {
        let explicit = match self {
            DatastoreConfig::Objectstore(c) => c.base_directory.clone(),
            DatastoreConfig::Ftp(c) => c.base_directory.clone(),
            DatastoreConfig::Local(c) => c.base_directory.clone(),
        };

        match (explicit, self) {
            (Some(dir), _) => dir,
            (None, DatastoreConfig::Objectstore(_)) => String::new(),
            (None, _) => format!("{container_base}/"),
        }
    }
}

fn default_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

fn default_ftp_port() -> u16 {
    DEFAULT_FTP_PORT
}

/// S3-compatible object store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket name; the deployment container is used when absent
    pub bucket: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub path_style: bool,
    pub base_directory: Option<String>,
}

impl ObjectStoreConfig {
    /// Build from `S3_*` / `AWS_*` environment variables
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| default_region()),
            bucket: env::var("S3_BUCKET").ok(),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_default(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            base_directory: None,
        }
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: default_region(),
            bucket: Some(bucket.into()),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
            base_directory: None,
        }
    }
}

/// FTP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub base_directory: Option<String>,
}

/// Directory tree on the local filesystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub root: PathBuf,
    pub base_directory: Option<String>,
}

/// Read the registry file
///
/// A missing file yields an empty registry; a malformed one is an error.
pub fn load_registry(path: &Path) -> DatastoreResult<HashMap<String, DatastoreConfig>> {
    if !path.exists() {
        debug!(path = %path.display(), "No datastore registry file");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| DatastoreError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_document() {
        let doc = r#"{
            "objectstore": { "type": "objectstore", "access_key": "k", "secret_key": "s" },
            "ftp-export": { "type": "ftp", "host": "ftp.example.org", "username": "u", "password": "p" },
            "share": { "type": "local", "root": "/mnt/share", "base_directory": "" }
        }"#;
        let registry: HashMap<String, DatastoreConfig> = serde_json::from_str(doc).unwrap();

        let DatastoreConfig::Objectstore(store) = &registry["objectstore"] else {
            panic!("expected object store config");
        };
        assert_eq!(store.region, DEFAULT_S3_REGION);
        assert!(store.bucket.is_none());
        assert!(!store.path_style);

        let DatastoreConfig::Ftp(ftp) = &registry["ftp-export"] else {
            panic!("expected ftp config");
        };
        assert_eq!(ftp.port, DEFAULT_FTP_PORT);

        assert!(matches!(registry["share"], DatastoreConfig::Local(_)));
    }

    #[test]
    fn test_base_directory_defaults() {
        let store = DatastoreConfig::Objectstore(ObjectStoreConfig::for_minio("http://localhost:9000", "b"));
        assert_eq!(store.base_directory("acceptatie"), "");

        let ftp = DatastoreConfig::Ftp(FtpConfig {
            host: "h".into(),
            port: 21,
            username: "u".into(),
            password: "p".into(),
            base_directory: None,
        });
        assert_eq!(ftp.base_directory("acceptatie"), "acceptatie/");

        let local = DatastoreConfig::Local(LocalConfig {
            root: PathBuf::from("/tmp"),
            base_directory: Some("exports/".into()),
        });
        assert_eq!(local.base_directory("acceptatie"), "exports/");
    }

    #[test]
    fn test_missing_registry_file_is_empty() {
        let registry = load_registry(Path::new("/nonexistent/datastores.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let doc = r#"{ "x": { "type": "gopher", "host": "h" } }"#;
        assert!(serde_json::from_str::<HashMap<String, DatastoreConfig>>(doc).is_err());
    }
}
