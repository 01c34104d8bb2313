//! Storage backends
//!
//! The synchronization logic only talks to the [`Datastore`] and
//! [`ObjectStore`] traits. Concrete adapters live in the submodules and are
//! built by name through a [`DatastoreProvider`].

use crate::error::{DatastoreError, DatastoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

pub mod config;
pub mod ftp;
pub mod local;
pub mod objectstore;

pub use config::{DatastoreConfig, FtpConfig, LocalConfig, ObjectStoreConfig};
pub use ftp::FtpDatastore;
pub use local::LocalDatastore;
pub use objectstore::ObjectDatastore;

/// Content type that marks a pseudo-directory entry in an object listing
pub const DIRECTORY_CONTENT_TYPE: &str = "application/directory";

/// Listing entry of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub size: u64,
}

impl ObjectInfo {
    pub fn is_directory(&self) -> bool {
        self.content_type.as_deref() == Some(DIRECTORY_CONTENT_TYPE)
    }
}

/// Capability set shared by every storage backend
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Name the datastore was configured under
    fn name(&self) -> &str;

    async fn connect(&mut self) -> DatastoreResult<()>;

    async fn disconnect(&mut self) -> DatastoreResult<()>;

    /// Paths of all files below `dir`, recursively
    async fn list_files(&self, dir: &str) -> DatastoreResult<Vec<String>>;

    async fn get_object(&self, name: &str) -> DatastoreResult<(ObjectInfo, Vec<u8>)>;

    async fn put_file(&self, local_path: &Path, dest_path: &str) -> DatastoreResult<()>;

    async fn delete_file(&self, path: &str) -> DatastoreResult<()>;

    fn can_list_file(&self) -> bool;

    fn can_delete_file(&self) -> bool;
}

/// Backends that expose a flat listing with per-object metadata
#[async_trait]
pub trait ObjectStore: Datastore {
    /// Every object in the container, directory markers included
    async fn list_objects(&self) -> DatastoreResult<Vec<ObjectInfo>>;
}

/// A connected destination backend and the directory prefix it writes under
pub struct Destination {
    pub datastore: Box<dyn Datastore>,
    pub base_directory: String,
}

/// Builds connected datastores by name
#[async_trait]
pub trait DatastoreProvider: Send + Sync {
    /// Connected object store used as source of files and configuration
    async fn object_store(&self, name: &str) -> DatastoreResult<Box<dyn ObjectStore>>;

    /// Connected destination backend
    async fn destination(&self, name: &str) -> DatastoreResult<Destination>;
}

/// Provider backed by the datastore registry file
pub struct DatastoreRegistry {
    configs: HashMap<String, DatastoreConfig>,
    container_base: String,
}

impl DatastoreRegistry {
    pub fn new(configs: HashMap<String, DatastoreConfig>, container_base: impl Into<String>) -> Self {
        Self {
            configs,
            container_base: container_base.into(),
        }
    }

    /// Register the primary object store from `S3_*` variables unless the
    /// registry file already defines it
    pub fn with_env_object_store(mut self, name: &str) -> Self {
        self.configs
            .entry(name.to_string())
            .or_insert_with(|| DatastoreConfig::Objectstore(ObjectStoreConfig::from_env()));
        self
    }

    fn config(&self, name: &str) -> DatastoreResult<&DatastoreConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| DatastoreError::UnknownDatastore(name.to_string()))
    }

    fn build(&self, name: &str) -> DatastoreResult<Box<dyn Datastore>> {
        Ok(match self.config(name)? {
            DatastoreConfig::Objectstore(c) => {
                Box::new(ObjectDatastore::new(name, c.clone(), &self.container_base))
            },
            DatastoreConfig::Ftp(c) => Box::new(FtpDatastore::new(name, c.clone())),
            DatastoreConfig::Local(c) => Box::new(LocalDatastore::new(name, c.root.clone())),
        })
    }
}

#[async_trait]
impl DatastoreProvider for DatastoreRegistry {
    async fn object_store(&self, name: &str) -> DatastoreResult<Box<dyn ObjectStore>> {
        let mut store: Box<dyn ObjectStore> = match self.config(name)? {
            DatastoreConfig::Objectstore(c) => {
                Box::new(ObjectDatastore::new(name, c.clone(), &self.container_base))
            },
            DatastoreConfig::Local(c) => Box::new(LocalDatastore::new(name, c.root.clone())),
            DatastoreConfig::Ftp(_) => {
                return Err(DatastoreError::Unsupported {
                    name: name.to_string(),
                    operation: "object listing",
                })
            },
        };

        info!(datastore = %name, "Connect to object store");
        store.connect().await?;
        Ok(store)
    }

    async fn destination(&self, name: &str) -> DatastoreResult<Destination> {
        let base_directory = self.config(name)?.base_directory(&self.container_base);
        let mut datastore = self.build(name)?;

        info!(datastore = %name, "Connect to destination");
        datastore.connect().await?;

        Ok(Destination {
            datastore,
            base_directory,
        })
    }
}
