//! Common test utilities for distribute-engine integration tests
//!
//! In-memory datastores share their state through an `Arc`, so a test can
//! hand a clone to the engine and inspect the contents afterwards.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{MemoryStore, TestProvider};
//!
//! let store = MemoryStore::new("objectstore").with_file("a.csv", b"x", 100);
//! let provider = TestProvider::new().with_store(store.clone());
//! ```

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use distribute_engine::catalogue::{CatalogueProducts, ExportProducts};
use distribute_engine::datastore::{
    Datastore, DatastoreProvider, Destination, ObjectInfo, ObjectStore, DIRECTORY_CONTENT_TYPE,
};
use distribute_engine::error::{DatastoreError, DatastoreResult, DistributeError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Initialize tracing for tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("distribute_engine=debug")
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub data: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
    pub directory: bool,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub files: BTreeMap<String, StoredFile>,
    pub connected: bool,
    pub connects: usize,
    pub disconnects: usize,
    pub deleted: Vec<String>,
    pub uploaded: Vec<String>,
}

/// Datastore holding its files in memory
#[derive(Clone)]
pub struct MemoryStore {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    can_delete: bool,
    failing_deletes: Arc<HashSet<String>>,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(MemoryState::default())),
            can_delete: true,
            failing_deletes: Arc::new(HashSet::new()),
        }
    }

    pub fn with_file(self, path: &str, data: &[u8], ts: i64) -> Self {
        self.state.lock().unwrap().files.insert(
            path.to_string(),
            StoredFile {
                data: data.to_vec(),
                last_modified: DateTime::<Utc>::from_timestamp(ts, 0),
                directory: false,
            },
        );
        self
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.state.lock().unwrap().files.insert(
            path.to_string(),
            StoredFile {
                data: Vec::new(),
                last_modified: None,
                directory: true,
            },
        );
        self
    }

    pub fn without_delete(mut self) -> Self {
        self.can_delete = false;
        self
    }

    pub fn failing_delete(mut self, path: &str) -> Self {
        let mut failing = (*self.failing_deletes).clone();
        failing.insert(path.to_string());
        self.failing_deletes = Arc::new(failing);
        self
    }

    /// Paths of all regular files
    pub fn paths(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|(_, f)| !f.directory)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).map(|f| f.data.clone())
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    fn ensure_connected(&self) -> DatastoreResult<()> {
        if self.state.lock().unwrap().connected {
            Ok(())
        } else {
            Err(DatastoreError::NotConnected(self.name.clone()))
        }
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> DatastoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> DatastoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> DatastoreResult<Vec<String>> {
        self.ensure_connected()?;
        let prefix = if dir.is_empty() || dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };
        Ok(self
            .paths()
            .into_iter()
            .filter(|p| p.starts_with(&prefix))
            .collect())
    }

    async fn get_object(&self, name: &str) -> DatastoreResult<(ObjectInfo, Vec<u8>)> {
        self.ensure_connected()?;
        let state = self.state.lock().unwrap();
        let file = state
            .files
            .get(name)
            .ok_or_else(|| DatastoreError::NotFound(name.to_string()))?;
        Ok((
            ObjectInfo {
                name: name.to_string(),
                last_modified: file.last_modified,
                content_type: None,
                size: file.data.len() as u64,
            },
            file.data.clone(),
        ))
    }

    async fn put_file(&self, local_path: &Path, dest_path: &str) -> DatastoreResult<()> {
        self.ensure_connected()?;
        let data = std::fs::read(local_path)?;
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            dest_path.to_string(),
            StoredFile {
                data,
                last_modified: Some(Utc::now()),
                directory: false,
            },
        );
        state.uploaded.push(dest_path.to_string());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> DatastoreResult<()> {
        self.ensure_connected()?;
        if self.failing_deletes.contains(path) {
            return Err(DatastoreError::operation("delete", path, "permission denied"));
        }
        let mut state = self.state.lock().unwrap();
        state
            .files
            .remove(path)
            .ok_or_else(|| DatastoreError::NotFound(path.to_string()))?;
        state.deleted.push(path.to_string());
        Ok(())
    }

    fn can_list_file(&self) -> bool {
        true
    }

    fn can_delete_file(&self) -> bool {
        self.can_delete
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self) -> DatastoreResult<Vec<ObjectInfo>> {
        self.ensure_connected()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .iter()
            .map(|(name, f)| ObjectInfo {
                name: name.clone(),
                last_modified: f.last_modified,
                content_type: f.directory.then(|| DIRECTORY_CONTENT_TYPE.to_string()),
                size: f.data.len() as u64,
            })
            .collect())
    }
}

/// Provider over a fixed set of memory stores
#[derive(Default, Clone)]
pub struct TestProvider {
    stores: HashMap<String, (MemoryStore, String)>,
}

impl TestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.stores.insert(store.name.clone(), (store, String::new()));
        self
    }

    pub fn with_destination(mut self, store: MemoryStore, base_directory: &str) -> Self {
        self.stores
            .insert(store.name.clone(), (store, base_directory.to_string()));
        self
    }

    fn get(&self, name: &str) -> DatastoreResult<(MemoryStore, String)> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| DatastoreError::UnknownDatastore(name.to_string()))
    }
}

#[async_trait]
impl DatastoreProvider for TestProvider {
    async fn object_store(&self, name: &str) -> DatastoreResult<Box<dyn ObjectStore>> {
        let (mut store, _) = self.get(name)?;
        store.connect().await?;
        Ok(Box::new(store))
    }

    async fn destination(&self, name: &str) -> DatastoreResult<Destination> {
        let (mut store, base_directory) = self.get(name)?;
        store.connect().await?;
        Ok(Destination {
            datastore: Box::new(store),
            base_directory,
        })
    }
}

/// Export catalogue returning a fixed document
#[derive(Clone, Default)]
pub struct StaticProducts {
    products: CatalogueProducts,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl StaticProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, collection: &str, product: &str, files: &[&str]) -> Self {
        self.products
            .entry(collection.to_string())
            .or_default()
            .insert(product.to_string(), files.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExportProducts for StaticProducts {
    async fn get_products(&self, _catalogue: &str) -> distribute_engine::Result<CatalogueProducts> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DistributeError::remote("GET /products returned HTTP 503"));
        }
        Ok(self.products.clone())
    }
}
