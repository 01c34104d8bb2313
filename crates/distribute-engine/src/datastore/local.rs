//! Local filesystem datastore
//!
//! Stores paths as `/`-separated names relative to a root directory. Useful
//! for network shares mounted on the worker and for running the whole
//! pipeline against a directory tree instead of a remote object store.

use super::{Datastore, ObjectInfo, ObjectStore, DIRECTORY_CONTENT_TYPE};
use crate::error::{DatastoreError, DatastoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

/// Relative name, directory flag and metadata of a walked entry
type WalkEntry = (String, bool, std::fs::Metadata);

pub struct LocalDatastore {
    name: String,
    root: PathBuf,
    connected: bool,
}

impl LocalDatastore {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            connected: false,
        }
    }

    fn ensure_connected(&self) -> DatastoreResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DatastoreError::NotConnected(self.name.clone()))
        }
    }

    /// `path` below the root; parent components are rejected
    fn full_path(&self, path: &str) -> DatastoreResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(DatastoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Walk `start` below the root, depth first
    async fn walk(&self, start: PathBuf) -> DatastoreResult<Vec<WalkEntry>> {
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || -> DatastoreResult<Vec<WalkEntry>> {
            let mut entries = Vec::new();
            if !start.exists() {
                return Ok(entries);
            }

            for entry in WalkDir::new(&start).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    DatastoreError::operation("list", start.display().to_string(), e)
                })?;
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .map_err(|e| DatastoreError::operation("list", entry.path().display().to_string(), e))?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let metadata = entry.metadata().map_err(|e| {
                    DatastoreError::operation("stat", entry.path().display().to_string(), e)
                })?;
                entries.push((name, entry.file_type().is_dir(), metadata));
            }
            Ok(entries)
        })
        .await
        .map_err(|e| DatastoreError::operation("list", self.root.display().to_string(), e))?
    }
}

fn modified(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl Datastore for LocalDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> DatastoreResult<()> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| DatastoreError::connection(&self.name, e))?;
        if !metadata.is_dir() {
            return Err(DatastoreError::connection(
                &self.name,
                format!("{} is not a directory", self.root.display()),
            ));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> DatastoreResult<()> {
        self.connected = false;
        Ok(())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn list_files(&self, dir: &str) -> DatastoreResult<Vec<String>> {
        self.ensure_connected()?;
        let entries = self.walk(self.full_path(dir)?).await?;
        Ok(entries
            .into_iter()
            .filter(|(_, is_dir, _)| !is_dir)
            .map(|(name, _, _)| name)
            .collect())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn get_object(&self, name: &str) -> DatastoreResult<(ObjectInfo, Vec<u8>)> {
        self.ensure_connected()?;
        let path = self.full_path(name)?;

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatastoreError::NotFound(name.to_string()))
            },
            Err(e) => return Err(e.into()),
        };
        let metadata = tokio::fs::metadata(&path).await?;

        Ok((
            ObjectInfo {
                name: name.to_string(),
                last_modified: modified(&metadata),
                content_type: None,
                size: data.len() as u64,
            },
            data,
        ))
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn put_file(&self, local_path: &Path, dest_path: &str) -> DatastoreResult<()> {
        self.ensure_connected()?;
        let target = self.full_path(dest_path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| DatastoreError::operation("put", dest_path, e))?;

        debug!("Copied {} bytes to {}", size, target.display());
        Ok(())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn delete_file(&self, path: &str) -> DatastoreResult<()> {
        self.ensure_connected()?;
        match tokio::fs::remove_file(self.full_path(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DatastoreError::NotFound(path.to_string()))
            },
            Err(e) => Err(DatastoreError::operation("delete", path, e)),
        }
    }

    fn can_list_file(&self) -> bool {
        true
    }

    fn can_delete_file(&self) -> bool {
        true
    }
}

#[async_trait]
impl ObjectStore for LocalDatastore {
    async fn list_objects(&self) -> DatastoreResult<Vec<ObjectInfo>> {
        self.ensure_connected()?;
        let entries = self.walk(self.root.clone()).await?;

        Ok(entries
            .into_iter()
            .map(|(name, is_dir, metadata)| ObjectInfo {
                last_modified: modified(&metadata),
                content_type: is_dir.then(|| DIRECTORY_CONTENT_TYPE.to_string()),
                size: if is_dir { 0 } else { metadata.len() },
                name: if is_dir { format!("{name}/") } else { name },
            })
            .collect())
    }
}
