//! Staging fetcher
//!
//! Downloads resolved source files from the primary store into a local
//! staging directory, keeping their destination-relative layout.

use crate::datastore::{ObjectInfo, ObjectStore};
use crate::error::{DistributeError, Result};
use crate::fileset::{ResolvedFile, StagedFile};
use distribute_common::naming::{same_logical_file, DATE_TOKEN};
use std::path::Path;
use tracing::{debug, info};

/// Most recently modified object whose normalized name equals that of `name`
///
/// Ties keep the first object in listing order. Objects without a
/// modification time lose against any that has one.
pub fn latest_match<'a>(objects: &'a [ObjectInfo], name: &str) -> Option<&'a ObjectInfo> {
    objects
        .iter()
        .filter(|o| !o.is_directory() && same_logical_file(&o.name, name))
        .fold(None, |best: Option<&ObjectInfo>, object| match best {
            Some(b) if object.last_modified <= b.last_modified => Some(b),
            _ => Some(object),
        })
}

/// Destination path for `file` once `object_name` was picked for it
///
/// A declared `{DATE}` placeholder takes the date of the object found.
fn staged_path(file: &ResolvedFile, object_name: &str) -> String {
    if !file.dest_relative_path.contains(DATE_TOKEN) {
        return file.dest_relative_path.clone();
    }
    object_name
        .strip_prefix(file.source_prefix())
        .unwrap_or(object_name)
        .to_string()
}

/// Download the latest matching object for every file
///
/// Fails on the first file that has no match in the store.
pub async fn fetch(
    store: &dyn ObjectStore,
    staging_dir: &Path,
    files: &[ResolvedFile],
) -> Result<Vec<StagedFile>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let objects = store.list_objects().await?;
    let mut staged = Vec::with_capacity(files.len());

    for file in files {
        let object = latest_match(&objects, &file.source_path)
            .ok_or_else(|| DistributeError::MissingSource(file.source_path.clone()))?;
        let (_, data) = store.get_object(&object.name).await?;

        let dest_relative_path = staged_path(file, &object.name);
        let local_path = staging_dir.join(&dest_relative_path);
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&local_path, &data).await?;

        debug!(
            "Staged {} ({} bytes) as {}",
            object.name,
            data.len(),
            local_path.display()
        );
        staged.push(StagedFile {
            dest_relative_path,
            local_path,
        });
    }

    info!("{} source files downloaded", staged.len());
    Ok(staged)
}
