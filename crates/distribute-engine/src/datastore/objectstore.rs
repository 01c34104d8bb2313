//! S3-compatible object store datastore
//!
//! Object keys are the datastore paths. There are no real directories; keys
//! ending in `/` are pseudo-directory markers and are reported with
//! [`DIRECTORY_CONTENT_TYPE`] so callers can skip them.

use super::config::ObjectStoreConfig;
use super::{Datastore, ObjectInfo, ObjectStore, DIRECTORY_CONTENT_TYPE};
use crate::error::{DatastoreError, DatastoreResult};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info, instrument};

pub struct ObjectDatastore {
    name: String,
    config: ObjectStoreConfig,
    bucket: String,
    client: Option<Client>,
}

impl ObjectDatastore {
    /// Create a datastore for `config`, using `container_base` as bucket when
    /// the config names none
    pub fn new(name: impl Into<String>, config: ObjectStoreConfig, container_base: &str) -> Self {
        let bucket = config
            .bucket
            .clone()
            .unwrap_or_else(|| container_base.to_string());

        Self {
            name: name.into(),
            config,
            bucket,
            client: None,
        }
    }

    fn build_client(&self) -> Client {
        let credentials = Credentials::new(
            &self.config.access_key,
            &self.config.secret_key,
            None,
            None,
            "distribute-objectstore",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(self.config.region.clone()))
            .force_path_style(self.config.path_style);

        if let Some(endpoint) = &self.config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        Client::from_conf(s3_config_builder.build())
    }

    fn client(&self) -> DatastoreResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DatastoreError::NotConnected(self.name.clone()))
    }

    /// All objects whose key starts with `prefix`, following continuation tokens
    async fn list_prefix(&self, prefix: Option<&str>) -> DatastoreResult<Vec<ObjectInfo>> {
        let client = self.client()?;
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = client.list_objects_v2().bucket(&self.bucket);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| DatastoreError::operation("list", prefix.unwrap_or_default(), e))?;

            for object in response.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(ObjectInfo {
                    name: key.to_string(),
                    last_modified: object.last_modified().and_then(to_chrono),
                    content_type: key.ends_with('/').then(|| DIRECTORY_CONTENT_TYPE.to_string()),
                    size: object.size().unwrap_or(0).max(0) as u64,
                });
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!(
            "Listed {} objects in s3://{}/{}",
            objects.len(),
            self.bucket,
            prefix.unwrap_or_default()
        );
        Ok(objects)
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

/// Listing prefix for a directory path
fn dir_prefix(dir: &str) -> Option<String> {
    let dir = dir.trim_start_matches('/');
    if dir.is_empty() {
        None
    } else if dir.ends_with('/') {
        Some(dir.to_string())
    } else {
        Some(format!("{dir}/"))
    }
}

#[async_trait]
impl Datastore for ObjectDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> DatastoreResult<()> {
        let client = self.build_client();

        client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| DatastoreError::connection(&self.name, e))?;

        info!("Object store client initialized for bucket: {}", self.bucket);
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> DatastoreResult<()> {
        self.client = None;
        Ok(())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn list_files(&self, dir: &str) -> DatastoreResult<Vec<String>> {
        let prefix = dir_prefix(dir);
        Ok(self
            .list_prefix(prefix.as_deref())
            .await?
            .into_iter()
            .filter(|o| !o.is_directory())
            .map(|o| o.name)
            .collect())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn get_object(&self, name: &str) -> DatastoreResult<(ObjectInfo, Vec<u8>)> {
        let response = self
            .client()?
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    DatastoreError::NotFound(name.to_string())
                } else {
                    DatastoreError::operation("get", name, service_err)
                }
            })?;

        let info = ObjectInfo {
            name: name.to_string(),
            last_modified: response.last_modified().and_then(to_chrono),
            content_type: response.content_type().map(|s| s.to_string()),
            size: response.content_length().unwrap_or(0).max(0) as u64,
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| DatastoreError::operation("read body", name, e))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, name);
        Ok((info, data))
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn put_file(&self, local_path: &Path, dest_path: &str) -> DatastoreResult<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| DatastoreError::operation("read", local_path.display().to_string(), e))?;

        self.client()?
            .put_object()
            .bucket(&self.bucket)
            .key(dest_path)
            .body(body)
            .send()
            .await
            .map_err(|e| DatastoreError::operation("put", dest_path, e))?;

        info!("Successfully uploaded to s3://{}/{}", self.bucket, dest_path);
        Ok(())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn delete_file(&self, path: &str) -> DatastoreResult<()> {
        self.client()?
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| DatastoreError::operation("delete", path, e))?;

        info!("Successfully deleted s3://{}/{}", self.bucket, path);
        Ok(())
    }

    fn can_list_file(&self) -> bool {
        true
    }

    fn can_delete_file(&self) -> bool {
        true
    }
}

#[async_trait]
impl ObjectStore for ObjectDatastore {
    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn list_objects(&self) -> DatastoreResult<Vec<ObjectInfo>> {
        self.list_prefix(None).await
    }
}
