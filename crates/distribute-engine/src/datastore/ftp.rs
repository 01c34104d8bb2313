//! FTP destination datastore
//!
//! suppaftp's [`FtpStream`] is blocking, so every command runs inside
//! `spawn_blocking` against a session shared behind a mutex. The session is
//! opened by `connect` and kept until `disconnect`.

use super::config::FtpConfig;
use super::{Datastore, ObjectInfo};
use crate::error::{DatastoreError, DatastoreResult};
use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use suppaftp::{FtpError, FtpResult, FtpStream, Status};
use tracing::{debug, info, instrument, warn};

type Session = Arc<Mutex<Option<FtpStream>>>;

pub struct FtpDatastore {
    name: String,
    config: FtpConfig,
    session: Session,
}

impl FtpDatastore {
    pub fn new(name: impl Into<String>, config: FtpConfig) -> Self {
        Self {
            name: name.into(),
            config,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` on the open session in a blocking task
    async fn run<T, F>(&self, operation: &'static str, path: &str, f: F) -> DatastoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> FtpResult<T> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        let name = self.name.clone();
        let target = path.to_string();

        tokio::task::spawn_blocking(move || -> DatastoreResult<T> {
            let mut guard = session
                .lock()
                .map_err(|e| DatastoreError::operation(operation, &target, e))?;
            let stream = guard.as_mut().ok_or(DatastoreError::NotConnected(name))?;

            f(stream).map_err(|e| {
                if is_unavailable(&e) {
                    DatastoreError::NotFound(target.clone())
                } else {
                    DatastoreError::operation(operation, &target, e)
                }
            })
        })
        .await
        .map_err(|e| DatastoreError::operation(operation, path, e))?
    }

    fn open(config: &FtpConfig) -> FtpResult<FtpStream> {
        debug!("Connecting to FTP server: {}:{}", config.host, config.port);
        let mut ftp_stream = FtpStream::connect(format!("{}:{}", config.host, config.port))?;

        ftp_stream.set_mode(suppaftp::Mode::ExtendedPassive);

        debug!("Logging in as: {}", config.username);
        ftp_stream.login(&config.username, &config.password)?;
        ftp_stream.transfer_type(suppaftp::types::FileType::Binary)?;

        Ok(ftp_stream)
    }
}

/// 550: file or directory does not exist
fn is_unavailable(err: &FtpError) -> bool {
    matches!(err, FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable)
}

fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn list_recursive(stream: &mut FtpStream, dir: &str, files: &mut Vec<String>) -> FtpResult<()> {
    let lines = stream.list((!dir.is_empty()).then_some(dir))?;

    for entry in lines.iter().filter_map(|line| FtpEntry::parse(line)) {
        // Some servers echo the listed path in front of each name
        let name = entry.name.rsplit('/').next().unwrap_or(&entry.name);
        if name == "." || name == ".." {
            continue;
        }

        let path = join_path(dir, name);
        if entry.is_directory {
            list_recursive(stream, &path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Create every missing parent directory of `path`
fn make_parents(stream: &mut FtpStream, path: &str) {
    let mut current = String::new();
    let parents: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

    for part in parents.iter().take(parents.len().saturating_sub(1)) {
        current = join_path(&current, part);
        // Fails when the directory exists already
        if stream.mkdir(&current).is_ok() {
            debug!("Created FTP directory {}", current);
        }
    }
}

#[async_trait]
impl Datastore for FtpDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> DatastoreResult<()> {
        let config = self.config.clone();
        let stream = tokio::task::spawn_blocking(move || Self::open(&config))
            .await
            .map_err(|e| DatastoreError::connection(&self.name, e))?
            .map_err(|e| DatastoreError::connection(&self.name, e))?;

        let mut guard = self
            .session
            .lock()
            .map_err(|e| DatastoreError::connection(&self.name, e))?;
        *guard = Some(stream);

        info!("Connected to FTP server {}:{}", self.config.host, self.config.port);
        Ok(())
    }

    async fn disconnect(&mut self) -> DatastoreResult<()> {
        let stream = self
            .session
            .lock()
            .map_err(|e| DatastoreError::connection(&self.name, e))?
            .take();

        if let Some(mut stream) = stream {
            match tokio::task::spawn_blocking(move || stream.quit()).await {
                Ok(Ok(())) => debug!("Closed FTP session for {}", self.name),
                Ok(Err(e)) => warn!("Failed to quit FTP session gracefully: {}", e),
                Err(e) => warn!("FTP quit task failed: {}", e),
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn list_files(&self, dir: &str) -> DatastoreResult<Vec<String>> {
        let start = dir.trim_matches('/').to_string();
        let result = self
            .run("list", dir, move |stream| {
                let mut files = Vec::new();
                list_recursive(stream, &start, &mut files)?;
                Ok(files)
            })
            .await;

        match result {
            Err(DatastoreError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn get_object(&self, name: &str) -> DatastoreResult<(ObjectInfo, Vec<u8>)> {
        let path = name.to_string();
        let (modified, data) = self
            .run("get", name, move |stream| {
                let modified = stream.mdtm(&path).ok();
                let mut reader = stream.retr_as_buffer(&path)?;
                let mut data = Vec::new();
                reader.read_to_end(&mut data).map_err(FtpError::ConnectionError)?;
                Ok((modified, data))
            })
            .await?;

        debug!("Downloaded {} bytes from {}", data.len(), name);
        Ok((
            ObjectInfo {
                name: name.to_string(),
                last_modified: modified.map(|m| m.and_utc()),
                content_type: None,
                size: data.len() as u64,
            },
            data,
        ))
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn put_file(&self, local_path: &Path, dest_path: &str) -> DatastoreResult<()> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| DatastoreError::operation("read", local_path.display().to_string(), e))?;
        let path = dest_path.to_string();

        let size = self
            .run("put", dest_path, move |stream| {
                make_parents(stream, &path);
                stream.put_file(&path, &mut Cursor::new(data))
            })
            .await?;

        info!("Uploaded {} bytes to ftp://{}/{}", size, self.config.host, dest_path);
        Ok(())
    }

    #[instrument(skip(self), fields(datastore = %self.name))]
    async fn delete_file(&self, path: &str) -> DatastoreResult<()> {
        let target = path.to_string();
        self.run("delete", path, move |stream| stream.rm(&target)).await?;

        info!("Deleted ftp://{}/{}", self.config.host, path);
        Ok(())
    }

    fn can_list_file(&self) -> bool {
        true
    }

    fn can_delete_file(&self) -> bool {
        true
    }
}

/// One line of a Unix-style LIST response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpEntry {
    pub name: String,
    pub is_directory: bool,
}

impl FtpEntry {
    /// Parse a LIST line such as
    /// `-rw-r--r--   1 ftp ftp  1234 Jan 15 12:00 file name.txt`
    ///
    /// Names may contain spaces when the line has the full nine columns.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }

        let is_directory = parts[0].starts_with('d');
        let name = if parts.len() >= 9 {
            parts[8..].join(" ")
        } else {
            parts.last()?.to_string()
        };

        Some(Self { name, is_directory })
    }
}
