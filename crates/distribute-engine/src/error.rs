//! Error types for fileset distribution

use distribute_common::CommonError;
use thiserror::Error;

/// Result type alias for distribution operations
pub type Result<T> = std::result::Result<T, DistributeError>;

/// Result type alias for datastore operations
pub type DatastoreResult<T> = std::result::Result<T, DatastoreError>;

/// Failures of a single datastore primitive
#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("Unknown datastore '{0}'. Check the datastore configuration file.")]
    UnknownDatastore(String),

    #[error("Datastore '{0}' is not connected")]
    NotConnected(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Path '{0}' leaves the datastore root")]
    InvalidPath(String),

    #[error("Datastore '{name}' does not support {operation}")]
    Unsupported {
        name: String,
        operation: &'static str,
    },

    #[error("Failed to connect to datastore '{name}': {reason}")]
    Connection { name: String, reason: String },

    #[error("{operation} failed for '{path}': {reason}")]
    Operation {
        operation: &'static str,
        path: String,
        reason: String,
    },

    #[error("Invalid datastore configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatastoreError {
    /// Create an operation error
    pub fn operation(
        operation: &'static str,
        path: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Operation {
            operation,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a connection error
    pub fn connection(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors of a distribution run
///
/// Only [`DistributeError::RemoteService`] aborts a whole run. The engine
/// records the other variants in the run report and moves on to the next
/// fileset or destination.
#[derive(Error, Debug)]
pub enum DistributeError {
    #[error("Missing config file: {0}")]
    ConfigurationMissing(String),

    #[error("JSON error in config file '{document}': {reason}")]
    ConfigurationInvalid { document: String, reason: String },

    #[error("Export products service failed: {0}")]
    RemoteService(String),

    #[error("Source file not found in object store: {0}")]
    MissingSource(String),

    #[error("Datastore '{0}' does not support file listing and deletion")]
    UnsupportedDestination(String),

    #[error("Could not delete file {path}: {reason}")]
    DeleteFailure { path: String, reason: String },

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error(transparent)]
    Naming(#[from] CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DistributeError {
    /// Create a remote service error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteService(msg.into())
    }

    /// Create a settings error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// True for failures that abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RemoteService(_))
    }
}
