//! Fileset configuration documents and the files flowing through a run
//!
//! A catalogue's document maps fileset names to their sources and
//! destinations:
//!
//! ```json
//! {
//!   "gebieden": {
//!     "sources": [
//!       { "base_dir": "gebieden/SHP", "file_name": "GBD_buurt_{DATE}.shp" },
//!       { "file_name": "gebieden/CSV/*.csv" },
//!       { "export": { "collection": "buurten", "products": ["csv_actueel"] } }
//!     ],
//!     "destinations": [ { "name": "ftp-export", "location": "gebieden" } ]
//!   }
//! }
//! ```

use crate::error::{DistributeError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesets of one catalogue, in document order
pub type FilesetMap = IndexMap<String, FilesetConfig>;

/// Name of the configuration document for `catalogue` in `environment`
pub fn config_document_name(environment: &str, catalogue: &str) -> String {
    format!("distribute.{environment}.{catalogue}.json")
}

/// Parse a configuration document
pub fn parse_document(document: &str, bytes: &[u8]) -> Result<FilesetMap> {
    serde_json::from_slice(bytes).map_err(|e| DistributeError::ConfigurationInvalid {
        document: document.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesetConfig {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub destinations: Vec<DestinationSpec>,
}

/// Where the files of a fileset come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    /// A file in the primary store, optionally with a `*` wildcard
    StaticName {
        #[serde(default)]
        base_dir: String,
        file_name: String,
    },
    /// Files published by the export catalogue service
    ExportDerived { export: ExportSelector },
    /// Entry with neither `file_name` nor `export`; skipped when resolving
    Unrecognized(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSelector {
    pub collection: String,
    /// Product keys to take; all products of the collection when absent or empty
    #[serde(default)]
    pub products: Option<Vec<String>>,
}

impl ExportSelector {
    pub fn selected_products(&self) -> Option<&[String]> {
        self.products.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSpec {
    /// Datastore name in the registry
    pub name: String,
    #[serde(default)]
    pub location: String,
}

/// A source file and the path it gets below the destination location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub dest_relative_path: String,
    pub source_path: String,
}

impl ResolvedFile {
    pub fn new(dest_relative_path: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            dest_relative_path: dest_relative_path.into(),
            source_path: source_path.into(),
        }
    }

    /// Part of the source path in front of the destination path
    pub fn source_prefix(&self) -> &str {
        self.source_path
            .strip_suffix(self.dest_relative_path.as_str())
            .unwrap_or_default()
    }
}

/// A resolved file after download to the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub dest_relative_path: String,
    pub local_path: PathBuf,
}
