//! Run report
//!
//! Warnings and errors of a run are collected here instead of in a global
//! logger. Every message is also emitted through `tracing`.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSummary {
    pub name: String,
    pub location: String,
    pub uploaded: usize,
    pub deleted: usize,
    /// Staged files not uploaded because a stale copy could not be removed
    pub skipped: usize,
}

impl DestinationSummary {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesetSummary {
    pub name: String,
    pub resolved: usize,
    pub staged: usize,
    pub destinations: Vec<DestinationSummary>,
}

/// Outcome of one `distribute` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributeReport {
    pub catalogue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fileset: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub filesets: Vec<FilesetSummary>,
}

impl DistributeReport {
    pub fn new(catalogue: impl Into<String>, fileset: Option<String>) -> Self {
        Self {
            catalogue: catalogue.into(),
            fileset,
            ..Default::default()
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        info!(catalogue = %self.catalogue, "{}", msg.as_ref());
    }

    pub fn warning(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(catalogue = %self.catalogue, "{}", msg);
        self.warnings.push(msg);
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        error!(catalogue = %self.catalogue, "{}", msg);
        self.errors.push(msg);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Files uploaded over all filesets and destinations
    pub fn uploaded(&self) -> usize {
        self.filesets
            .iter()
            .flat_map(|f| &f.destinations)
            .map(|d| d.uploaded)
            .sum()
    }
}
