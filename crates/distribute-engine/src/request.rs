//! Distribution requests and responses
//!
//! A run is requested directly (`catalogue` plus optional fileset) or by an
//! "export completed" notification:
//!
//! ```json
//! {
//!   "header": { "process_id": "1234.export_test" },
//!   "contents": { "catalogue": "gebieden", "collection": "buurten", "product": "csv_actueel" }
//! }
//! ```
//!
//! The notification's collection selects the fileset. The process id is
//! only carried through to the response.

use crate::distribute::Distributor;
use crate::error::{DistributeError, Result};
use crate::report::{DistributeReport, FilesetSummary};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributeRequest {
    pub catalogue: String,
    #[serde(default, alias = "collection", skip_serializing_if = "Option::is_none")]
    pub fileset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default)]
    header: NotificationHeader,
    contents: NotificationContents,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationHeader {
    #[serde(default)]
    process_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NotificationContents {
    catalogue: String,
    #[serde(default)]
    collection: Option<String>,
}

impl DistributeRequest {
    pub fn new(catalogue: impl Into<String>, fileset: Option<String>) -> Self {
        Self {
            catalogue: catalogue.into(),
            fileset,
            process_id: None,
        }
    }

    pub fn with_process_id(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    /// Build a request from an export notification document
    pub fn from_notification(json: &str) -> Result<Self> {
        let notification: Notification = serde_json::from_str(json)
            .map_err(|e| DistributeError::InvalidRequest(format!("notification: {e}")))?;

        if notification.contents.catalogue.trim().is_empty() {
            return Err(DistributeError::InvalidRequest(
                "notification has an empty catalogue".to_string(),
            ));
        }

        let process_id = notification.header.process_id.and_then(|id| match id {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

        Ok(Self {
            catalogue: notification.contents.catalogue,
            fileset: notification.contents.collection.filter(|c| !c.is_empty()),
            process_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// What is reported back for a handled request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributeResponse {
    pub header: DistributeRequest,
    pub summary: ResponseSummary,
    pub contents: Vec<FilesetSummary>,
}

impl DistributeResponse {
    pub fn from_report(header: DistributeRequest, report: DistributeReport) -> Self {
        Self {
            header,
            summary: ResponseSummary {
                warnings: report.warnings,
                errors: report.errors,
            },
            contents: report.filesets,
        }
    }
}

/// Run `request` and wrap the report
pub async fn handle(distributor: &Distributor, request: DistributeRequest) -> Result<DistributeResponse> {
    let report = distributor
        .distribute(&request.catalogue, request.fileset.as_deref())
        .await?;
    if report.has_errors() {
        warn!(
            catalogue = %request.catalogue,
            process_id = request.process_id.as_deref().unwrap_or("-"),
            "Distribution finished with {} errors",
            report.errors.len()
        );
    }
    Ok(DistributeResponse::from_report(request, report))
}
