//! Destination reconciler
//!
//! Replaces the previously distributed version of each staged file at one
//! destination. Existing files whose normalized path equals the normalized
//! target path are stale: they are deleted before the new file is uploaded.
//! When a stale file cannot be deleted, its remaining stale copies are left
//! in place and the new file is not uploaded.

use crate::datastore::Datastore;
use crate::error::{DistributeError, Result};
use crate::fileset::StagedFile;
use crate::report::{DestinationSummary, DistributeReport};
use distribute_common::naming::normalize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Full destination path of a file below `dst_dir`
pub fn destination_path(dst_dir: &str, dest_relative_path: &str) -> String {
    let dir = dst_dir.trim_end_matches('/');
    if dir.is_empty() {
        dest_relative_path.to_string()
    } else {
        format!("{dir}/{dest_relative_path}")
    }
}

#[derive(Debug)]
struct PlannedUpload<'a> {
    local_path: &'a Path,
    destination: String,
    stale: Vec<String>,
}

/// Plan uploads keyed by normalized destination; a later staged file for
/// the same key replaces the earlier one
fn plan<'a>(
    staged_files: &'a [StagedFile],
    dst_dir: &str,
    report: &mut DistributeReport,
) -> (Vec<PlannedUpload<'a>>, HashMap<String, usize>) {
    let mut uploads: Vec<PlannedUpload<'a>> = Vec::with_capacity(staged_files.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for file in staged_files {
        let destination = destination_path(dst_dir, &file.dest_relative_path);
        let upload = PlannedUpload {
            local_path: &file.local_path,
            destination,
            stale: Vec::new(),
        };

        match index.get(&normalize(&upload.destination)) {
            Some(&i) => {
                report.warning(format!(
                    "{} and {} map to the same destination, distributing {}",
                    uploads[i].destination, upload.destination, upload.destination
                ));
                uploads[i] = upload;
            },
            None => {
                index.insert(normalize(&upload.destination), uploads.len());
                uploads.push(upload);
            },
        }
    }

    (uploads, index)
}

/// Reconcile `dst_dir` on `datastore` with the staged files
pub async fn reconcile(
    datastore: &dyn Datastore,
    staged_files: &[StagedFile],
    dst_dir: &str,
    report: &mut DistributeReport,
) -> Result<DestinationSummary> {
    let name = datastore.name().to_string();
    if !(datastore.can_list_file() && datastore.can_delete_file()) {
        return Err(DistributeError::UnsupportedDestination(name));
    }

    let mut summary = DestinationSummary::new(&name, dst_dir);
    let (mut uploads, index) = plan(staged_files, dst_dir, report);

    for existing in datastore.list_files(dst_dir).await? {
        if let Some(&i) = index.get(&normalize(&existing)) {
            debug!("Found stale file {} for {}", existing, uploads[i].destination);
            uploads[i].stale.push(existing);
        }
    }

    info!("Distribute {} files to Location: {}", uploads.len(), dst_dir);

    for upload in &uploads {
        let mut blocked = false;
        for stale in &upload.stale {
            match datastore.delete_file(stale).await {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    let failure = DistributeError::DeleteFailure {
                        path: stale.clone(),
                        reason: e.to_string(),
                    };
                    report.warning(format!(
                        "{}. Skipping distribution of {}",
                        failure, upload.destination
                    ));
                    blocked = true;
                    break;
                },
            }
        }

        if blocked {
            summary.skipped += 1;
            continue;
        }

        datastore.put_file(upload.local_path, &upload.destination).await?;
        summary.uploaded += 1;
    }

    info!(
        "Done distributing files to {}: {} uploaded, {} deleted, {} skipped",
        name, summary.uploaded, summary.deleted, summary.skipped
    );
    Ok(summary)
}
