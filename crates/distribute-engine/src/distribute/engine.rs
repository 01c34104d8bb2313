//! Fileset synchronization engine
//!
//! Drives resolution, staging and reconciliation for the filesets of a
//! catalogue. Connections are opened right before they are needed and
//! closed right after; nothing is shared between filesets or destinations.

use super::{reconciler, staging, SourceResolver};
use crate::catalogue::{ExportCatalogueClient, ExportProducts};
use crate::config::Settings;
use crate::datastore::{
    config::load_registry, DatastoreProvider, DatastoreRegistry, ObjectStore,
};
use crate::error::{DistributeError, Result};
use crate::fileset::{
    config_document_name, parse_document, DestinationSpec, FilesetConfig, FilesetMap, SourceSpec, StagedFile,
};
use crate::report::{DestinationSummary, DistributeReport, FilesetSummary};
use std::path::Path;
use tracing::{info, warn};

pub struct Distributor {
    provider: Box<dyn DatastoreProvider>,
    products: Box<dyn ExportProducts>,
    container_base: String,
    primary_datastore: String,
}

impl Distributor {
    pub fn new(
        provider: Box<dyn DatastoreProvider>,
        products: Box<dyn ExportProducts>,
        container_base: impl Into<String>,
        primary_datastore: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            products,
            container_base: container_base.into(),
            primary_datastore: primary_datastore.into(),
        }
    }

    /// Wire the registry file and export API client from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let configs = load_registry(&settings.datastore_config_file)?;
        let registry = DatastoreRegistry::new(configs, &settings.container_base)
            .with_env_object_store(&settings.primary_datastore);
        let client = ExportCatalogueClient::new(&settings.export_api)?;

        Ok(Self::new(
            Box::new(registry),
            Box::new(client),
            &settings.container_base,
            &settings.primary_datastore,
        ))
    }

    /// Distribute all filesets of `catalogue`, or only `fileset`
    ///
    /// Returns `Err` only when the export products service fails; every
    /// other problem ends up in the report.
    pub async fn distribute(&self, catalogue: &str, fileset: Option<&str>) -> Result<DistributeReport> {
        let mut report = DistributeReport::new(catalogue, fileset.map(str::to_string));
        match fileset {
            Some(name) => report.info(format!("Distribute catalogue {catalogue} fileset {name}")),
            None => report.info(format!("Distribute catalogue {catalogue}")),
        }

        let filesets = self.load_filesets(catalogue, &mut report).await;

        let selected: Vec<(&String, &FilesetConfig)> = match fileset {
            Some(name) => match filesets.get_key_value(name) {
                Some(entry) => vec![entry],
                None => {
                    report.error(format!(
                        "Fileset {name} is not configured for catalogue {catalogue}"
                    ));
                    Vec::new()
                },
            },
            None => filesets.iter().collect(),
        };

        for (name, config) in selected {
            match self.distribute_fileset(catalogue, name, config, &mut report).await {
                Ok(summary) => report.filesets.push(summary),
                Err(e) if e.is_fatal() => {
                    report.error(e.to_string());
                    return Err(e);
                },
                Err(e) => report.error(format!("Fileset {name}: {e}")),
            }
        }

        report.info(format!(
            "Distribution done: {} files uploaded, {} warnings, {} errors",
            report.uploaded(),
            report.warnings.len(),
            report.errors.len()
        ));
        Ok(report)
    }

    async fn connect_primary(&self) -> Result<Box<dyn ObjectStore>> {
        info!("Connect to Objectstore");
        Ok(self.provider.object_store(&self.primary_datastore).await?)
    }

    async fn disconnect_primary(&self, mut store: Box<dyn ObjectStore>) {
        info!("Disconnect from Objectstore");
        if let Err(e) = store.disconnect().await {
            warn!("Failed to disconnect from {}: {}", self.primary_datastore, e);
        }
    }

    /// Fileset configuration of `catalogue`, empty when missing or invalid
    async fn load_filesets(&self, catalogue: &str, report: &mut DistributeReport) -> FilesetMap {
        let document = config_document_name(&self.container_base, catalogue);

        let store = match self.connect_primary().await {
            Ok(store) => store,
            Err(e) => {
                report.error(e.to_string());
                return FilesetMap::new();
            },
        };

        info!("Load files from {}", self.container_base);
        let loaded = read_document(store.as_ref(), &document).await;
        self.disconnect_primary(store).await;

        match loaded {
            Ok(filesets) => filesets,
            Err(e) => {
                report.error(e.to_string());
                FilesetMap::new()
            },
        }
    }

    async fn distribute_fileset(
        &self,
        catalogue: &str,
        name: &str,
        config: &FilesetConfig,
        report: &mut DistributeReport,
    ) -> Result<FilesetSummary> {
        report.info(format!("Download fileset {name}"));

        for source in &config.sources {
            if let SourceSpec::Unrecognized(entry) = source {
                report.warning(format!(
                    "Fileset {name}: source {entry} has neither file_name nor export, skipped"
                ));
            }
        }

        let staging_dir = tempfile::Builder::new()
            .prefix(&format!("distribute-{}-", staging_label(name)))
            .tempdir()?;

        let store = self.connect_primary().await?;
        let fetched = self
            .resolve_and_stage(store.as_ref(), catalogue, config, staging_dir.path())
            .await;
        self.disconnect_primary(store).await;
        let (resolved, staged) = fetched?;

        let mut summary = FilesetSummary {
            name: name.to_string(),
            resolved,
            staged: staged.len(),
            destinations: Vec::new(),
        };

        for destination in &config.destinations {
            match self.distribute_to(destination, &staged, report).await {
                Ok(destination_summary) => summary.destinations.push(destination_summary),
                Err(e @ DistributeError::UnsupportedDestination(_)) => report.warning(e.to_string()),
                Err(e) => report.error(format!("Destination {}: {}", destination.name, e)),
            }
        }

        Ok(summary)
    }

    async fn resolve_and_stage(
        &self,
        store: &dyn ObjectStore,
        catalogue: &str,
        config: &FilesetConfig,
        staging_dir: &Path,
    ) -> Result<(usize, Vec<StagedFile>)> {
        let resolver = SourceResolver::new(store, self.products.as_ref(), catalogue);
        let resolved = resolver.resolve(&config.sources).await?;
        let staged = staging::fetch(store, staging_dir, &resolved).await?;
        Ok((resolved.len(), staged))
    }

    async fn distribute_to(
        &self,
        target: &DestinationSpec,
        staged: &[StagedFile],
        report: &mut DistributeReport,
    ) -> Result<DestinationSummary> {
        info!("Connect to Destination {}", target.name);
        let mut destination = self.provider.destination(&target.name).await?;
        let dst_dir = format!("{}{}", destination.base_directory, target.location);

        report.info(format!("Distribute new files to Destination: {}", target.name));
        let result = reconciler::reconcile(destination.datastore.as_ref(), staged, &dst_dir, report).await;

        info!("Disconnect from Destination {}", target.name);
        if let Err(e) = destination.datastore.disconnect().await {
            report.warning(format!("Failed to disconnect from {}: {}", target.name, e));
        }

        result
    }
}

/// Read and parse the configuration document from the store
async fn read_document(store: &dyn ObjectStore, document: &str) -> Result<FilesetMap> {
    let objects = store.list_objects().await?;
    let object = staging::latest_match(&objects, document)
        .ok_or_else(|| DistributeError::ConfigurationMissing(document.to_string()))?;
    let (_, bytes) = store.get_object(&object.name).await?;
    parse_document(document, &bytes)
}

/// Fileset name reduced to characters safe in a directory name
fn staging_label(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
