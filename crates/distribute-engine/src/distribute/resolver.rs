//! Source resolution
//!
//! Turns the source declarations of a fileset into concrete
//! (destination path, source path) pairs, in declaration order.

use crate::catalogue::{CatalogueProducts, ExportProducts};
use crate::datastore::{ObjectInfo, ObjectStore};
use crate::error::Result;
use crate::fileset::{ExportSelector, ResolvedFile, SourceSpec};
use distribute_common::naming::{has_wildcard, WildcardPattern};
use tracing::{debug, info};

/// `base_dir` with exactly one trailing `/`, or empty
pub fn normalize_base_dir(base_dir: &str) -> String {
    if base_dir.is_empty() {
        return String::new();
    }
    let with_slash = format!("{base_dir}/");
    match with_slash.strip_suffix("//") {
        Some(trimmed) => format!("{trimmed}/"),
        None => with_slash,
    }
}

/// `source_path` relative to `base_dir`
pub fn dest_relative_path(source_path: &str, base_dir: &str) -> String {
    if base_dir.is_empty() {
        return source_path.to_string();
    }
    source_path
        .strip_prefix(base_dir)
        .unwrap_or(source_path)
        .to_string()
}

/// Export file names selected from `products`, prefixed with the catalogue
pub fn export_files(catalogue: &str, products: &CatalogueProducts, selector: &ExportSelector) -> Vec<String> {
    let Some(collection) = products.get(&selector.collection) else {
        debug!(collection = %selector.collection, "Collection has no export products");
        return Vec::new();
    };

    let names: Vec<&String> = match selector.selected_products() {
        Some(keys) => keys
            .iter()
            .filter_map(|key| collection.get(key))
            .flatten()
            .collect(),
        None => collection.values().flatten().collect(),
    };

    names
        .into_iter()
        .map(|name| format!("{catalogue}/{name}"))
        .collect()
}

pub struct SourceResolver<'a> {
    store: &'a dyn ObjectStore,
    products: &'a dyn ExportProducts,
    catalogue: &'a str,
}

impl<'a> SourceResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, products: &'a dyn ExportProducts, catalogue: &'a str) -> Self {
        Self {
            store,
            products,
            catalogue,
        }
    }

    /// Resolve `sources` in order
    ///
    /// The store is listed at most once, on the first wildcard source. The
    /// export catalogue is fetched at most once, on the first export source.
    pub async fn resolve(&self, sources: &[SourceSpec]) -> Result<Vec<ResolvedFile>> {
        let mut listing: Option<Vec<ObjectInfo>> = None;
        let mut export: Option<CatalogueProducts> = None;
        let mut files = Vec::new();

        info!("Determining files from source to distribute");

        for source in sources {
            match source {
                SourceSpec::StaticName {
                    base_dir,
                    file_name,
                } => {
                    let base_dir = normalize_base_dir(base_dir);
                    let source_path = format!("{base_dir}{file_name}");

                    if has_wildcard(file_name) {
                        if listing.is_none() {
                            listing = Some(self.store.list_objects().await?);
                        }
                        let objects = listing.as_deref().unwrap_or_default();
                        let pattern = WildcardPattern::new(&source_path)?;

                        let before = files.len();
                        files.extend(
                            objects
                                .iter()
                                .filter(|o| !o.is_directory() && pattern.is_match(&o.name))
                                .map(|o| ResolvedFile::new(dest_relative_path(&o.name, &base_dir), &o.name)),
                        );
                        info!(
                            "Distribute {} files matching from source: {}",
                            files.len() - before,
                            source_path
                        );
                    } else {
                        info!("Distribute file matching from source: {}", source_path);
                        files.push(ResolvedFile::new(
                            dest_relative_path(&source_path, &base_dir),
                            source_path,
                        ));
                    }
                },
                SourceSpec::ExportDerived { export: selector } => {
                    if export.is_none() {
                        export = Some(self.products.get_products(self.catalogue).await?);
                    }
                    let Some(products) = export.as_ref() else {
                        continue;
                    };

                    for path in export_files(self.catalogue, products, selector) {
                        info!(
                            "Distribute files from source from export product set {} {}",
                            selector.collection, path
                        );
                        files.push(ResolvedFile::new(path.clone(), path));
                    }
                },
                SourceSpec::Unrecognized(entry) => {
                    debug!("Skip source without file_name or export: {}", entry);
                },
            }
        }

        Ok(files)
    }
}
