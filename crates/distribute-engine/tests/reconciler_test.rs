//! Destination reconciliation against in-memory destinations

mod common;

use common::{init_tracing, MemoryStore};
use distribute_engine::datastore::Datastore;
use distribute_engine::distribute::reconcile;
use distribute_engine::error::DistributeError;
use distribute_engine::fileset::StagedFile;
use distribute_engine::report::DistributeReport;
use std::path::Path;

async fn connected(store: MemoryStore) -> MemoryStore {
    let mut store = store;
    store.connect().await.unwrap();
    store
}

fn stage(dir: &Path, rel: &str, data: &[u8]) -> StagedFile {
    let local_path = dir.join(rel);
    std::fs::create_dir_all(local_path.parent().unwrap()).unwrap();
    std::fs::write(&local_path, data).unwrap();
    StagedFile {
        dest_relative_path: rel.to_string(),
        local_path,
    }
}

#[tokio::test]
async fn test_replaces_dated_variants() {
    init_tracing();
    let staging = tempfile::tempdir().unwrap();
    let staged = vec![
        stage(staging.path(), "f_20230101.csv", b"new"),
        stage(staging.path(), "sub/g.csv", b"g"),
    ];
    let destination = connected(
        MemoryStore::new("d1")
            .with_file("out/f_20220101.csv", b"old", 100)
            .with_file("out/f_20221231.csv", b"older", 90)
            .with_file("out/keep.csv", b"k", 100)
            .with_file("elsewhere/f_20220101.csv", b"x", 100),
    )
    .await;
    let mut report = DistributeReport::new("cat1", None);

    let summary = reconcile(&destination, &staged, "out", &mut report).await.unwrap();

    assert_eq!(
        destination.paths(),
        vec![
            "elsewhere/f_20220101.csv",
            "out/f_20230101.csv",
            "out/keep.csv",
            "out/sub/g.csv",
        ]
    );
    assert_eq!(destination.content("out/f_20230101.csv").unwrap(), b"new");
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.skipped, 0);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_reconcile_twice_is_idempotent() {
    let staging = tempfile::tempdir().unwrap();
    let staged = vec![stage(staging.path(), "f_20230101.csv", b"new")];
    let destination = connected(MemoryStore::new("d1").with_file("out/f_20220101.csv", b"old", 100)).await;
    let mut report = DistributeReport::new("cat1", None);

    reconcile(&destination, &staged, "out", &mut report).await.unwrap();
    let second = reconcile(&destination, &staged, "out", &mut report).await.unwrap();

    assert_eq!(destination.paths(), vec!["out/f_20230101.csv"]);
    assert_eq!(second.deleted, 1);
    assert_eq!(second.uploaded, 1);
}

#[tokio::test]
async fn test_failed_delete_keeps_remaining_stale_copies() {
    let staging = tempfile::tempdir().unwrap();
    let staged = vec![
        stage(staging.path(), "a_20230101.csv", b"a"),
        stage(staging.path(), "b_20230101.csv", b"b"),
    ];
    let destination = connected(
        MemoryStore::new("d1")
            .with_file("out/a_20210101.csv", b"a1", 100)
            .with_file("out/a_20220101.csv", b"a2", 100)
            .with_file("out/b_20220101.csv", b"b", 100)
            .failing_delete("out/a_20210101.csv"),
    )
    .await;
    let mut report = DistributeReport::new("cat1", None);

    let summary = reconcile(&destination, &staged, "out", &mut report).await.unwrap();

    // Stale copies of a stay untouched and new a is not uploaded; b proceeds
    assert_eq!(
        destination.paths(),
        vec!["out/a_20210101.csv", "out/a_20220101.csv", "out/b_20230101.csv"]
    );
    assert_eq!(destination.content("out/a_20220101.csv").unwrap(), b"a2");
    assert_eq!(destination.state().deleted, vec!["out/b_20220101.csv"]);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Could not delete file out/a_20210101.csv"));
}

#[tokio::test]
async fn test_destination_without_delete_is_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let staged = vec![stage(staging.path(), "a.csv", b"a")];
    let destination = connected(MemoryStore::new("d2").without_delete()).await;
    let mut report = DistributeReport::new("cat1", None);

    let err = reconcile(&destination, &staged, "out", &mut report).await.unwrap_err();

    assert!(matches!(err, DistributeError::UnsupportedDestination(name) if name == "d2"));
    assert!(destination.paths().is_empty());
}

#[tokio::test]
async fn test_empty_location_has_no_leading_slash() {
    let staging = tempfile::tempdir().unwrap();
    let staged = vec![stage(staging.path(), "cat/f1", b"f1")];
    let destination = connected(MemoryStore::new("d1")).await;
    let mut report = DistributeReport::new("cat", None);

    reconcile(&destination, &staged, "", &mut report).await.unwrap();

    assert_eq!(destination.paths(), vec!["cat/f1"]);
}
