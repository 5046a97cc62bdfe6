use foresight_indexer::{ChangeLog, ProjectIndexer, StreamingIndexer, StreamingIndexerConfig};
use std::sync::Arc;
use std::time::Duration;

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[tokio::test]
async fn triggered_sweep_publishes_update_and_serves_queries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/payments.rs"),
        "fn charge_customer() {}\nfn refund_customer() {}\n",
    )
    .unwrap();

    let indexer = Arc::new(
        ProjectIndexer::new(dir.path(), dir.path().join(".foresight-index.json"))
            .await
            .unwrap(),
    );
    let changes = Arc::new(ChangeLog::new(epoch_secs()));
    let streaming = StreamingIndexer::start(
        Arc::clone(&indexer),
        Arc::clone(&changes),
        StreamingIndexerConfig {
            debounce: Duration::from_millis(10),
            max_batch_wait: Duration::from_millis(50),
            notify_poll_interval: Duration::from_millis(100),
        },
    )
    .unwrap();

    let mut updates = streaming.subscribe_updates();
    streaming.trigger("test-sweep").await.unwrap();

    let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .expect("update within timeout")
        .expect("broadcast open");
    assert!(update.success);
    assert_eq!(update.reason, "test-sweep");

    let hits = indexer.store().symbol("charge_customer", 5);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "src/payments.rs");

    let health = streaming.health_snapshot();
    assert!(health.last_success.is_some());
    assert_eq!(health.consecutive_failures, 0);
}

#[tokio::test]
async fn full_sweep_is_idempotent_for_unchanged_trees() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn stable() {}").unwrap();

    let indexer = ProjectIndexer::new(dir.path(), dir.path().join(".foresight-index.json"))
        .await
        .unwrap();
    let first = indexer.index().await.unwrap();
    let second = indexer.index().await.unwrap();

    assert_eq!(first.files, 1);
    assert_eq!(second.files, 0);
    assert_eq!(second.unchanged, 1);
}
