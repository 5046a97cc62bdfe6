//! Streaming incremental indexing driven by filesystem notifications.
//!
//! Events are debounced into batches; each batch applies per-file
//! delete-then-insert updates to the symbol store, appends to the change
//! log, persists the index, and publishes health + update notifications.

use crate::changes::{ChangeLog, ChangeType};
use crate::error::{IndexerError, Result};
use crate::indexer::{epoch_secs, FileUpdate, ProjectIndexer};
use crate::scanner::FileScanner;
use log::{info, warn};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Debug, Clone)]
pub struct IndexUpdate {
    pub completed_at: SystemTime,
    pub duration_ms: u64,
    pub changed_files: usize,
    pub success: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexerHealth {
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_duration_ms: Option<u64>,
    pub pending_events: usize,
    pub indexing: bool,
}

impl IndexerHealth {
    fn initial() -> Self {
        Self {
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
            last_duration_ms: None,
            pending_events: 0,
            indexing: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StreamingIndexerConfig {
    pub debounce: Duration,
    pub max_batch_wait: Duration,
    pub notify_poll_interval: Duration,
}

impl Default for StreamingIndexerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            max_batch_wait: Duration::from_secs(3),
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

enum WatcherCommand {
    Trigger { reason: String },
    Shutdown,
}

#[derive(Clone)]
pub struct StreamingIndexer {
    inner: Arc<StreamingIndexerInner>,
}

struct StreamingIndexerInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<IndexUpdate>,
    health_tx: watch::Sender<IndexerHealth>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl StreamingIndexer {
    pub fn start(
        indexer: Arc<ProjectIndexer>,
        changes: Arc<ChangeLog>,
        config: StreamingIndexerConfig,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1_024);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (health_tx, _health_rx) = watch::channel(IndexerHealth::initial());
        let (update_tx, _) = broadcast::channel(32);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default().with_poll_interval(config.notify_poll_interval),
        )?;
        watcher.watch(indexer.root(), RecursiveMode::Recursive)?;

        spawn_index_loop(
            indexer,
            changes,
            config,
            event_rx,
            command_rx,
            update_tx.clone(),
            health_tx.clone(),
        );

        Ok(Self {
            inner: Arc::new(StreamingIndexerInner {
                command_tx,
                update_tx,
                health_tx,
                _watcher: std::sync::Mutex::new(Some(watcher)),
            }),
        })
    }

    /// Schedule a full incremental sweep.
    pub async fn trigger(&self, reason: impl Into<String>) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Trigger {
                reason: reason.into(),
            })
            .await
            .map_err(|e| IndexerError::Other(format!("failed to send trigger: {e}")))?;
        Ok(())
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<IndexUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn health_snapshot(&self) -> IndexerHealth {
        self.inner.health_tx.subscribe().borrow().clone()
    }

    #[must_use]
    pub fn health_stream(&self) -> watch::Receiver<IndexerHealth> {
        self.inner.health_tx.subscribe()
    }
}

impl Drop for StreamingIndexer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

struct DebounceState {
    pending: HashSet<PathBuf>,
    rescan_reason: Option<String>,
    first_event: Option<Instant>,
    last_event: Option<Instant>,
    debounce: Duration,
    max_batch_wait: Duration,
}

impl DebounceState {
    fn new(debounce: Duration, max_batch_wait: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            rescan_reason: None,
            first_event: None,
            last_event: None,
            debounce,
            max_batch_wait,
        }
    }

    fn push(&mut self, path: PathBuf) {
        let now = Instant::now();
        self.first_event.get_or_insert(now);
        self.last_event = Some(now);
        self.pending.insert(path);
    }

    fn force_run(&mut self, reason: String) {
        self.rescan_reason = Some(reason);
        let now = Instant::now();
        self.first_event.get_or_insert(now);
        // Run on the next deadline check.
        self.last_event = Some(now - self.debounce);
    }

    fn deadline(&self) -> Option<Instant> {
        let last = self.last_event?;
        let first = self.first_event?;
        Some((last + self.debounce).min(first + self.max_batch_wait))
    }

    fn drain(&mut self) -> (Vec<PathBuf>, Option<String>) {
        self.first_event = None;
        self.last_event = None;
        (
            self.pending.drain().collect(),
            self.rescan_reason.take(),
        )
    }
}

fn spawn_index_loop(
    indexer: Arc<ProjectIndexer>,
    changes: Arc<ChangeLog>,
    config: StreamingIndexerConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<IndexUpdate>,
    health_tx: watch::Sender<IndexerHealth>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.debounce, config.max_batch_wait);
        let mut health = IndexerHealth::initial();

        loop {
            let deadline = state.deadline();
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            for path in event.paths {
                                if FileScanner::is_ignored(indexer.root(), &path) {
                                    continue;
                                }
                                state.push(path);
                            }
                            health.pending_events = state.pending.len();
                            let _ = health_tx.send(health.clone());
                        }
                        Some(Err(err)) => warn!("watch event error: {err}"),
                        None => break,
                    }
                }
                Some(cmd) = command_rx.recv() => {
                    match cmd {
                        WatcherCommand::Trigger { reason } => {
                            state.force_run(reason);
                        }
                        WatcherCommand::Shutdown => break,
                    }
                }
                () = sleep_until_deadline(deadline), if deadline.is_some() => {
                    let (paths, rescan_reason) = state.drain();
                    health.indexing = true;
                    health.pending_events = 0;
                    let _ = health_tx.send(health.clone());

                    let reason = rescan_reason
                        .clone()
                        .unwrap_or_else(|| "fs_event".to_string());
                    let started = Instant::now();
                    let result = run_batch(&indexer, &changes, paths, rescan_reason.is_some()).await;
                    let duration_ms = started.elapsed().as_millis() as u64;

                    health.indexing = false;
                    health.last_duration_ms = Some(duration_ms);
                    let (success, changed_files) = match result {
                        Ok(changed) => {
                            health.last_success = Some(SystemTime::now());
                            health.consecutive_failures = 0;
                            health.last_error = None;
                            (true, changed)
                        }
                        Err(err) => {
                            health.consecutive_failures += 1;
                            health.last_error = Some(err.to_string());
                            warn!("incremental index batch failed: {err}");
                            (false, 0)
                        }
                    };
                    let _ = health_tx.send(health.clone());
                    let _ = update_tx.send(IndexUpdate {
                        completed_at: SystemTime::now(),
                        duration_ms,
                        changed_files,
                        success,
                        reason,
                    });
                }
            }
        }
        info!("streaming indexer loop stopped");
    });
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending().await,
    }
}

async fn run_batch(
    indexer: &Arc<ProjectIndexer>,
    changes: &Arc<ChangeLog>,
    paths: Vec<PathBuf>,
    full_rescan: bool,
) -> Result<usize> {
    let now = epoch_secs();
    let mut changed = 0usize;

    if full_rescan {
        let stats = indexer.index().await?;
        return Ok(stats.files);
    }

    for path in paths {
        if path.is_dir() {
            continue;
        }
        if path.exists() {
            match indexer.index_file(&path).await? {
                FileUpdate::Added => {
                    changed += 1;
                    record_change(changes, indexer, &path, ChangeType::Added, now);
                }
                FileUpdate::Modified => {
                    changed += 1;
                    record_change(changes, indexer, &path, ChangeType::Modified, now);
                }
                FileUpdate::Unchanged | FileUpdate::Skipped => {}
            }
        } else if indexer.remove_file(&path) {
            changed += 1;
            record_change(changes, indexer, &path, ChangeType::Deleted, now);
        }
    }

    if changed > 0 {
        indexer.save().await?;
    }
    Ok(changed)
}

fn record_change(
    changes: &Arc<ChangeLog>,
    indexer: &Arc<ProjectIndexer>,
    path: &std::path::Path,
    change_type: ChangeType,
    now: u64,
) {
    let rel = path
        .strip_prefix(indexer.root())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string());
    changes.record(rel, change_type, now);
}
