//! Intent capture: hook events in, ranking-store writes and prediction
//! feedback out.
//!
//! The host-facing handler enqueues onto a bounded channel and returns
//! immediately; a single worker per project drains it, which also keeps
//! per-session event ordering. A full queue drops the newest event and
//! counts it rather than ever blocking the host.

use crate::engine::{PredictInput, PredictionEngine};
use crate::patterns;
use foresight_protocol::{IntentEvent, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

const TIMELINE_CAP: usize = 1_000;
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub timestamp: u64,
    pub session_id: String,
    pub tool: String,
    pub files: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntentStats {
    pub total_records: u64,
    pub unique_tags: u64,
    pub unique_files: u64,
    pub sessions: u64,
}

pub struct CapturePipeline {
    engine: Arc<PredictionEngine>,
}

impl CapturePipeline {
    #[must_use]
    pub fn new(engine: Arc<PredictionEngine>) -> Self {
        Self { engine }
    }

    /// Interpret one hook event. Failures never propagate; this is the
    /// fire-and-forget side of the system.
    pub async fn handle_event(&self, event: &IntentEvent) {
        let now_s = event.timestamp / 1_000;
        match event.kind() {
            ToolKind::SessionStart => {
                self.engine
                    .transitions()
                    .session_start(&event.session_id, now_s);
            }
            ToolKind::Prompt => self.handle_prompt(event).await,
            kind => self.handle_tool_use(event, kind),
        }
    }

    /// Prompt submit: precompute and log a prediction so subsequent reads
    /// in this session can resolve against it.
    async fn handle_prompt(&self, event: &IntentEvent) {
        let Some(prompt) = event.prompt.as_deref() else {
            return;
        };
        if prompt.trim().is_empty() {
            return;
        }

        let tags = patterns::tags_for_event(ToolKind::Prompt, &[], Some(prompt));
        self.push_timeline(IntentRecord {
            timestamp: event.timestamp / 1_000,
            session_id: event.session_id.clone(),
            tool: event.tool.clone(),
            files: Vec::new(),
            tags,
        });

        let outcome = self
            .engine
            .predict(
                PredictInput {
                    intent: Some(prompt.to_string()),
                    session: event.session_id.clone(),
                    ..PredictInput::default()
                },
                event.timestamp,
            )
            .await;
        if let Some(reason) = outcome.reason {
            log::debug!("prompt prediction skipped: {reason}");
        }
    }

    fn handle_tool_use(&self, event: &IntentEvent, kind: ToolKind) {
        let paths = event.paths();
        if paths.is_empty() {
            return;
        }
        let tags = patterns::tags_for_event(kind, &paths, None);
        let now_s = event.timestamp / 1_000;

        for path in &paths {
            // Hit attribution first, so this very access can resolve a
            // prediction logged moments earlier.
            if kind.resolves_predictions() {
                for arm in self
                    .engine
                    .ledger()
                    .resolve_on_access(&event.session_id, path, event.timestamp)
                {
                    self.engine.tuner().update_arm(arm, true);
                }
            }

            self.engine.scorer().record_access(path, &tags, now_s);
            self.engine
                .transitions()
                .observe_access(&event.session_id, path, now_s);
        }

        self.push_timeline(IntentRecord {
            timestamp: now_s,
            session_id: event.session_id.clone(),
            tool: event.tool.clone(),
            files: paths,
            tags,
        });
    }

    fn push_timeline(&self, record: IntentRecord) {
        let store = self.engine.store();
        let keys = self.engine.keys();
        match serde_json::to_string(&record) {
            Ok(raw) => {
                store.lpush_capped(&keys.intent_timeline(), &raw, TIMELINE_CAP);
                store.hincrby(&keys.counters(), "intent_records", 1);
            }
            Err(err) => log::warn!("failed to serialize intent record: {err}"),
        }
    }

    /// Recent intent records, newest first.
    #[must_use]
    pub fn recent(&self, since: Option<u64>, limit: usize) -> Vec<IntentRecord> {
        self.engine
            .store()
            .lrange(&self.engine.keys().intent_timeline(), TIMELINE_CAP)
            .into_iter()
            .filter_map(|raw| serde_json::from_str::<IntentRecord>(&raw).ok())
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .take(limit)
            .collect()
    }

    /// Intent records for one session, oldest first.
    #[must_use]
    pub fn session_records(&self, session: &str) -> Vec<IntentRecord> {
        let mut records: Vec<IntentRecord> = self
            .recent(None, TIMELINE_CAP)
            .into_iter()
            .filter(|r| r.session_id == session)
            .collect();
        records.reverse();
        records
    }

    #[must_use]
    pub fn stats(&self) -> IntentStats {
        let total_records = self
            .engine
            .store()
            .hget(&self.engine.keys().counters(), "intent_records")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        IntentStats {
            total_records,
            unique_tags: self.engine.scorer().all_tags().len() as u64,
            unique_files: self.engine.scorer().files_tracked() as u64,
            sessions: self.engine.transitions().session_count() as u64,
        }
    }
}

/// Handle held by the HTTP layer: enqueue and return.
///
/// A single drain task per project preserves per-session event order.
/// When the queue is full the oldest unprocessed event is evicted to make
/// room, so a stalled drain sheds stale history first.
#[derive(Clone)]
pub struct CaptureWorker {
    queue: Arc<Mutex<VecDeque<IntentEvent>>>,
    notify: Arc<Notify>,
    dropped: Arc<AtomicU64>,
}

impl CaptureWorker {
    /// Spawn the drain task and hand back the enqueue side.
    #[must_use]
    pub fn start(pipeline: Arc<CapturePipeline>) -> Self {
        let queue: Arc<Mutex<VecDeque<IntentEvent>>> = Arc::new(Mutex::new(VecDeque::new()));
        let notify = Arc::new(Notify::new());

        let drain_queue = Arc::clone(&queue);
        let drain_notify = Arc::clone(&notify);
        tokio::spawn(async move {
            loop {
                let next = {
                    let mut pending = drain_queue.lock().expect("capture queue poisoned");
                    pending.pop_front()
                };
                match next {
                    Some(event) => pipeline.handle_event(&event).await,
                    None => drain_notify.notified().await,
                }
            }
        });

        Self {
            queue,
            notify,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Non-blocking enqueue. Under backpressure the oldest queued event is
    /// dropped and counted; the host hook never waits.
    pub fn enqueue(&self, event: IntentEvent) -> bool {
        let mut accepted = true;
        {
            let mut pending = self.queue.lock().expect("capture queue poisoned");
            if pending.len() >= QUEUE_CAPACITY {
                pending.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("capture queue full, dropping oldest event");
                accepted = false;
            }
            pending.push_back(event);
        }
        self.notify.notify_one();
        accepted
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
