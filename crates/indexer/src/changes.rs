//! In-memory change log fed by the watcher, queried by `/changes`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_RECORDS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub file: String,
    pub timestamp: u64,
    pub change_type: ChangeType,
}

pub struct ChangeLog {
    session_start: u64,
    records: Mutex<VecDeque<ChangeRecord>>,
}

impl ChangeLog {
    #[must_use]
    pub fn new(session_start: u64) -> Self {
        Self {
            session_start,
            records: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn session_start(&self) -> u64 {
        self.session_start
    }

    pub fn record(&self, file: impl Into<String>, change_type: ChangeType, now: u64) {
        let mut records = self.records.lock().expect("change log lock poisoned");
        records.push_back(ChangeRecord {
            file: file.into(),
            timestamp: now,
            change_type,
        });
        if records.len() > MAX_RECORDS {
            records.pop_front();
        }
    }

    #[must_use]
    pub fn since(&self, since: u64) -> Vec<ChangeRecord> {
        let records = self.records.lock().expect("change log lock poisoned");
        records
            .iter()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect()
    }
}
