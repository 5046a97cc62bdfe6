//! # Foresight Ranking
//!
//! Behavioral ranking for file prediction: every file access updates
//! recency, frequency, per-tag affinity, and session transition edges in a
//! keyed score store. Queries read those signals back normalized to [0,1]
//! and mix them under caller-supplied weights.
//!
//! The store itself is a small verb surface (`ScoreStore`) with an
//! embedded implementation; components never touch keys directly.

mod error;
mod keys;
mod scorer;
mod store;
mod transitions;

pub use error::{RankingError, Result};
pub use keys::Keys;
pub use scorer::{
    frequency_signal, recency_signal, RankedFile, Scorer, Weights, FREQUENCY_CEILING,
    RECENCY_HALF_LIFE_SECS,
};
pub use store::{MemoryStore, ScoreStore, STORE_FORMAT_VERSION};
pub use transitions::{
    TransitionOut, TransitionTracker, MAX_TRANSITIONS_PER_FILE, MIN_TRANSITION_COUNT,
    SESSION_DECAY, TRANSITION_WINDOW_SECS,
};
