//! # Foresight Predict
//!
//! The online learning loop: capture what the assistant touches, learn
//! which files matter for which intents, and predict the next reads.
//!
//! ```text
//! hook event ──> Capture ──> Scorer / Transitions writes
//!                   │
//! prompt ──────────-┴──> Engine ──> candidates ──> composite ──> log
//!                           ▲                          │
//!                        Tuner (Thompson arms) <── hit/miss (Ledger)
//! ```

mod cache;
mod capture;
mod engine;
mod error;
pub mod keywords;
mod ledger;
pub mod patterns;
mod tuner;

pub use cache::{CachedCandidate, IntentCache, CACHE_TTL};
pub use capture::{CapturePipeline, CaptureWorker, IntentRecord, IntentStats};
pub use engine::{
    EngineConfig, PredictInput, PredictOutcome, Predicted, PredictionEngine, REASON_BELOW_FLOOR,
    REASON_COLD_START, REASON_NO_KEYWORDS,
};
pub use error::{PredictError, Result};
pub use ledger::{
    CumulativeCounters, PredictionLedger, PredictionRecord, RollingWindowStats, TrendDirection,
    FINALIZE_GRACE_SECS, FINALIZE_WINDOW_SECS, HIT_AT_K, ROLLING_WINDOW_HOURS,
};
pub use tuner::{ArmSelection, ArmSpec, ArmState, Tuner, ARMS, ARM_COUNT};
