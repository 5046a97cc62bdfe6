//! Background maintenance: prediction finalization, cache/TTL sweeps, and
//! store persistence. Each loop recovers on the next tick; persistent
//! failure is logged, never fatal.

use crate::app::{now_ms, AppState};
use foresight_predict::{FINALIZE_GRACE_SECS, FINALIZE_WINDOW_SECS};
use std::sync::Arc;
use std::time::Duration;

const FINALIZE_INTERVAL: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

pub fn spawn_background_loops(state: Arc<AppState>) {
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FINALIZE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                for ctx in state.all_contexts() {
                    let arms = ctx.engine.ledger().finalize_stale(
                        now_ms(),
                        FINALIZE_WINDOW_SECS,
                        FINALIZE_GRACE_SECS,
                    );
                    if !arms.is_empty() {
                        log::debug!(
                            "finalized {} stale predictions for {}",
                            arms.len(),
                            ctx.entry.uuid
                        );
                    }
                    for arm in arms {
                        ctx.engine.tuner().update_arm(arm, false);
                    }
                    ctx.engine.ledger().prune(now_ms());
                }
            }
        });
    }

    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let purged = {
                    use foresight_ranking::ScoreStore;
                    state.store().sweep_expired()
                };
                if purged > 0 {
                    log::debug!("swept {purged} expired keys");
                }
            }
        });
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = state.flush().await {
                log::warn!("score store flush failed: {err:#}");
            }
        }
    });
}
