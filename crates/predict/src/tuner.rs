//! Online weight tuning as a Thompson-sampled multi-armed bandit.
//!
//! Each arm is one discrete `(w_rec, w_freq, w_tag)` configuration with a
//! Beta(α, β) posterior over its hit rate. Selection samples every
//! posterior and plays the argmax, which explores exactly as much as the
//! uncertainty warrants.

use foresight_ranking::{Keys, ScoreStore, Weights};
use rand_distr::{Beta, Distribution};
use std::sync::Arc;

pub const ARM_COUNT: usize = 8;

/// α/β cap; exceeding it halves both, preserving the ratio.
const POSTERIOR_CAP: f64 = 1e6;

pub struct ArmSpec {
    pub name: &'static str,
    pub weights: Weights,
}

pub const ARMS: [ArmSpec; ARM_COUNT] = [
    ArmSpec {
        name: "recency-heavy",
        weights: Weights { recency: 0.50, frequency: 0.30, tag: 0.20 },
    },
    ArmSpec {
        name: "balanced-rf",
        weights: Weights { recency: 0.40, frequency: 0.40, tag: 0.20 },
    },
    ArmSpec {
        name: "default",
        weights: Weights { recency: 0.40, frequency: 0.30, tag: 0.30 },
    },
    ArmSpec {
        name: "frequency-heavy",
        weights: Weights { recency: 0.30, frequency: 0.40, tag: 0.30 },
    },
    ArmSpec {
        name: "tag-heavy",
        weights: Weights { recency: 0.30, frequency: 0.30, tag: 0.40 },
    },
    ArmSpec {
        name: "low-recency",
        weights: Weights { recency: 0.20, frequency: 0.40, tag: 0.40 },
    },
    ArmSpec {
        name: "high-rec-low-freq",
        weights: Weights { recency: 0.50, frequency: 0.20, tag: 0.30 },
    },
    ArmSpec {
        name: "equal",
        weights: Weights { recency: 0.33, frequency: 0.33, tag: 0.34 },
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmState {
    pub alpha: f64,
    pub beta: f64,
    pub pulls: u64,
}

impl ArmState {
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArmSelection {
    pub index: usize,
    pub name: &'static str,
    pub weights: Weights,
}

pub struct Tuner {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
}

impl Tuner {
    #[must_use]
    pub fn new(store: Arc<dyn ScoreStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    /// Read one arm's posterior. Corrupt state resets only that arm.
    #[must_use]
    pub fn arm_state(&self, index: usize) -> ArmState {
        let key = self.keys.tuner_arm(index);
        let fields = self.store.hgetall(&key);
        if fields.is_empty() {
            return ArmState { alpha: 1.0, beta: 1.0, pulls: 0 };
        }

        let alpha = fields.get("alpha").and_then(|v| v.parse::<f64>().ok());
        let beta = fields.get("beta").and_then(|v| v.parse::<f64>().ok());
        let pulls = fields
            .get("pulls")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        match (alpha, beta) {
            (Some(alpha), Some(beta)) if alpha >= 1.0 && beta >= 1.0 && alpha.is_finite() && beta.is_finite() => {
                ArmState { alpha, beta, pulls }
            }
            _ => {
                log::warn!("tuner arm {index} state corrupt, resetting to Beta(1,1)");
                self.write_arm(index, ArmState { alpha: 1.0, beta: 1.0, pulls });
                ArmState { alpha: 1.0, beta: 1.0, pulls }
            }
        }
    }

    fn write_arm(&self, index: usize, state: ArmState) {
        let key = self.keys.tuner_arm(index);
        self.store.hset(&key, "alpha", &state.alpha.to_string());
        self.store.hset(&key, "beta", &state.beta.to_string());
        self.store.hset(&key, "pulls", &state.pulls.to_string());
    }

    /// Thompson sampling: draw `θ_k ~ Beta(α_k, β_k)` per arm, play the
    /// argmax. No arm can starve since every posterior has full support.
    #[must_use]
    pub fn select_arm(&self) -> ArmSelection {
        let mut rng = rand::thread_rng();
        let mut best_index = 0usize;
        let mut best_sample = f64::MIN;

        for index in 0..ARM_COUNT {
            let state = self.arm_state(index);
            let sample = match Beta::new(state.alpha, state.beta) {
                Ok(dist) => dist.sample(&mut rng),
                Err(_) => {
                    log::warn!("tuner arm {index} produced invalid Beta params, resetting");
                    self.write_arm(index, ArmState { alpha: 1.0, beta: 1.0, pulls: state.pulls });
                    0.5
                }
            };
            if sample > best_sample {
                best_sample = sample;
                best_index = index;
            }
        }

        let mut state = self.arm_state(best_index);
        state.pulls += 1;
        self.write_arm(best_index, state);

        ArmSelection {
            index: best_index,
            name: ARMS[best_index].name,
            weights: ARMS[best_index].weights,
        }
    }

    /// Posterior update: a hit bumps α, a miss bumps β; no other arm
    /// changes.
    pub fn update_arm(&self, index: usize, hit: bool) {
        if index >= ARM_COUNT {
            log::warn!("ignoring feedback for unknown tuner arm {index}");
            return;
        }
        let mut state = self.arm_state(index);
        if hit {
            state.alpha += 1.0;
        } else {
            state.beta += 1.0;
        }
        if state.alpha > POSTERIOR_CAP || state.beta > POSTERIOR_CAP {
            state.alpha = (state.alpha / 2.0).max(1.0);
            state.beta = (state.beta / 2.0).max(1.0);
        }
        self.write_arm(index, state);
    }

    /// Exploitation view: the arm with the highest posterior mean.
    #[must_use]
    pub fn best_arm(&self) -> ArmSelection {
        let mut best_index = 0usize;
        let mut best_mean = f64::MIN;
        for index in 0..ARM_COUNT {
            let mean = self.arm_state(index).mean();
            if mean > best_mean {
                best_mean = mean;
                best_index = index;
            }
        }
        ArmSelection {
            index: best_index,
            name: ARMS[best_index].name,
            weights: ARMS[best_index].weights,
        }
    }

    pub fn reset_arms(&self) {
        for index in 0..ARM_COUNT {
            self.write_arm(index, ArmState { alpha: 1.0, beta: 1.0, pulls: 0 });
        }
    }

    #[must_use]
    pub fn all_states(&self) -> Vec<ArmState> {
        (0..ARM_COUNT).map(|i| self.arm_state(i)).collect()
    }

    /// Total posterior updates across arms (each starts at Beta(1,1)).
    #[must_use]
    pub fn total_updates(&self) -> u64 {
        self.all_states()
            .iter()
            .map(|s| (s.alpha + s.beta - 2.0).max(0.0) as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_ranking::MemoryStore;
    use pretty_assertions::assert_eq;

    fn tuner() -> Tuner {
        Tuner::new(Arc::new(MemoryStore::new()), Keys::new("test"))
    }

    #[test]
    fn arms_start_at_uniform_priors() {
        let t = tuner();
        for state in t.all_states() {
            assert_eq!(state.alpha, 1.0);
            assert_eq!(state.beta, 1.0);
        }
        assert_eq!(t.total_updates(), 0);
    }

    #[test]
    fn update_moves_exactly_one_arm_by_one() {
        let t = tuner();
        t.update_arm(3, true);
        for (index, state) in t.all_states().iter().enumerate() {
            let expected = if index == 3 { 3.0 } else { 2.0 };
            assert_eq!(state.alpha + state.beta, expected);
        }
        t.update_arm(3, false);
        let state = t.arm_state(3);
        assert_eq!(state.alpha, 2.0);
        assert_eq!(state.beta, 2.0);
    }

    #[test]
    fn strong_posterior_dominates_selection() {
        let t = tuner();
        for _ in 0..99 {
            t.update_arm(2, true);
        }
        let mut wins = 0;
        for _ in 0..100 {
            if t.select_arm().index == 2 {
                wins += 1;
            }
        }
        assert!(wins > 50, "expected arm 2 to dominate, won {wins}/100");
    }

    #[test]
    fn uniform_priors_explore_every_arm() {
        let t = tuner();
        let mut seen = [false; ARM_COUNT];
        for _ in 0..500 {
            seen[t.select_arm().index] = true;
        }
        assert!(seen.iter().all(|s| *s), "selection starved an arm: {seen:?}");
    }

    #[test]
    fn corrupt_arm_resets_alone() {
        let t = tuner();
        t.update_arm(1, true);
        let key = t.keys.tuner_arm(0);
        t.store.hset(&key, "alpha", "not-a-number");

        let state = t.arm_state(0);
        assert_eq!(state.alpha, 1.0);
        assert_eq!(state.beta, 1.0);
        // Arm 1 untouched by the reset.
        assert_eq!(t.arm_state(1).alpha, 2.0);
    }

    #[test]
    fn posterior_cap_preserves_ratio() {
        let t = tuner();
        let key = t.keys.tuner_arm(0);
        t.store.hset(&key, "alpha", &(POSTERIOR_CAP).to_string());
        t.store.hset(&key, "beta", "2000000");
        t.store.hset(&key, "pulls", "0");

        t.update_arm(0, true);
        let state = t.arm_state(0);
        assert!(state.alpha <= POSTERIOR_CAP);
        assert!(state.beta <= POSTERIOR_CAP);
        let ratio = state.alpha / state.beta;
        assert!((ratio - (POSTERIOR_CAP + 1.0) / 2_000_000.0).abs() / ratio < 1e-6);
    }

    #[test]
    fn best_arm_reports_highest_mean() {
        let t = tuner();
        t.update_arm(5, true);
        t.update_arm(5, true);
        t.update_arm(1, false);
        let best = t.best_arm();
        assert_eq!(best.index, 5);
        assert_eq!(best.name, "low-recency");
    }

    #[test]
    fn reset_restores_uniform_priors() {
        let t = tuner();
        t.update_arm(0, true);
        t.update_arm(7, false);
        t.reset_arms();
        assert_eq!(t.total_updates(), 0);
    }
}
