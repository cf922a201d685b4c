//! ConsecutiveLossGuard: a standalone, disabled-by-default safety interlock
//! that trips on a run of losing roundtrips, ported from the original
//! `risk/consecutive_loss_guard.py`. There is no spec.md/SPEC_FULL.md
//! section for this one — it is carried over purely because the original
//! system has it as a named, self-contained module; see SPEC_FULL.md's
//! original_source coverage notes for the decision to include it.
//!
//! Pure state machine, no I/O: `loss` increments the streak, `win`/
//! `breakeven` resets it, anything else is a no-op. `update` returns
//! `true` only on the update that causes the transition into tripped,
//! mirroring the original's "evidence on the edge, not on every call"
//! contract.

use parking_lot::Mutex;

use crate::data::{ConsecutiveLossAction, ConsecutiveLossState};

#[derive(Debug, Clone, Copy)]
pub struct ConsecutiveLossConfig {
    pub enabled: bool,
    pub threshold: u32,
    pub action: ConsecutiveLossAction,
}

impl Default for ConsecutiveLossConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 5,
            action: ConsecutiveLossAction::Pause,
        }
    }
}

pub struct ConsecutiveLossGuard {
    config: ConsecutiveLossConfig,
    state: Mutex<ConsecutiveLossState>,
}

impl ConsecutiveLossGuard {
    pub fn new(config: ConsecutiveLossConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ConsecutiveLossState::default()),
        }
    }

    /// Processes one roundtrip outcome (`"win"`, `"loss"`, or
    /// `"breakeven"`; anything else is ignored). Returns `true` only when
    /// this call is the one that crosses `threshold`.
    pub fn update(&self, outcome: &str, row_id: Option<String>, ts_ms: Option<i64>) -> bool {
        if !self.config.enabled {
            return false;
        }
        if !matches!(outcome, "win" | "loss" | "breakeven") {
            return false;
        }

        let mut state = self.state.lock();
        let was_tripped = state.tripped;

        if outcome == "loss" {
            let count = state.count + 1;
            let tripped = count >= self.config.threshold;
            *state = ConsecutiveLossState {
                count,
                tripped,
                last_row_id: row_id,
                last_ts_ms: ts_ms,
            };
            return tripped && !was_tripped;
        }

        *state = ConsecutiveLossState {
            count: 0,
            tripped: false,
            last_row_id: row_id,
            last_ts_ms: ts_ms,
        };
        false
    }

    pub fn reset(&self) {
        *self.state.lock() = ConsecutiveLossState::default();
    }

    pub fn is_tripped(&self) -> bool {
        self.state.lock().tripped
    }

    pub fn action(&self) -> ConsecutiveLossAction {
        self.config.action
    }

    pub fn state(&self) -> ConsecutiveLossState {
        self.state.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_never_trips() {
        let guard = ConsecutiveLossGuard::new(ConsecutiveLossConfig::default());
        for _ in 0..10 {
            assert!(!guard.update("loss", None, None));
        }
        assert!(!guard.is_tripped());
    }

    #[test]
    fn trips_on_the_update_that_reaches_threshold() {
        let guard = ConsecutiveLossGuard::new(ConsecutiveLossConfig {
            enabled: true,
            threshold: 3,
            action: ConsecutiveLossAction::Pause,
        });
        assert!(!guard.update("loss", Some("r1".into()), Some(1000)));
        assert!(!guard.update("loss", Some("r2".into()), Some(2000)));
        assert!(guard.update("loss", Some("r3".into()), Some(3000)));
        assert!(guard.is_tripped());
        assert_eq!(guard.state().count, 3);
    }

    #[test]
    fn win_or_breakeven_resets_the_streak() {
        let guard = ConsecutiveLossGuard::new(ConsecutiveLossConfig {
            enabled: true,
            threshold: 3,
            action: ConsecutiveLossAction::Degraded,
        });
        guard.update("loss", None, None);
        guard.update("loss", None, None);
        assert!(!guard.update("breakeven", None, None));
        assert_eq!(guard.state().count, 0);
        guard.update("loss", None, None);
        assert!(!guard.is_tripped());
    }

    #[test]
    fn unknown_outcome_is_a_no_op() {
        let guard = ConsecutiveLossGuard::new(ConsecutiveLossConfig {
            enabled: true,
            threshold: 1,
            action: ConsecutiveLossAction::Pause,
        });
        assert!(!guard.update("scratch", None, None));
        assert_eq!(guard.state().count, 0);
    }

    #[test]
    fn already_tripped_does_not_retrigger() {
        let guard = ConsecutiveLossGuard::new(ConsecutiveLossConfig {
            enabled: true,
            threshold: 1,
            action: ConsecutiveLossAction::Pause,
        });
        assert!(guard.update("loss", None, None));
        assert!(!guard.update("loss", None, None));
    }

    #[test]
    fn reset_clears_count_and_latch() {
        let guard = ConsecutiveLossGuard::new(ConsecutiveLossConfig {
            enabled: true,
            threshold: 1,
            action: ConsecutiveLossAction::Pause,
        });
        guard.update("loss", None, None);
        assert!(guard.is_tripped());
        guard.reset();
        assert!(!guard.is_tripped());
        assert_eq!(guard.state().count, 0);
    }
}
