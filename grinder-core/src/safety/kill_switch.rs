//! KillSwitch (spec §4.9), grounded in the teacher's `KillSwitch`
//! (`AtomicU8` state + mutex-guarded reason), minus the OS signal wiring —
//! this kill switch is tripped by internal guards (drawdown, manual,
//! operator error) observed from within the process, not by SIGTERM/
//! SIGUSR.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::data::{KillSwitchReason, KillSwitchState};

pub struct KillSwitch {
    triggered: AtomicBool,
    state: Mutex<KillSwitchState>,
    clock: Arc<dyn Clock>,
}

impl KillSwitch {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            triggered: AtomicBool::new(false),
            state: Mutex::new(KillSwitchState::default()),
            clock,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Idempotent trip (spec §4.9): first reason wins. Later calls with a
    /// different reason are no-ops against the frozen state.
    pub fn trip(&self, reason: KillSwitchReason, details: String) {
        let mut state = self.state.lock();
        if state.triggered {
            return;
        }
        state.triggered = true;
        state.reason = Some(reason);
        state.triggered_at_ts = Some(self.clock.now_ms());
        state.details = Some(details);
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = KillSwitchState::default();
        self.triggered.store(false, Ordering::SeqCst);
    }

    pub fn reason(&self) -> Option<KillSwitchReason> {
        self.state.lock().reason
    }

    pub fn reason_string(&self) -> Option<String> {
        self.state.lock().reason.map(|r| r.as_str().to_string())
    }

    pub fn snapshot(&self) -> KillSwitchState {
        self.state.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn first_trip_wins() {
        let ks = KillSwitch::new(FakeClock::new(100));
        ks.trip(KillSwitchReason::DrawdownLimit, "dd".into());
        ks.trip(KillSwitchReason::Manual, "operator".into());
        let snap = ks.snapshot();
        assert_eq!(snap.reason, Some(KillSwitchReason::DrawdownLimit));
        assert_eq!(snap.details.as_deref(), Some("dd"));
        assert_eq!(snap.triggered_at_ts, Some(100));
    }

    #[test]
    fn reset_clears_state() {
        let ks = KillSwitch::new(FakeClock::new(0));
        ks.trip(KillSwitchReason::Error, "boom".into());
        assert!(ks.is_triggered());
        ks.reset();
        assert!(!ks.is_triggered());
        assert!(ks.reason().is_none());
    }
}
