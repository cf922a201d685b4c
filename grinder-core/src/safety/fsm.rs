//! System FSM (spec §4.10): the top-level operational state machine that
//! gates which order intents are allowed to flow past the gating chain.

use parking_lot::Mutex;

use crate::data::SystemState;

/// An intent category the FSM can block per-state. Coarser than
/// `OrderIntent` itself: the FSM cares whether an action increases risk or
/// reduces it, not the specific side/price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    IncreaseRisk,
    ReduceRisk,
    Cancel,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::IncreaseRisk => "increase_risk",
            IntentKind::ReduceRisk => "reduce_risk",
            IntentKind::Cancel => "cancel",
        }
    }
}

/// Inputs observed by the FSM at each tick (spec §4.10 condition column).
#[derive(Debug, Clone, Copy, Default)]
pub struct FsmInputs {
    pub health_ok: bool,
    pub armed: bool,
    pub paused_override: bool,
    pub emergency_tripped: bool,
    pub toxicity_mid_severity: bool,
    pub position_reduced: bool,
    pub stop_requested: bool,
}

pub struct SystemFsm {
    state: Mutex<SystemState>,
}

impl Default for SystemFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemFsm {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SystemState::Init),
        }
    }

    pub fn state(&self) -> SystemState {
        *self.state.lock()
    }

    /// Applies one tick of the transition table (spec §4.10). Idempotent: if
    /// no condition holds, the state is unchanged. `SHUTDOWN` is absorbing
    /// from every state once `stop_requested` is observed.
    pub fn tick(&self, inputs: FsmInputs) -> SystemState {
        let mut state = self.state.lock();

        if inputs.stop_requested {
            *state = SystemState::Shutdown;
            return *state;
        }

        *state = match *state {
            SystemState::Init if inputs.health_ok => SystemState::Ready,
            SystemState::Ready if inputs.armed && !inputs.paused_override && !inputs.emergency_tripped => {
                SystemState::Active
            }
            SystemState::Active if inputs.emergency_tripped => SystemState::Emergency,
            SystemState::Active if inputs.paused_override => SystemState::Paused,
            SystemState::Active if inputs.toxicity_mid_severity => SystemState::Throttled,
            SystemState::Throttled if inputs.emergency_tripped => SystemState::Emergency,
            SystemState::Throttled if !inputs.toxicity_mid_severity => SystemState::Active,
            SystemState::Emergency if inputs.position_reduced && !inputs.emergency_tripped => SystemState::Paused,
            other => other,
        };
        *state
    }

    /// Whether `kind` is permitted to proceed in the current state (spec
    /// §4.10: `INCREASE_RISK` blocked in PAUSED/EMERGENCY).
    pub fn allows(&self, kind: IntentKind) -> bool {
        let state = self.state();
        match (state, kind) {
            (SystemState::Paused | SystemState::Emergency, IntentKind::IncreaseRisk) => false,
            (SystemState::Init | SystemState::Ready | SystemState::Shutdown, _) => false,
            (SystemState::Emergency, IntentKind::Cancel | IntentKind::ReduceRisk) => true,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_to_active_happy_path() {
        let fsm = SystemFsm::new();
        assert_eq!(fsm.tick(FsmInputs { health_ok: true, ..Default::default() }), SystemState::Ready);
        assert_eq!(
            fsm.tick(FsmInputs {
                health_ok: true,
                armed: true,
                ..Default::default()
            }),
            SystemState::Active
        );
    }

    #[test]
    fn emergency_trip_then_recovery_to_paused() {
        let fsm = SystemFsm::new();
        fsm.tick(FsmInputs { health_ok: true, ..Default::default() });
        fsm.tick(FsmInputs { health_ok: true, armed: true, ..Default::default() });
        assert_eq!(
            fsm.tick(FsmInputs {
                health_ok: true,
                armed: true,
                emergency_tripped: true,
                ..Default::default()
            }),
            SystemState::Emergency
        );
        assert_eq!(
            fsm.tick(FsmInputs {
                health_ok: true,
                armed: true,
                position_reduced: true,
                ..Default::default()
            }),
            SystemState::Paused
        );
    }

    #[test]
    fn increase_risk_blocked_in_paused_and_emergency() {
        let fsm = SystemFsm::new();
        fsm.tick(FsmInputs { health_ok: true, ..Default::default() });
        fsm.tick(FsmInputs {
            health_ok: true,
            armed: true,
            paused_override: true,
            ..Default::default()
        });
        assert!(!fsm.allows(IntentKind::IncreaseRisk));
        assert!(fsm.allows(IntentKind::Cancel));
    }

    #[test]
    fn stop_requested_shuts_down_from_any_state() {
        let fsm = SystemFsm::new();
        fsm.tick(FsmInputs { health_ok: true, ..Default::default() });
        assert_eq!(fsm.tick(FsmInputs { stop_requested: true, ..Default::default() }), SystemState::Shutdown);
    }
}
