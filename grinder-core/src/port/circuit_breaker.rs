//! Per-operation CircuitBreaker (spec §4.7), ported from the original
//! `connectors/circuit_breaker.py`: one `CLOSED/OPEN/HALF_OPEN` state machine
//! per op name, all guarded by a single mutex since transitions are rare
//! compared to the read-mostly `allow()` check.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::CircuitState;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_interval_ms: i64,
    pub half_open_probe_count: u32,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_interval_ms: 30_000,
            half_open_probe_count: 1,
            success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct OpState {
    state: CircuitStateInner,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at_ms: i64,
    half_open_probes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CircuitStateInner {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl From<CircuitStateInner> for CircuitState {
    fn from(s: CircuitStateInner) -> Self {
        match s {
            CircuitStateInner::Closed => CircuitState::Closed,
            CircuitStateInner::Open => CircuitState::Open,
            CircuitStateInner::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CircuitBreakerStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub state_transitions: u64,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    states: Mutex<HashMap<String, OpState>>,
    stats: Mutex<CircuitBreakerStats>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            states: Mutex::new(HashMap::new()),
            stats: Mutex::new(CircuitBreakerStats::default()),
        }
    }

    fn maybe_transition_to_half_open(&self, op_state: &mut OpState, stats: &mut CircuitBreakerStats) {
        if op_state.state != CircuitStateInner::Open {
            return;
        }
        let elapsed = self.clock.now_ms() - op_state.opened_at_ms;
        if elapsed >= self.config.open_interval_ms {
            op_state.state = CircuitStateInner::HalfOpen;
            op_state.half_open_probes = 0;
            op_state.consecutive_successes = 0;
            stats.state_transitions += 1;
        }
    }

    fn transition_to_open(&self, op_state: &mut OpState, stats: &mut CircuitBreakerStats) {
        op_state.state = CircuitStateInner::Open;
        op_state.opened_at_ms = self.clock.now_ms();
        op_state.half_open_probes = 0;
        op_state.consecutive_successes = 0;
        stats.state_transitions += 1;
    }

    fn transition_to_closed(&self, op_state: &mut OpState, stats: &mut CircuitBreakerStats) {
        op_state.state = CircuitStateInner::Closed;
        op_state.consecutive_failures = 0;
        op_state.consecutive_successes = 0;
        stats.state_transitions += 1;
    }

    pub fn state(&self, op: &str) -> CircuitState {
        let mut states = self.states.lock();
        let mut stats = self.stats.lock();
        let op_state = states.entry(op.to_string()).or_default();
        self.maybe_transition_to_half_open(op_state, &mut stats);
        op_state.state.into()
    }

    /// Returns true if the operation may proceed. In HALF_OPEN, allows up to
    /// `half_open_probe_count` probes before rejecting further callers.
    pub fn allow(&self, op: &str) -> bool {
        let mut states = self.states.lock();
        let mut stats = self.stats.lock();
        stats.total_calls += 1;
        let op_state = states.entry(op.to_string()).or_default();
        self.maybe_transition_to_half_open(op_state, &mut stats);

        match op_state.state {
            CircuitStateInner::Closed => true,
            CircuitStateInner::Open => {
                stats.rejected_calls += 1;
                false
            }
            CircuitStateInner::HalfOpen => {
                if op_state.half_open_probes < self.config.half_open_probe_count {
                    op_state.half_open_probes += 1;
                    true
                } else {
                    stats.rejected_calls += 1;
                    false
                }
            }
        }
    }

    pub fn record_success(&self, op: &str) {
        let mut states = self.states.lock();
        let mut stats = self.stats.lock();
        stats.successful_calls += 1;
        let op_state = states.entry(op.to_string()).or_default();

        match op_state.state {
            CircuitStateInner::Closed => {
                op_state.consecutive_failures = 0;
            }
            CircuitStateInner::HalfOpen => {
                op_state.consecutive_successes += 1;
                if op_state.consecutive_successes >= self.config.success_threshold {
                    self.transition_to_closed(op_state, &mut stats);
                }
            }
            CircuitStateInner::Open => {}
        }
    }

    /// `trip_on` is the caller's responsibility: only call this for errors
    /// the retry/error-classification layer deems breaker-worthy
    /// (`PortError::trips_circuit`).
    pub fn record_failure(&self, op: &str) {
        let mut states = self.states.lock();
        let mut stats = self.stats.lock();
        stats.failed_calls += 1;
        let op_state = states.entry(op.to_string()).or_default();

        match op_state.state {
            CircuitStateInner::Closed => {
                op_state.consecutive_failures += 1;
                op_state.consecutive_successes = 0;
                if op_state.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(op_state, &mut stats);
                }
            }
            CircuitStateInner::HalfOpen => {
                self.transition_to_open(op_state, &mut stats);
            }
            CircuitStateInner::Open => {}
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        self.stats.lock().clone()
    }
}
