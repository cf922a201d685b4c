//! Gating chain (spec §4.3): an ordered list of gates evaluated
//! short-circuit. Label set is closed: every metric uses only `gate` and
//! `reason`, both drawn from fixed enumerations (no symbol/order_id
//! labels).

pub mod kill_switch_gate;
pub mod prefilter;
pub mod rate_limiter;
pub mod risk;
pub mod toxicity;

use crate::data::OrderIntent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatingResult {
    pub allowed: bool,
    pub reason: Option<&'static str>,
    pub details: Option<String>,
}

impl GatingResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            details: None,
        }
    }

    pub fn block(reason: &'static str, details: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            details: Some(details.into()),
        }
    }
}

pub trait Gate: Send + Sync {
    /// Stable gate name, used as the `gate` metric label.
    fn name(&self) -> &'static str;
    fn evaluate(&self, intent: &OrderIntent) -> GatingResult;
}

/// Runs gates in order, short-circuiting on the first block. Records
/// allow/block counts against the supplied metrics sink.
pub struct GatingChain {
    gates: Vec<Box<dyn Gate>>,
}

impl GatingChain {
    pub fn new(gates: Vec<Box<dyn Gate>>) -> Self {
        Self { gates }
    }

    /// Returns `Ok(())` if every gate allowed the intent, or the first
    /// blocking gate's name and result.
    pub fn evaluate(&self, intent: &OrderIntent) -> Result<(), (&'static str, GatingResult)> {
        for gate in &self.gates {
            let result = gate.evaluate(intent);
            if !result.allowed {
                return Err((gate.name(), result));
            }
        }
        Ok(())
    }
}
