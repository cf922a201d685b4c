//! ToxicityGate (spec §4.3): adverse microstructure detection. Also
//! exposes `ToxicityVerdict` for the regime classifier (spec §4.2 priority
//! 2), since both consume the same detection.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::data::OrderIntent;

use super::{Gate, GatingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToxicityVerdict {
    pub blocked: bool,
    pub reason_code: &'static str,
}

pub struct ToxicityConfig {
    pub spread_spike_bps: i64,
    pub price_impact_bps: i64,
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self {
            spread_spike_bps: 150,
            price_impact_bps: 80,
        }
    }
}

/// Tracks the most recently observed spread and a rolling notion of price
/// impact per evaluation; updated by the caller from the feature engine's
/// output before each gating pass.
pub struct ToxicityGate {
    config: ToxicityConfig,
    current_spread_bps: AtomicI64,
    current_price_impact_bps: AtomicI64,
}

impl ToxicityGate {
    pub fn new(config: ToxicityConfig) -> Self {
        Self {
            config,
            current_spread_bps: AtomicI64::new(0),
            current_price_impact_bps: AtomicI64::new(0),
        }
    }

    pub fn update(&self, spread_bps: i64, price_impact_bps: i64) {
        self.current_spread_bps.store(spread_bps, Ordering::SeqCst);
        self.current_price_impact_bps
            .store(price_impact_bps, Ordering::SeqCst);
    }

    pub fn verdict(&self) -> ToxicityVerdict {
        let spread = self.current_spread_bps.load(Ordering::SeqCst);
        if spread > self.config.spread_spike_bps {
            return ToxicityVerdict {
                blocked: true,
                reason_code: "SPREAD_SPIKE",
            };
        }
        let impact = self.current_price_impact_bps.load(Ordering::SeqCst);
        if impact > self.config.price_impact_bps {
            return ToxicityVerdict {
                blocked: true,
                reason_code: "PRICE_IMPACT",
            };
        }
        ToxicityVerdict {
            blocked: false,
            reason_code: "",
        }
    }
}

impl Gate for ToxicityGate {
    fn name(&self) -> &'static str {
        "toxicity"
    }

    fn evaluate(&self, _intent: &OrderIntent) -> GatingResult {
        let verdict = self.verdict();
        if !verdict.blocked {
            return GatingResult::allow();
        }
        let reason = match verdict.reason_code {
            "SPREAD_SPIKE" => "SPREAD_SPIKE",
            _ => "PRICE_IMPACT_HIGH",
        };
        GatingResult::block(reason, format!("{}bps", self.current_price_impact_bps.load(Ordering::SeqCst)))
    }
}
