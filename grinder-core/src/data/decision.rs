//! Decision entities (spec §3): GridPlan, OrderIntent, Decision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::digest::digest_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Classified market state (GLOSSARY). `PAUSED`/`EMERGENCY` are reachable
/// only via the kill switch / toxicity / warmup branches of the regime
/// classifier, never as a steady-state regime of a healthy market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Range,
    TrendUp,
    TrendDown,
    VolShock,
    ThinBook,
    Toxic,
    Paused,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridMode {
    Bilateral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResetAction {
    None,
    CancelAll,
}

/// A symmetric bilateral order grid proposed by a policy (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    pub mode: GridMode,
    pub center_price: Decimal,
    pub spacing_bps: i64,
    pub levels_up: u32,
    pub levels_down: u32,
    pub size_schedule: Vec<Decimal>,
    pub skew_bps: i64,
    pub regime: Regime,
    pub width_bps: i64,
    pub reset_action: ResetAction,
    pub reason_codes: Vec<String>,
}

impl GridPlan {
    /// Checks the structural invariants from spec §3. Violating these is a
    /// bug in the policy, not a runtime condition to recover from, so
    /// callers assert rather than handle `Err` as a control-flow branch.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.levels_up != self.levels_down {
            return Err(format!(
                "levels_up ({}) != levels_down ({})",
                self.levels_up, self.levels_down
            ));
        }
        let expected_width = self.spacing_bps * self.levels_up as i64;
        if self.width_bps != expected_width {
            return Err(format!(
                "width_bps ({}) != spacing_bps * levels_up ({})",
                self.width_bps, expected_width
            ));
        }
        if self.size_schedule.len() != self.levels_up as usize {
            return Err(format!(
                "size_schedule has {} entries, expected {}",
                self.size_schedule.len(),
                self.levels_up
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub reason: String,
    pub level_id: String,
}

/// One pipeline output for a single symbol/snapshot. `context_hash` is the
/// `digest16` of this struct's own canonical JSON with `context_hash` held
/// at a fixed placeholder, so the hash commits to everything the decision
/// was made from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub ts: i64,
    pub symbol: String,
    pub mode: GridMode,
    pub reason: String,
    pub order_intents: Vec<OrderIntent>,
    pub cancel_order_ids: Vec<String>,
    pub policy_name: String,
    pub context_hash: String,
}

impl Decision {
    /// Computes `context_hash` over every other field and returns a copy
    /// with it populated. Deterministic: same inputs, same hash.
    pub fn with_context_hash(mut self) -> serde_json::Result<Self> {
        self.context_hash = String::new();
        let hash = digest_of(&self)?;
        self.context_hash = hash;
        Ok(self)
    }
}
