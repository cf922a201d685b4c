//! Grid policies (spec §4.4): deterministic mappings from a feature
//! snapshot and static config to a `GridPlan`. `StaticGridPolicy` is the
//! baseline; this module is the seam future adaptive/trend-aware policies
//! plug into.

use grinder_core::data::{FeatureSnapshot, GridMode, GridPlan, Regime, ResetAction};
use rust_decimal::Decimal;

/// Implemented by anything that turns a feature snapshot into a `GridPlan`.
/// Implementations must be deterministic in their inputs — same features,
/// same plan — per spec §3.
pub trait GridPolicy: Send + Sync {
    fn name(&self) -> &str;
    fn plan(&self, features: &FeatureSnapshot) -> GridPlan;
}

#[derive(Debug, Clone, Copy)]
pub struct StaticGridPolicyConfig {
    pub spacing_bps: i64,
    pub levels: u32,
    pub size_per_level: Decimal,
}

/// Symmetric bilateral grid centered on `mid_price` with a fixed spacing
/// and uniform size schedule (spec §4.4). Never varies regime or skew —
/// always `RANGE`, `skew_bps=0`, `reset_action=NONE`.
pub struct StaticGridPolicy {
    config: StaticGridPolicyConfig,
}

impl StaticGridPolicy {
    pub fn new(config: StaticGridPolicyConfig) -> Self {
        Self { config }
    }
}

impl GridPolicy for StaticGridPolicy {
    fn name(&self) -> &str {
        "static_grid"
    }

    fn plan(&self, features: &FeatureSnapshot) -> GridPlan {
        let levels = self.config.levels;
        GridPlan {
            mode: GridMode::Bilateral,
            center_price: features.mid_price,
            spacing_bps: self.config.spacing_bps,
            levels_up: levels,
            levels_down: levels,
            size_schedule: vec![self.config.size_per_level; levels as usize],
            skew_bps: 0,
            regime: Regime::Range,
            width_bps: self.config.spacing_bps * levels as i64,
            reset_action: ResetAction::None,
            reason_codes: vec!["REGIME_RANGE".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn features(mid: Decimal) -> FeatureSnapshot {
        FeatureSnapshot {
            ts: 0,
            symbol: "BTCUSDT".into(),
            mid_price: mid,
            spread_bps: 1,
            imbalance_l1_bps: 0,
            thin_l1: dec!(1),
            natr_bps: None,
            atr: None,
            sum_abs_returns_bps: 0,
            net_return_bps: 0,
            range_score: 0,
            warmup_bars: 0,
        }
    }

    fn policy() -> StaticGridPolicy {
        StaticGridPolicy::new(StaticGridPolicyConfig {
            spacing_bps: 10,
            levels: 5,
            size_per_level: dec!(0.01),
        })
    }

    #[test]
    fn emits_symmetric_plan_centered_on_mid() {
        let plan = policy().plan(&features(dec!(100)));
        assert_eq!(plan.center_price, dec!(100));
        assert_eq!(plan.levels_up, plan.levels_down);
        assert_eq!(plan.size_schedule, vec![dec!(0.01); 5]);
        assert_eq!(plan.width_bps, 50);
        assert_eq!(plan.regime, Regime::Range);
        assert_eq!(plan.reset_action, ResetAction::None);
        assert_eq!(plan.skew_bps, 0);
        assert!(plan.reason_codes.contains(&"REGIME_RANGE".to_string()));
        plan.check_invariants().unwrap();
    }

    #[test]
    fn deterministic_across_identical_inputs() {
        let f = features(dec!(100));
        assert_eq!(policy().plan(&f), policy().plan(&f));
    }

    #[test]
    fn tracks_mid_price_movement() {
        let a = policy().plan(&features(dec!(100)));
        let b = policy().plan(&features(dec!(200)));
        assert_ne!(a.center_price, b.center_price);
    }
}
