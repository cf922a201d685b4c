//! Regime classifier (spec §4.2): a pure function of
//! `(FeatureSnapshot?, kill_switch_active, toxicity_verdict?)` with a fixed
//! priority ordering.

use crate::data::{FeatureSnapshot, Regime};
use crate::features::RegimeThresholds;
use crate::gating::toxicity::ToxicityVerdict;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegimeDecision {
    pub regime: Regime,
    pub reason: String,
    pub confidence: u8,
    pub features_used: bool,
}

/// Classifies the current regime, applying the fixed precedence order from
/// spec §4.2: kill switch, then toxicity, then warmup, then thin book, then
/// vol shock, then trend, else range.
pub fn classify(
    features: Option<&FeatureSnapshot>,
    kill_switch_active: bool,
    toxicity: Option<ToxicityVerdict>,
    thresholds: &RegimeThresholds,
) -> RegimeDecision {
    if kill_switch_active {
        return RegimeDecision {
            regime: Regime::Emergency,
            reason: "KILL_SWITCH_ACTIVE".into(),
            confidence: 100,
            features_used: false,
        };
    }

    if let Some(verdict) = toxicity {
        if verdict.blocked {
            return RegimeDecision {
                regime: Regime::Toxic,
                reason: verdict.reason_code.to_string(),
                confidence: 100,
                features_used: features.is_some(),
            };
        }
    }

    let Some(features) = features else {
        return RegimeDecision {
            regime: Regime::Range,
            reason: "WARMUP".into(),
            confidence: 50,
            features_used: false,
        };
    };

    if features.thin_l1 < thresholds.thin_l1_threshold || features.spread_bps > thresholds.spread_thin_bps
    {
        return RegimeDecision {
            regime: Regime::ThinBook,
            reason: "THIN_BOOK".into(),
            confidence: 90,
            features_used: true,
        };
    }

    if let Some(natr_bps) = features.natr_bps {
        if natr_bps > thresholds.vol_shock_bps {
            return RegimeDecision {
                regime: Regime::VolShock,
                reason: "VOL_SHOCK".into(),
                confidence: 85,
                features_used: true,
            };
        }
    }

    if features.net_return_bps.abs() > thresholds.trend_bps && features.range_score <= thresholds.range_max
    {
        let regime = if features.net_return_bps > 0 {
            Regime::TrendUp
        } else {
            Regime::TrendDown
        };
        return RegimeDecision {
            regime,
            reason: "TREND".into(),
            confidence: 75,
            features_used: true,
        };
    }

    let warmed_up = features.warmup_bars > 0;
    RegimeDecision {
        regime: Regime::Range,
        reason: "RANGE".into(),
        confidence: if warmed_up { 80 } else { 60 },
        features_used: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_features() -> FeatureSnapshot {
        FeatureSnapshot {
            ts: 0,
            symbol: "BTCUSDT".into(),
            mid_price: dec!(100),
            spread_bps: 5,
            imbalance_l1_bps: 0,
            thin_l1: dec!(10),
            natr_bps: Some(10),
            atr: Some(dec!(0.1)),
            sum_abs_returns_bps: 5,
            net_return_bps: 1,
            range_score: 90,
            warmup_bars: 30,
        }
    }

    #[test]
    fn kill_switch_wins_over_everything() {
        let f = base_features();
        let d = classify(Some(&f), true, None, &RegimeThresholds::default());
        assert_eq!(d.regime, Regime::Emergency);
        assert_eq!(d.confidence, 100);
    }

    #[test]
    fn toxicity_beats_thin_book_and_trend() {
        let mut f = base_features();
        f.thin_l1 = dec!(0.0001);
        let verdict = ToxicityVerdict {
            blocked: true,
            reason_code: "SPREAD_SPIKE",
        };
        let d = classify(Some(&f), false, Some(verdict), &RegimeThresholds::default());
        assert_eq!(d.regime, Regime::Toxic);
        assert_eq!(d.reason, "SPREAD_SPIKE");
    }

    #[test]
    fn no_features_is_warmup_range_confidence_50() {
        let d = classify(None, false, None, &RegimeThresholds::default());
        assert_eq!(d.regime, Regime::Range);
        assert_eq!(d.confidence, 50);
    }

    #[test]
    fn thin_book_beats_vol_shock_and_trend() {
        let mut f = base_features();
        f.thin_l1 = dec!(0.001);
        f.natr_bps = Some(500);
        let d = classify(Some(&f), false, None, &RegimeThresholds::default());
        assert_eq!(d.regime, Regime::ThinBook);
    }

    #[test]
    fn vol_shock_beats_trend() {
        let mut f = base_features();
        f.natr_bps = Some(500);
        f.net_return_bps = 50;
        f.range_score = 10;
        let d = classify(Some(&f), false, None, &RegimeThresholds::default());
        assert_eq!(d.regime, Regime::VolShock);
    }

    #[test]
    fn trend_up_and_down_by_sign() {
        let mut f = base_features();
        f.net_return_bps = 50;
        f.range_score = 10;
        let up = classify(Some(&f), false, None, &RegimeThresholds::default());
        assert_eq!(up.regime, Regime::TrendUp);

        f.net_return_bps = -50;
        let down = classify(Some(&f), false, None, &RegimeThresholds::default());
        assert_eq!(down.regime, Regime::TrendDown);
    }

    #[test]
    fn falls_back_to_range() {
        let f = base_features();
        let d = classify(Some(&f), false, None, &RegimeThresholds::default());
        assert_eq!(d.regime, Regime::Range);
        assert_eq!(d.confidence, 80);
    }
}
