//! Prefilter gate (spec §4.3): static universe admission.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::data::OrderIntent;

use super::{Gate, GatingResult};

#[derive(Debug, Clone)]
pub struct SymbolStats {
    pub blacklisted: bool,
    pub delisting: bool,
    pub spread_bps: i64,
    pub vol_24h: Decimal,
    pub vol_1h: Decimal,
    pub trade_count_1h: u64,
    pub open_interest: Decimal,
}

#[derive(Debug, Clone)]
pub struct PrefilterConfig {
    pub blacklist: HashSet<String>,
    pub spread_max_bps: i64,
    pub vol_24h_min: Decimal,
    pub vol_1h_min: Decimal,
    pub trade_count_min: u64,
    pub oi_min: Decimal,
}

pub struct PrefilterGate {
    config: PrefilterConfig,
    stats_by_symbol: std::collections::HashMap<String, SymbolStats>,
}

impl PrefilterGate {
    pub fn new(config: PrefilterConfig) -> Self {
        Self {
            config,
            stats_by_symbol: std::collections::HashMap::new(),
        }
    }

    pub fn update_stats(&mut self, symbol: impl Into<String>, stats: SymbolStats) {
        self.stats_by_symbol.insert(symbol.into(), stats);
    }
}

impl Gate for PrefilterGate {
    fn name(&self) -> &'static str {
        "prefilter"
    }

    fn evaluate(&self, intent: &OrderIntent) -> GatingResult {
        if self.config.blacklist.contains(&intent.symbol) {
            return GatingResult::block("BLACKLISTED", intent.symbol.clone());
        }
        let Some(stats) = self.stats_by_symbol.get(&intent.symbol) else {
            // No stats yet: admit by default (warmup), same as the regime
            // classifier treating missing features as warmup, not a block.
            return GatingResult::allow();
        };
        if stats.blacklisted {
            return GatingResult::block("BLACKLISTED", intent.symbol.clone());
        }
        if stats.delisting {
            return GatingResult::block("DELISTING", intent.symbol.clone());
        }
        if stats.spread_bps > self.config.spread_max_bps {
            return GatingResult::block(
                "SPREAD_TOO_HIGH",
                format!("{} > {}", stats.spread_bps, self.config.spread_max_bps),
            );
        }
        if stats.vol_24h < self.config.vol_24h_min {
            return GatingResult::block("VOL_24H_TOO_LOW", intent.symbol.clone());
        }
        if stats.vol_1h < self.config.vol_1h_min {
            return GatingResult::block("VOL_1H_TOO_LOW", intent.symbol.clone());
        }
        if stats.trade_count_1h < self.config.trade_count_min {
            return GatingResult::block("ACTIVITY_TOO_LOW", intent.symbol.clone());
        }
        if stats.open_interest < self.config.oi_min {
            return GatingResult::block("OI_TOO_LOW", intent.symbol.clone());
        }
        GatingResult::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Side;
    use rust_decimal_macros::dec;

    fn config() -> PrefilterConfig {
        PrefilterConfig {
            blacklist: HashSet::new(),
            spread_max_bps: 100,
            vol_24h_min: dec!(1000),
            vol_1h_min: dec!(10),
            trade_count_min: 5,
            oi_min: dec!(100),
        }
    }

    fn intent(symbol: &str) -> OrderIntent {
        OrderIntent {
            symbol: symbol.into(),
            side: Side::Buy,
            price: dec!(100),
            quantity: dec!(1),
            reason: "grid".into(),
            level_id: "1".into(),
        }
    }

    fn healthy_stats() -> SymbolStats {
        SymbolStats {
            blacklisted: false,
            delisting: false,
            spread_bps: 10,
            vol_24h: dec!(5000),
            vol_1h: dec!(100),
            trade_count_1h: 50,
            open_interest: dec!(1000),
        }
    }

    #[test]
    fn blacklisted_symbol_blocked() {
        let mut cfg = config();
        cfg.blacklist.insert("BTCUSDT".into());
        let gate = PrefilterGate::new(cfg);
        let r = gate.evaluate(&intent("BTCUSDT"));
        assert_eq!(r.reason, Some("BLACKLISTED"));
    }

    #[test]
    fn healthy_symbol_passes() {
        let mut gate = PrefilterGate::new(config());
        gate.update_stats("BTCUSDT", healthy_stats());
        assert!(gate.evaluate(&intent("BTCUSDT")).allowed);
    }

    #[test]
    fn low_volume_blocked() {
        let mut gate = PrefilterGate::new(config());
        let mut stats = healthy_stats();
        stats.vol_24h = dec!(1);
        gate.update_stats("BTCUSDT", stats);
        let r = gate.evaluate(&intent("BTCUSDT"));
        assert_eq!(r.reason, Some("VOL_24H_TOO_LOW"));
    }
}
