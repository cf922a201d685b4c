//! Market entities (spec §3): Snapshot, FeatureSnapshot, MidBar.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single top-of-book market observation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ts: i64,
    pub symbol: String,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub bid_qty: Decimal,
    pub ask_qty: Decimal,
    pub last_price: Decimal,
    pub last_qty: Decimal,
}

impl Snapshot {
    pub fn mid_price(&self) -> Decimal {
        (self.bid_price + self.ask_price) / Decimal::from(2)
    }

    /// `(ask - bid) / mid * 10_000`, as an integer (truncated toward zero,
    /// spec §4.1).
    pub fn spread_bps(&self) -> i64 {
        let mid = self.mid_price();
        if mid.is_zero() {
            return 0;
        }
        let bps = (self.ask_price - self.bid_price) / mid * Decimal::from(10_000);
        bps.trunc().try_into().unwrap_or(i64::MAX)
    }
}

/// One feature vector per processed snapshot per symbol (spec §4.1). `None`
/// fields such as `atr`/`natr_bps` are absent until the warmup window fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub ts: i64,
    pub symbol: String,
    pub mid_price: Decimal,
    pub spread_bps: i64,
    pub imbalance_l1_bps: i64,
    pub thin_l1: Decimal,
    pub natr_bps: Option<i64>,
    pub atr: Option<Decimal>,
    pub sum_abs_returns_bps: i64,
    pub net_return_bps: i64,
    pub range_score: i64,
    pub warmup_bars: usize,
}

/// OHLC bar over mid-prices for a fixed interval, built by `BarBuilder`
/// (see `crate::features`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidBar {
    pub open_ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snap(bid: Decimal, ask: Decimal) -> Snapshot {
        Snapshot {
            ts: 0,
            symbol: "BTCUSDT".into(),
            bid_price: bid,
            ask_price: ask,
            bid_qty: dec!(1),
            ask_qty: dec!(1),
            last_price: bid,
            last_qty: dec!(1),
        }
    }

    #[test]
    fn mid_price_is_average() {
        let s = snap(dec!(100), dec!(102));
        assert_eq!(s.mid_price(), dec!(101));
    }

    #[test]
    fn spread_bps_is_truncated_integer() {
        let s = snap(dec!(100), dec!(100.5));
        // (0.5 / 100.25) * 10000 ~= 49.8 -> 49
        assert_eq!(s.spread_bps(), 49);
    }
}
