//! Feature engine (spec §4.1): per-symbol bar building and feature
//! computation. Not thread-safe by contract — one engine per symbol
//! universe, touched only from the main decision loop (spec §5).

use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;

use crate::data::{FeatureSnapshot, MidBar, Snapshot};

#[derive(Debug, Clone, Copy)]
pub struct FeatureEngineConfig {
    pub bar_interval_ms: i64,
    pub atr_period: usize,
    pub range_horizon: usize,
    pub max_bars_kept: usize,
}

impl Default for FeatureEngineConfig {
    fn default() -> Self {
        Self {
            bar_interval_ms: 60_000,
            atr_period: 14,
            range_horizon: 20,
            max_bars_kept: 200,
        }
    }
}

/// Rolls mid-price ticks into fixed-interval OHLC bars on a timestamp
/// boundary crossing.
#[derive(Debug, Clone)]
struct BarBuilder {
    interval_ms: i64,
    current_open_ts: Option<i64>,
    current: Option<MidBar>,
}

impl BarBuilder {
    fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            current_open_ts: None,
            current: None,
        }
    }

    fn bucket(&self, ts: i64) -> i64 {
        ts - (ts.rem_euclid(self.interval_ms))
    }

    /// Feeds one mid-price tick. Returns a completed bar if this tick
    /// crossed into a new bucket.
    fn feed(&mut self, ts: i64, mid: Decimal) -> Option<MidBar> {
        let bucket = self.bucket(ts);
        match self.current_open_ts {
            None => {
                self.current_open_ts = Some(bucket);
                self.current = Some(MidBar {
                    open_ts: bucket,
                    open: mid,
                    high: mid,
                    low: mid,
                    close: mid,
                });
                None
            }
            Some(open_ts) if open_ts == bucket => {
                if let Some(bar) = self.current.as_mut() {
                    bar.high = bar.high.max(mid);
                    bar.low = bar.low.min(mid);
                    bar.close = mid;
                }
                None
            }
            Some(_) => {
                let completed = self.current.take();
                self.current_open_ts = Some(bucket);
                self.current = Some(MidBar {
                    open_ts: bucket,
                    open: mid,
                    high: mid,
                    low: mid,
                    close: mid,
                });
                completed
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SymbolState {
    builder_interval_ms: i64,
    builder: Option<BarBuilder>,
    bars: VecDeque<MidBar>,
}

/// Maintains per-symbol bar builders and computes `FeatureSnapshot` from
/// each processed market snapshot (spec §4.1). Deterministic over the
/// snapshot sequence: same sequence in, same features out.
pub struct FeatureEngine {
    config: FeatureEngineConfig,
    thin_threshold: Decimal,
    spread_thin_bps: i64,
    vol_shock_bps: i64,
    trend_bps: i64,
    range_max: i64,
    states: HashMap<String, SymbolState>,
}

/// Integer-basis-point thresholds consumed by the feature engine and the
/// regime classifier (spec §4.2: "no floats in config" for determinism).
#[derive(Debug, Clone, Copy)]
pub struct RegimeThresholds {
    pub thin_l1_threshold: Decimal,
    pub spread_thin_bps: i64,
    pub vol_shock_bps: i64,
    pub trend_bps: i64,
    pub range_max: i64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            thin_l1_threshold: dec!(0.01),
            spread_thin_bps: 50,
            vol_shock_bps: 200,
            trend_bps: 30,
            range_max: 40,
        }
    }
}

impl FeatureEngine {
    pub fn new(config: FeatureEngineConfig, thresholds: RegimeThresholds) -> Self {
        Self {
            config,
            thin_threshold: thresholds.thin_l1_threshold,
            spread_thin_bps: thresholds.spread_thin_bps,
            vol_shock_bps: thresholds.vol_shock_bps,
            trend_bps: thresholds.trend_bps,
            range_max: thresholds.range_max,
            states: HashMap::new(),
        }
    }

    fn state_mut(&mut self, symbol: &str) -> &mut SymbolState {
        self.states.entry(symbol.to_string()).or_insert_with(|| SymbolState {
            builder_interval_ms: self.config.bar_interval_ms,
            builder: None,
            bars: VecDeque::new(),
        })
    }

    pub fn process(&mut self, snapshot: &Snapshot) -> FeatureSnapshot {
        let mid = snapshot.mid_price();
        let interval_ms = self.config.bar_interval_ms;
        let max_bars_kept = self.config.max_bars_kept;
        let atr_period = self.config.atr_period;
        let range_horizon = self.config.range_horizon;

        let state = self.state_mut(&snapshot.symbol);
        let builder = state
            .builder
            .get_or_insert_with(|| BarBuilder::new(interval_ms));
        if let Some(completed) = builder.feed(snapshot.ts, mid) {
            state.bars.push_back(completed);
            while state.bars.len() > max_bars_kept {
                state.bars.pop_front();
            }
        }

        let warmup_bars = state.bars.len();

        let spread_bps = snapshot.spread_bps();
        let qty_sum = snapshot.bid_qty + snapshot.ask_qty;
        let imbalance_l1_bps = if qty_sum.is_zero() {
            0
        } else {
            ((snapshot.bid_qty - snapshot.ask_qty) / qty_sum * Decimal::from(10_000))
                .trunc()
                .try_into()
                .unwrap_or(0)
        };
        let thin_l1 = snapshot.bid_qty.min(snapshot.ask_qty);

        let (atr, natr_bps) = compute_atr(&state.bars, atr_period, mid);
        let (sum_abs_returns_bps, net_return_bps, range_score) =
            compute_range_stats(&state.bars, range_horizon);

        FeatureSnapshot {
            ts: snapshot.ts,
            symbol: snapshot.symbol.clone(),
            mid_price: mid,
            spread_bps,
            imbalance_l1_bps,
            thin_l1,
            natr_bps,
            atr,
            sum_abs_returns_bps,
            net_return_bps,
            range_score,
            warmup_bars,
        }
    }

    pub fn thin_threshold(&self) -> Decimal {
        self.thin_threshold
    }
    pub fn spread_thin_bps(&self) -> i64 {
        self.spread_thin_bps
    }
    pub fn vol_shock_bps(&self) -> i64 {
        self.vol_shock_bps
    }
    pub fn trend_bps(&self) -> i64 {
        self.trend_bps
    }
    pub fn range_max(&self) -> i64 {
        self.range_max
    }
}

fn compute_atr(bars: &VecDeque<MidBar>, period: usize, last_mid: Decimal) -> (Option<Decimal>, Option<i64>) {
    if bars.len() < period || period == 0 {
        return (None, None);
    }
    let window: Vec<&MidBar> = bars.iter().rev().take(period).collect();
    let sum: Decimal = window.iter().map(|b| b.high - b.low).sum();
    let atr = sum / Decimal::from(period as u64);
    if last_mid.is_zero() {
        return (Some(atr), None);
    }
    let natr_bps = (atr / last_mid * Decimal::from(10_000))
        .trunc()
        .try_into()
        .ok();
    (Some(atr), natr_bps)
}

fn compute_range_stats(bars: &VecDeque<MidBar>, horizon: usize) -> (i64, i64, i64) {
    if bars.len() < 2 {
        return (0, 0, 0);
    }
    let window: Vec<&MidBar> = bars.iter().rev().take(horizon).collect();
    if window.len() < 2 {
        return (0, 0, 0);
    }
    let mut sum_abs_bps: i64 = 0;
    let mut returns_bps: Vec<i64> = Vec::new();
    for pair in window.windows(2) {
        let (newer, older) = (pair[0], pair[1]);
        if older.close.is_zero() {
            continue;
        }
        let ret_bps: i64 = ((newer.close - older.close) / older.close * Decimal::from(10_000))
            .trunc()
            .try_into()
            .unwrap_or(0);
        sum_abs_bps += ret_bps.abs();
        returns_bps.push(ret_bps);
    }
    let net_return_bps: i64 = returns_bps.iter().sum();
    // range_score: how much of the total movement cancelled itself out.
    // 0 == pure trend (all returns same sign), 100 == pure chop.
    let range_score = if sum_abs_bps == 0 {
        0
    } else {
        100 - ((net_return_bps.abs() * 100) / sum_abs_bps).min(100)
    };
    (sum_abs_bps, net_return_bps, range_score)
}
