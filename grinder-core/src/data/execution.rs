//! Execution entities (spec §3, §6): OrderRecord, ExecutionState,
//! SymbolConstraints, OrderIdentity / OrderIdentityConfig.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::env;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

use super::decision::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected | OrderState::Expired
        )
    }

    /// Whether `self -> next` is a legal state-machine edge (spec §3):
    /// `PENDING -> OPEN -> (PARTIALLY_FILLED)* -> {FILLED, CANCELLED,
    /// REJECTED, EXPIRED}`.
    pub fn can_transition_to(self, next: OrderState) -> bool {
        use OrderState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Pending, Open) | (Pending, Rejected) | (Pending, Cancelled) => true,
            (Open, PartiallyFilled)
            | (Open, Filled)
            | (Open, Cancelled)
            | (Open, Expired)
            | (Open, Rejected) => true,
            (PartiallyFilled, PartiallyFilled)
            | (PartiallyFilled, Filled)
            | (PartiallyFilled, Cancelled)
            | (PartiallyFilled, Expired) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub state: OrderState,
    pub level_id: String,
    pub created_ts: i64,
}

/// The last price/quantity we quoted at a level, alongside the resting
/// order id (spec §4.5: REPLACE is only emitted when a level's wanted
/// price or quantity has actually moved away from what's resting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub order_id: String,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Per-symbol bookkeeping of what we believe is resting on the exchange
/// (spec §3). Invariant: at most one order per `(symbol, side, level_id)`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    pub active_orders: BTreeMap<(Side, String), RestingOrder>,
    pub pending_cancels: BTreeSet<String>,
    pub fill_history: Vec<OrderRecord>,
}

impl ExecutionState {
    pub fn order_at(&self, side: Side, level_id: &str) -> Option<&RestingOrder> {
        self.active_orders.get(&(side, level_id.to_string()))
    }

    pub fn set_order(&mut self, side: Side, level_id: &str, order_id: String, price: Decimal, quantity: Decimal) {
        self.active_orders.insert(
            (side, level_id.to_string()),
            RestingOrder { order_id, price, quantity },
        );
    }

    pub fn clear_order(&mut self, side: Side, level_id: &str) -> Option<RestingOrder> {
        self.active_orders.remove(&(side, level_id.to_string()))
    }
}

/// Exchange-enforced quantization, loaded from cached exchange-info
/// (spec §3, §6 persisted state layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolConstraints {
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub tick_size: Decimal,
}

impl SymbolConstraints {
    /// Quantizes `price` down to the nearest `tick_size` (spec §9:
    /// ROUND_DOWN for quantization).
    pub fn quantize_price(&self, price: Decimal) -> Decimal {
        quantize_down(price, self.tick_size)
    }

    /// Quantizes `qty` down to the nearest `step_size`.
    pub fn quantize_qty(&self, qty: Decimal) -> Decimal {
        quantize_down(qty, self.step_size)
    }
}

fn quantize_down(value: Decimal, increment: Decimal) -> Decimal {
    if increment.is_zero() {
        return value;
    }
    let steps = (value / increment).round_dp_with_strategy(0, RoundingStrategy::ToZero);
    steps * increment
}

/// Parsed components of a client-order-id (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIdentity {
    pub prefix: String,
    pub strategy_id: String,
    pub symbol: String,
    pub level_id: String,
    pub ts: i64,
    pub seq: u64,
    pub is_legacy: bool,
}

pub const LEGACY_STRATEGY_MARKER: &str = "__legacy__";

#[derive(Debug, Clone)]
pub struct OrderIdentityConfig {
    pub prefix: String,
    pub strategy_id: String,
    pub allowed_strategies: HashSet<String>,
    pub require_strategy_allowlist: bool,
    pub allow_legacy_format: bool,
}

impl Default for OrderIdentityConfig {
    fn default() -> Self {
        Self::new("grinder_".to_string(), "default".to_string())
    }
}

impl OrderIdentityConfig {
    pub fn new(prefix: String, strategy_id: String) -> Self {
        let prefix = if prefix.ends_with('_') {
            prefix
        } else {
            format!("{prefix}_")
        };
        let allow_legacy_format = env::var("ALLOW_LEGACY_ORDER_ID")
            .map(|v| v == "1")
            .unwrap_or(false);
        let mut allowed_strategies = HashSet::new();
        allowed_strategies.insert(strategy_id.clone());
        Self {
            prefix,
            strategy_id,
            allowed_strategies,
            require_strategy_allowlist: true,
            allow_legacy_format,
        }
    }

    pub fn is_strategy_allowed(&self, strategy_id: &str) -> bool {
        if !self.require_strategy_allowlist {
            return true;
        }
        if strategy_id == LEGACY_STRATEGY_MARKER {
            return self.allow_legacy_format;
        }
        self.allowed_strategies.contains(strategy_id)
    }

    pub fn is_ours(&self, client_order_id: &str) -> bool {
        match parse_client_order_id(client_order_id) {
            Some(parsed) => {
                parsed.prefix == self.prefix && self.is_strategy_allowed(&parsed.strategy_id)
            }
            None => false,
        }
    }
}

fn v1_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<prefix>\w+_)(?P<strategy_id>[^_]+)_(?P<symbol>[A-Z0-9]+)_(?P<level_id>\w+)_(?P<ts>\d+)_(?P<seq>\d+)$")
            .expect("static regex is valid")
    })
}

fn legacy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<prefix>grinder_)(?P<symbol>[A-Z0-9]+)_(?P<level_id>\w+)_(?P<ts>\d+)_(?P<seq>\d+)$")
            .expect("static regex is valid")
    })
}

pub fn parse_client_order_id(client_order_id: &str) -> Option<OrderIdentity> {
    if client_order_id.is_empty() {
        return None;
    }
    if let Some(caps) = v1_pattern().captures(client_order_id) {
        return Some(OrderIdentity {
            prefix: caps["prefix"].to_string(),
            strategy_id: caps["strategy_id"].to_string(),
            symbol: caps["symbol"].to_string(),
            level_id: caps["level_id"].to_string(),
            ts: caps["ts"].parse().ok()?,
            seq: caps["seq"].parse().ok()?,
            is_legacy: false,
        });
    }
    if let Some(caps) = legacy_pattern().captures(client_order_id) {
        return Some(OrderIdentity {
            prefix: caps["prefix"].to_string(),
            strategy_id: LEGACY_STRATEGY_MARKER.to_string(),
            symbol: caps["symbol"].to_string(),
            level_id: caps["level_id"].to_string(),
            ts: caps["ts"].parse().ok()?,
            seq: caps["seq"].parse().ok()?,
            is_legacy: true,
        });
    }
    None
}

pub fn generate_client_order_id(
    config: &OrderIdentityConfig,
    symbol: &str,
    level_id: &str,
    ts: i64,
    seq: u64,
) -> String {
    format!(
        "{}{}_{}_{}_{}_{}",
        config.prefix, config.strategy_id, symbol, level_id, ts, seq
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_trip_generate_parse() {
        let config = OrderIdentityConfig::new("grinder_".into(), "momentum".into());
        let id = generate_client_order_id(&config, "BTCUSDT", "1", 1_704_067_200_000, 1);
        assert_eq!(id, "grinder_momentum_BTCUSDT_1_1704067200000_1");
        let parsed = parse_client_order_id(&id).unwrap();
        assert_eq!(parsed.prefix, "grinder_");
        assert_eq!(parsed.strategy_id, "momentum");
        assert_eq!(parsed.symbol, "BTCUSDT");
        assert_eq!(parsed.level_id, "1");
        assert_eq!(parsed.ts, 1_704_067_200_000);
        assert_eq!(parsed.seq, 1);
        assert!(!parsed.is_legacy);
    }

    #[test]
    fn legacy_format_parses_with_marker_strategy() {
        let parsed = parse_client_order_id("grinder_BTCUSDT_1_1704067200000_1").unwrap();
        assert_eq!(parsed.strategy_id, LEGACY_STRATEGY_MARKER);
        assert!(parsed.is_legacy);
    }

    #[test]
    fn is_ours_respects_allowlist() {
        let config = OrderIdentityConfig::new("grinder_".into(), "momentum".into());
        let ours = generate_client_order_id(&config, "BTCUSDT", "1", 1, 1);
        assert!(config.is_ours(&ours));

        let other = OrderIdentityConfig::new("grinder_".into(), "other".into());
        let theirs = generate_client_order_id(&other, "BTCUSDT", "1", 1, 1);
        assert!(!config.is_ours(&theirs));
    }

    #[test]
    fn quantize_down_truncates_toward_zero() {
        let c = SymbolConstraints {
            step_size: dec!(0.001),
            min_qty: dec!(0.001),
            tick_size: dec!(0.01),
        };
        assert_eq!(c.quantize_qty(dec!(0.0129)), dec!(0.012));
        assert_eq!(c.quantize_price(dec!(100.127)), dec!(100.12));
    }

    #[test]
    fn order_state_terminal_transitions_are_closed() {
        assert!(!OrderState::Filled.can_transition_to(OrderState::Open));
        assert!(OrderState::Pending.can_transition_to(OrderState::Open));
        assert!(OrderState::Open.can_transition_to(OrderState::PartiallyFilled));
        assert!(OrderState::PartiallyFilled.can_transition_to(OrderState::Filled));
    }
}
