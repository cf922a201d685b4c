//! Account entities (spec §3): PositionSnap, OpenOrderSnap, AccountSnapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::decision::Side;
use super::execution::OrderState;
use crate::digest::canonical_json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnap {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: Decimal,
    pub ts: i64,
}

fn side_rank(s: Side) -> u8 {
    match s {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

impl PositionSnap {
    fn sort_key(&self) -> (&str, u8) {
        (&self.symbol, side_rank(self.side))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrderSnap {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub qty: Decimal,
    pub filled_qty: Decimal,
    pub reduce_only: bool,
    pub status: OrderState,
    pub ts: i64,
}

impl OpenOrderSnap {
    fn sort_key(&self) -> (&str, u8, &str, Decimal, Decimal, &str) {
        (
            &self.symbol,
            side_rank(self.side),
            order_type_rank(self.order_type),
            self.price,
            self.qty,
            &self.order_id,
        )
    }
}

fn order_type_rank(t: OrderType) -> &'static str {
    match t {
        OrderType::Limit => "LIMIT",
        OrderType::Market => "MARKET",
    }
}

/// Whole-account view from the exchange (spec §3): both arrays must be in
/// canonical sort order and `ts` is the max of the component timestamps, so
/// that `render(rebuild(load(render(s)))) == render(s)` (invariant 2, §8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub positions: Vec<PositionSnap>,
    pub open_orders: Vec<OpenOrderSnap>,
    pub ts: i64,
    pub source: String,
}

impl AccountSnapshot {
    /// Builds a snapshot from possibly-unsorted components: sorts both
    /// arrays into canonical order and sets `ts` to the max component ts.
    pub fn build(mut positions: Vec<PositionSnap>, mut open_orders: Vec<OpenOrderSnap>, source: String) -> Self {
        positions.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        open_orders.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let ts = positions
            .iter()
            .map(|p| p.ts)
            .chain(open_orders.iter().map(|o| o.ts))
            .max()
            .unwrap_or(0);
        Self {
            positions,
            open_orders,
            ts,
            source,
        }
    }

    pub fn is_canonically_sorted(&self) -> bool {
        self.positions.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key())
            && self
                .open_orders
                .windows(2)
                .all(|w| w[0].sort_key() <= w[1].sort_key())
    }

    pub fn render(&self) -> serde_json::Result<String> {
        canonical_json(self)
    }
}
