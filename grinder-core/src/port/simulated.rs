//! SimulatedExchangePort (spec §8 scenarios 1-2): a deterministic in-memory
//! exchange used by the fixture-replay / paper-engine binary. No network,
//! no retries needed upstream (though it is still wrapped by
//! `IdempotentExchangePort` in the replay binary so the same code path is
//! exercised as in live trading).

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::data::{AccountSnapshot, OrderRecord, OrderState, PositionSnap, Side};
use crate::error::{PortError, Reason};

use super::ExchangePort;

#[derive(Debug, Clone)]
struct RestingOrder {
    record: OrderRecord,
}

/// A fill against a resting order: the crossing rule is simple touch
/// semantics (spec §8 scenario 2) — a BUY fills when `mid <= price`, a SELL
/// fills when `mid >= price`, at the order's own price and full quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedFill {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub ts: i64,
}

pub struct SimulatedExchangePort {
    clock: std::sync::Arc<dyn Clock>,
    orders: Mutex<Vec<RestingOrder>>,
    next_id: AtomicU64,
}

impl SimulatedExchangePort {
    pub fn new(clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            clock,
            orders: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn gen_order_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("sim-{n}")
    }

    /// Evaluates every open order against `mid_price` for `symbol`, removes
    /// filled orders, and returns the fills in order-id order for
    /// determinism.
    pub fn simulate_fills(&self, symbol: &str, mid_price: Decimal) -> Vec<SimulatedFill> {
        let mut orders = self.orders.lock();
        let mut fills = Vec::new();
        orders.retain(|resting| {
            if resting.record.symbol != symbol || resting.record.state.is_terminal() {
                return true;
            }
            let crosses = match resting.record.side {
                Side::Buy => mid_price <= resting.record.price,
                Side::Sell => mid_price >= resting.record.price,
            };
            if crosses {
                fills.push(SimulatedFill {
                    order_id: resting.record.order_id.clone(),
                    symbol: symbol.to_string(),
                    side: resting.record.side,
                    price: resting.record.price,
                    quantity: resting.record.quantity,
                    ts: self.clock.now_ms(),
                });
                false
            } else {
                true
            }
        });
        fills.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        fills
    }
}

impl ExchangePort for SimulatedExchangePort {
    fn place_order(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        level_id: &str,
        ts: i64,
    ) -> Result<String, PortError> {
        let order_id = self.gen_order_id();
        self.orders.lock().push(RestingOrder {
            record: OrderRecord {
                order_id: order_id.clone(),
                symbol: symbol.to_string(),
                side,
                price,
                quantity,
                state: OrderState::Open,
                level_id: level_id.to_string(),
                created_ts: ts,
            },
        });
        Ok(order_id)
    }

    fn cancel_order(&self, order_id: &str) -> Result<bool, PortError> {
        let mut orders = self.orders.lock();
        let before = orders.len();
        orders.retain(|o| o.record.order_id != order_id);
        Ok(orders.len() < before)
    }

    fn replace_order(
        &self,
        order_id: &str,
        new_price: Decimal,
        new_quantity: Decimal,
        ts: i64,
    ) -> Result<String, PortError> {
        let mut orders = self.orders.lock();
        let existing = orders
            .iter()
            .find(|o| o.record.order_id == order_id)
            .cloned()
            .ok_or(PortError::NonRetryable(Reason::Http4xx))?;
        orders.retain(|o| o.record.order_id != order_id);
        let new_id = self.gen_order_id();
        orders.push(RestingOrder {
            record: OrderRecord {
                order_id: new_id.clone(),
                price: new_price,
                quantity: new_quantity,
                created_ts: ts,
                ..existing.record
            },
        });
        Ok(new_id)
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        _reduce_only: bool,
    ) -> Result<String, PortError> {
        let order_id = self.gen_order_id();
        self.orders.lock().push(RestingOrder {
            record: OrderRecord {
                order_id: order_id.clone(),
                symbol: symbol.to_string(),
                side,
                price: Decimal::ZERO,
                quantity,
                state: OrderState::Filled,
                level_id: "market".to_string(),
                created_ts: self.clock.now_ms(),
            },
        });
        Ok(order_id)
    }

    fn cancel_all_orders(&self, symbol: &str) -> Result<u64, PortError> {
        let mut orders = self.orders.lock();
        let before = orders.len();
        orders.retain(|o| o.record.symbol != symbol);
        Ok((before - orders.len()) as u64)
    }

    fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<OrderRecord>, PortError> {
        Ok(self
            .orders
            .lock()
            .iter()
            .filter(|o| o.record.symbol == symbol)
            .map(|o| o.record.clone())
            .collect())
    }

    fn fetch_positions(&self, _symbol: Option<&str>) -> Result<Vec<PositionSnap>, PortError> {
        Ok(vec![])
    }

    fn fetch_account_snapshot(&self) -> Result<AccountSnapshot, PortError> {
        Ok(AccountSnapshot::build(vec![], vec![], "simulated".to_string()))
    }
}
