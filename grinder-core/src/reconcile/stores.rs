//! Expected/observed state stores (spec §4.12), ported from
//! `reconcile/expected_state.py`. `ExpectedStateStore` is a ring buffer with
//! TTL eviction of terminal orders recorded whenever an order is placed;
//! `ObservedStateStore` holds the latest exchange-observed view, replaced
//! wholesale on each `AccountSnapshot` fetch (the original's separate
//! stream/REST update paths collapse to one, since this port only polls).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::clock::Clock;
use crate::data::{
    AccountSnapshot, ExpectedOrder, ExpectedPosition, ObservedOrder, ObservedPosition, OrderState,
};

pub struct ExpectedStateStore {
    max_orders: usize,
    ttl_ms: i64,
    orders: HashMap<String, ExpectedOrder>,
    order_ids: VecDeque<String>,
    positions: HashMap<String, ExpectedPosition>,
    clock: Arc<dyn Clock>,
}

impl ExpectedStateStore {
    pub fn new(max_orders: usize, ttl_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_orders,
            ttl_ms,
            orders: HashMap::new(),
            order_ids: VecDeque::new(),
            positions: HashMap::new(),
            clock,
        }
    }

    pub fn record_order(&mut self, order: ExpectedOrder) {
        self.evict_if_needed();
        if !self.orders.contains_key(&order.client_order_id) {
            self.order_ids.push_back(order.client_order_id.clone());
        }
        self.orders.insert(order.client_order_id.clone(), order);
    }

    pub fn set_status(&mut self, client_order_id: &str, status: OrderState) {
        if let Some(order) = self.orders.get_mut(client_order_id) {
            order.status = status;
        }
    }

    pub fn remove_order(&mut self, client_order_id: &str) {
        if self.orders.remove(client_order_id).is_some() {
            self.order_ids.retain(|id| id != client_order_id);
        }
    }

    pub fn get_order(&self, client_order_id: &str) -> Option<&ExpectedOrder> {
        self.orders.get(client_order_id)
    }

    /// Non-terminal orders within TTL (spec §4.12: the reconcile cycle only
    /// compares against orders we still believe are live).
    pub fn active_orders(&self) -> Vec<&ExpectedOrder> {
        let now = self.clock.now_ms();
        let cutoff = now - self.ttl_ms;
        self.orders
            .values()
            .filter(|o| o.created_ts >= cutoff && !o.status.is_terminal())
            .collect()
    }

    pub fn all_orders(&self) -> Vec<&ExpectedOrder> {
        self.order_ids.iter().filter_map(|id| self.orders.get(id)).collect()
    }

    pub fn set_position(&mut self, position: ExpectedPosition) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn get_position(&self, symbol: &str) -> Option<&ExpectedPosition> {
        self.positions.get(symbol)
    }

    pub fn all_positions(&self) -> Vec<&ExpectedPosition> {
        self.positions.values().collect()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.order_ids.clear();
        self.positions.clear();
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn evict_if_needed(&mut self) {
        let now = self.clock.now_ms();
        let cutoff = now - self.ttl_ms;

        let expired: Vec<String> = self
            .orders
            .values()
            .filter(|o| o.created_ts < cutoff && o.status.is_terminal())
            .map(|o| o.client_order_id.clone())
            .collect();
        for id in expired {
            self.orders.remove(&id);
            self.order_ids.retain(|oid| oid != &id);
        }

        while self.orders.len() >= self.max_orders {
            let terminal_id = self
                .order_ids
                .iter()
                .find(|id| self.orders.get(*id).map(|o| o.status.is_terminal()).unwrap_or(false))
                .cloned();
            match terminal_id {
                Some(id) => {
                    self.orders.remove(&id);
                    self.order_ids.retain(|oid| oid != &id);
                }
                None => {
                    if let Some(oldest) = self.order_ids.pop_front() {
                        self.orders.remove(&oldest);
                    } else {
                        break;
                    }
                }
            }
        }
    }
}

#[derive(Default)]
pub struct ObservedStateStore {
    orders: HashMap<String, ObservedOrder>,
    positions: HashMap<String, ObservedPosition>,
    last_snapshot_ts: i64,
}

impl ObservedStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the store's contents with the given snapshot (spec §4.12:
    /// the observed view is always the latest full poll, not a diff).
    pub fn update_from_snapshot(&mut self, snapshot: &AccountSnapshot) {
        self.orders = snapshot
            .open_orders
            .iter()
            .map(|o| {
                (
                    o.order_id.clone(),
                    ObservedOrder {
                        client_order_id: o.order_id.clone(),
                        symbol: o.symbol.clone(),
                        side: o.side,
                        price: o.price,
                        quantity: o.qty,
                        status: o.status,
                        ts: snapshot.ts,
                    },
                )
            })
            .collect();
        self.positions = snapshot
            .positions
            .iter()
            .map(|p| {
                (
                    p.symbol.clone(),
                    ObservedPosition {
                        symbol: p.symbol.clone(),
                        side: p.side,
                        qty: p.qty,
                        ts: snapshot.ts,
                    },
                )
            })
            .collect();
        self.last_snapshot_ts = snapshot.ts;
    }

    pub fn get_order(&self, client_order_id: &str) -> Option<&ObservedOrder> {
        self.orders.get(client_order_id)
    }

    pub fn open_orders(&self) -> Vec<&ObservedOrder> {
        self.orders.values().filter(|o| !o.status.is_terminal()).collect()
    }

    pub fn get_position(&self, symbol: &str) -> Option<&ObservedPosition> {
        self.positions.get(symbol)
    }

    pub fn last_snapshot_ts(&self) -> i64 {
        self.last_snapshot_ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::data::Side;
    use rust_decimal_macros::dec;

    fn expected(id: &str, status: OrderState, created_ts: i64) -> ExpectedOrder {
        ExpectedOrder {
            client_order_id: id.to_string(),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            price: dec!(100),
            quantity: dec!(1),
            status,
            created_ts,
        }
    }

    #[test]
    fn active_orders_excludes_terminal_and_expired() {
        let clock = FakeClock::new(10_000);
        let mut store = ExpectedStateStore::new(200, 5_000, clock.clone());
        store.record_order(expected("a", OrderState::Open, 9_000));
        store.record_order(expected("b", OrderState::Filled, 9_000));
        store.record_order(expected("c", OrderState::Open, 1_000));
        let active = store.active_orders();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].client_order_id, "a");
    }

    #[test]
    fn ring_buffer_evicts_terminal_before_active_when_full() {
        let clock = FakeClock::new(0);
        let mut store = ExpectedStateStore::new(2, 1_000_000, clock.clone());
        store.record_order(expected("a", OrderState::Filled, 0));
        store.record_order(expected("b", OrderState::Open, 0));
        store.record_order(expected("c", OrderState::Open, 0));
        assert!(store.get_order("a").is_none());
        assert!(store.get_order("b").is_some());
        assert!(store.get_order("c").is_some());
    }

    #[test]
    fn observed_store_replaces_wholesale_on_each_snapshot() {
        use crate::data::{AccountSnapshot, OpenOrderSnap, OrderType};

        let mut store = ObservedStateStore::new();
        let snap1 = AccountSnapshot::build(
            vec![],
            vec![OpenOrderSnap {
                order_id: "o1".into(),
                symbol: "BTCUSDT".into(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                price: dec!(100),
                qty: dec!(1),
                filled_qty: dec!(0),
                reduce_only: false,
                status: OrderState::Open,
                ts: 1,
            }],
            "rest".into(),
        );
        store.update_from_snapshot(&snap1);
        assert!(store.get_order("o1").is_some());

        let snap2 = AccountSnapshot::build(vec![], vec![], "rest".into());
        store.update_from_snapshot(&snap2);
        assert!(store.get_order("o1").is_none());
    }
}
