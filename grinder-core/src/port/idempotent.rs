//! IdempotentExchangePort (spec §4.6): wraps any `ExchangePort` with the
//! idempotency-key / retry / circuit-breaker protocol. Only write operations
//! (`place_order`, `cancel_order`, `replace_order`, `place_market_order`,
//! `cancel_all_orders`) go through the full protocol; reads pass through
//! the circuit breaker and retry policy but carry no idempotency key.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::json;

use crate::clock::Clock;
use crate::data::{AccountSnapshot, IdempotencyEntry, IdempotencyStatus, OrderRecord, PositionSnap, Side, DONE_TTL_S, INFLIGHT_TTL_S};
use crate::digest::digest16;
use crate::error::PortError;

use super::circuit_breaker::CircuitBreaker;
use super::retry::{DeadlinePolicy, RetryPolicy};
use super::{ExchangePort, OP_CANCEL_ALL, OP_CANCEL_ORDER, OP_PLACE_MARKET_ORDER, OP_PLACE_ORDER, OP_REPLACE_ORDER};

/// Idempotency-key construction per op (spec §4.6 supplement): excludes
/// timestamp so the same intent produces the same key across retries.
fn idempotency_key(scope: &str, op: &str, params: &serde_json::Value) -> String {
    let payload = json!({ "scope": scope, "op": op, "params": params });
    let canonical = serde_json::to_string(&payload).expect("json serialization of own payload cannot fail");
    digest16(&canonical)
}

fn request_fingerprint(op: &str, params: &serde_json::Value, ts: i64) -> String {
    let payload = json!({ "op": op, "params": params, "ts": ts });
    let canonical = serde_json::to_string(&payload).expect("json serialization of own payload cannot fail");
    digest16(&canonical)
}

pub struct IdempotentExchangePort<P: ExchangePort> {
    inner: P,
    clock: Arc<dyn Clock>,
    circuit: CircuitBreaker,
    retry: RetryPolicy,
    deadlines: DeadlinePolicy,
    scope: String,
    store: DashMap<String, IdempotencyEntry>,
}

impl<P: ExchangePort> IdempotentExchangePort<P> {
    pub fn new(inner: P, clock: Arc<dyn Clock>, circuit: CircuitBreaker, retry: RetryPolicy, scope: String) -> Self {
        Self {
            inner,
            clock,
            circuit,
            retry,
            deadlines: DeadlinePolicy::default(),
            scope,
            store: DashMap::new(),
        }
    }

    pub fn deadline_ms(&self, op: &str) -> u64 {
        self.deadlines.deadline_ms(op)
    }

    fn sweep_expired(&self, now_ms: i64) {
        self.store.retain(|_, entry| !entry.is_expired(now_ms));
    }

    /// The idempotency gate (spec §4.6 steps 1-3). Returns `Ok(Some(cached))`
    /// on a `DONE` hit, `Ok(None)` when the caller should proceed to execute,
    /// or `Err` on a conflict / circuit rejection.
    fn admit(&self, op: &'static str, key: &str, fingerprint: &str) -> Result<Option<String>, PortError> {
        let now = self.clock.now_ms();
        self.sweep_expired(now);

        if !self.circuit.allow(op) {
            return Err(PortError::CircuitOpen(op.to_string(), self.circuit.state(op)));
        }

        let fresh = IdempotencyEntry {
            key: key.to_string(),
            status: IdempotencyStatus::Inflight,
            op_name: op.to_string(),
            request_fingerprint: fingerprint.to_string(),
            created_at: now,
            expires_at: now + INFLIGHT_TTL_S * 1000,
            result: None,
        };

        match self.store.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(fresh);
                Ok(None)
            }
            dashmap::mapref::entry::Entry::Occupied(mut o) => match o.get().status {
                IdempotencyStatus::Done => Ok(o.get().result.clone()),
                IdempotencyStatus::Inflight => Err(PortError::Conflict),
                IdempotencyStatus::Failed => {
                    o.insert(fresh);
                    Ok(None)
                }
            },
        }
    }

    fn mark_done(&self, key: &str, result: &str) {
        if let Some(mut entry) = self.store.get_mut(key) {
            entry.status = IdempotencyStatus::Done;
            entry.result = Some(result.to_string());
            entry.expires_at = self.clock.now_ms() + DONE_TTL_S * 1000;
        }
    }

    fn mark_failed(&self, key: &str) {
        if let Some(mut entry) = self.store.get_mut(key) {
            entry.status = IdempotencyStatus::Failed;
            entry.expires_at = self.clock.now_ms() + INFLIGHT_TTL_S * 1000;
        }
    }

    /// Executes `f` under the retry policy for `op`, recording circuit
    /// breaker outcomes per spec §4.7's integration order: `allow` happens in
    /// `admit`, then execute-with-retries, then record success/failure once
    /// on the terminal outcome.
    fn execute_with_retry<T>(&self, op: &'static str, mut f: impl FnMut() -> Result<T, PortError>) -> Result<T, PortError> {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(v) => {
                    self.circuit.record_success(op);
                    return Ok(v);
                }
                Err(e) => {
                    let retryable = matches!(&e, PortError::Transient(r) if self.retry.is_retryable(*r));
                    if retryable && attempt + 1 < self.retry.max_attempts {
                        attempt += 1;
                        self.clock.sleep_ms(self.retry.compute_delay_ms(attempt));
                        continue;
                    }
                    if e.trips_circuit() {
                        self.circuit.record_failure(op);
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl<P: ExchangePort> ExchangePort for IdempotentExchangePort<P> {
    fn place_order(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        level_id: &str,
        ts: i64,
    ) -> Result<String, PortError> {
        let params = json!({ "symbol": symbol, "side": side, "price": price.to_string(), "quantity": quantity.to_string(), "level_id": level_id });
        let key = idempotency_key(&self.scope, OP_PLACE_ORDER, &params);
        let fingerprint = request_fingerprint(OP_PLACE_ORDER, &params, ts);

        if let Some(cached) = self.admit(OP_PLACE_ORDER, &key, &fingerprint)? {
            return Ok(cached);
        }
        let result = self.execute_with_retry(OP_PLACE_ORDER, || {
            self.inner.place_order(symbol, side, price, quantity, level_id, ts)
        });
        match &result {
            Ok(order_id) => self.mark_done(&key, order_id),
            Err(_) => self.mark_failed(&key),
        }
        result
    }

    fn cancel_order(&self, order_id: &str) -> Result<bool, PortError> {
        let params = json!({ "order_id": order_id });
        let key = idempotency_key(&self.scope, OP_CANCEL_ORDER, &params);
        let fingerprint = request_fingerprint(OP_CANCEL_ORDER, &params, self.clock.now_ms());

        if let Some(cached) = self.admit(OP_CANCEL_ORDER, &key, &fingerprint)? {
            return Ok(cached == "true");
        }
        let result = self.execute_with_retry(OP_CANCEL_ORDER, || self.inner.cancel_order(order_id));
        match &result {
            Ok(cancelled) => self.mark_done(&key, if *cancelled { "true" } else { "false" }),
            Err(_) => self.mark_failed(&key),
        }
        result
    }

    fn replace_order(
        &self,
        order_id: &str,
        new_price: Decimal,
        new_quantity: Decimal,
        ts: i64,
    ) -> Result<String, PortError> {
        let params = json!({ "order_id": order_id, "new_price": new_price.to_string(), "new_quantity": new_quantity.to_string() });
        let key = idempotency_key(&self.scope, OP_REPLACE_ORDER, &params);
        let fingerprint = request_fingerprint(OP_REPLACE_ORDER, &params, ts);

        if let Some(cached) = self.admit(OP_REPLACE_ORDER, &key, &fingerprint)? {
            return Ok(cached);
        }
        let result = self.execute_with_retry(OP_REPLACE_ORDER, || {
            self.inner.replace_order(order_id, new_price, new_quantity, ts)
        });
        match &result {
            Ok(new_order_id) => self.mark_done(&key, new_order_id),
            Err(_) => self.mark_failed(&key),
        }
        result
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<String, PortError> {
        let ts = self.clock.now_ms();
        let params = json!({ "symbol": symbol, "side": side, "quantity": quantity.to_string(), "reduce_only": reduce_only, "ts": ts });
        let key = idempotency_key(&self.scope, OP_PLACE_MARKET_ORDER, &params);
        let fingerprint = request_fingerprint(OP_PLACE_MARKET_ORDER, &params, ts);

        if let Some(cached) = self.admit(OP_PLACE_MARKET_ORDER, &key, &fingerprint)? {
            return Ok(cached);
        }
        let result = self.execute_with_retry(OP_PLACE_MARKET_ORDER, || {
            self.inner.place_market_order(symbol, side, quantity, reduce_only)
        });
        match &result {
            Ok(order_id) => self.mark_done(&key, order_id),
            Err(_) => self.mark_failed(&key),
        }
        result
    }

    fn cancel_all_orders(&self, symbol: &str) -> Result<u64, PortError> {
        self.execute_with_retry(OP_CANCEL_ALL, || {
            if !self.circuit.allow(OP_CANCEL_ALL) {
                return Err(PortError::CircuitOpen(OP_CANCEL_ALL.to_string(), self.circuit.state(OP_CANCEL_ALL)));
            }
            self.inner.cancel_all_orders(symbol)
        })
    }

    fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<OrderRecord>, PortError> {
        self.execute_with_retry(super::OP_GET_OPEN_ORDERS, || self.inner.fetch_open_orders(symbol))
    }

    fn fetch_positions(&self, symbol: Option<&str>) -> Result<Vec<PositionSnap>, PortError> {
        self.execute_with_retry(super::OP_GET_POSITIONS, || self.inner.fetch_positions(symbol))
    }

    fn fetch_account_snapshot(&self) -> Result<AccountSnapshot, PortError> {
        self.execute_with_retry(super::OP_GET_ACCOUNT, || self.inner.fetch_account_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyPort {
        place_calls: AtomicU32,
        fail_times: u32,
    }

    impl ExchangePort for FlakyPort {
        fn place_order(&self, _symbol: &str, _side: Side, _price: Decimal, _quantity: Decimal, _level_id: &str, _ts: i64) -> Result<String, PortError> {
            let n = self.place_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(PortError::Transient(crate::error::Reason::Timeout));
            }
            Ok(format!("order-{n}"))
        }
        fn cancel_order(&self, _order_id: &str) -> Result<bool, PortError> {
            Ok(true)
        }
        fn replace_order(&self, _order_id: &str, _new_price: Decimal, _new_quantity: Decimal, _ts: i64) -> Result<String, PortError> {
            Ok("replaced".into())
        }
        fn place_market_order(&self, _symbol: &str, _side: Side, _quantity: Decimal, _reduce_only: bool) -> Result<String, PortError> {
            Ok("market-order".into())
        }
        fn cancel_all_orders(&self, _symbol: &str) -> Result<u64, PortError> {
            Ok(0)
        }
        fn fetch_open_orders(&self, _symbol: &str) -> Result<Vec<OrderRecord>, PortError> {
            Ok(vec![])
        }
        fn fetch_positions(&self, _symbol: Option<&str>) -> Result<Vec<PositionSnap>, PortError> {
            Ok(vec![])
        }
        fn fetch_account_snapshot(&self) -> Result<AccountSnapshot, PortError> {
            unimplemented!()
        }
    }

    fn port(fail_times: u32) -> IdempotentExchangePort<FlakyPort> {
        let clock = FakeClock::new(1_000);
        IdempotentExchangePort::new(
            FlakyPort { place_calls: AtomicU32::new(0), fail_times },
            clock.clone(),
            CircuitBreaker::new(Default::default(), clock),
            RetryPolicy::for_write(3),
            "test-scope".into(),
        )
    }

    #[test]
    fn same_intent_same_key_replay_hits_cache() {
        let p = port(0);
        let a = p.place_order("BTCUSDT", Side::Buy, dec!(100), dec!(1), "1", 1_000).unwrap();
        let b = p.place_order("BTCUSDT", Side::Buy, dec!(100), dec!(1), "1", 9_999).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn retries_transient_failures_until_success() {
        let p = port(2);
        let result = p.place_order("BTCUSDT", Side::Buy, dec!(100), dec!(1), "1", 1_000);
        assert!(result.is_ok());
    }

    #[test]
    fn concurrent_inflight_request_conflicts() {
        let p = port(0);
        let params = json!({ "symbol": "BTCUSDT", "side": Side::Buy, "price": "100", "quantity": "1", "level_id": "1" });
        let key = idempotency_key("test-scope", OP_PLACE_ORDER, &params);
        p.store.insert(
            key,
            IdempotencyEntry {
                key: "x".into(),
                status: IdempotencyStatus::Inflight,
                op_name: OP_PLACE_ORDER.into(),
                request_fingerprint: "fp".into(),
                created_at: 0,
                expires_at: i64::MAX,
                result: None,
            },
        );
        let result = p.place_order("BTCUSDT", Side::Buy, dec!(100), dec!(1), "1", 1_000);
        assert_eq!(result, Err(PortError::Conflict));
    }
}
