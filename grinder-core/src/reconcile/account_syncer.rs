//! AccountSyncer (spec §4.12), ported from `account/syncer.py`: read-only
//! fetch + invariant checks against `AccountSnapshot`. Never writes to the
//! exchange. Not thread-safe — one instance per reconcile loop.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::warn;

use crate::data::{AccountSnapshot, Mismatch, MismatchType};
use crate::port::ExchangePort;

#[derive(Debug, Default)]
pub struct SyncResult {
    pub snapshot: Option<AccountSnapshot>,
    pub mismatches: Vec<Mismatch>,
    pub error: Option<String>,
}

impl SyncResult {
    pub fn ok(&self) -> bool {
        self.snapshot.is_some() && self.mismatches.is_empty() && self.error.is_none()
    }
}

fn mismatch(mismatch_type: MismatchType, symbol: &str, ts_detected: i64, detail: serde_json::Value) -> Mismatch {
    Mismatch {
        mismatch_type,
        symbol: symbol.to_string(),
        client_order_id: None,
        expected: None,
        observed: Some(detail),
        ts_detected,
        action_plan: "none".to_string(),
    }
}

pub struct AccountSyncer<'p, P: ExchangePort> {
    port: &'p P,
    last_ts: i64,
}

impl<'p, P: ExchangePort> AccountSyncer<'p, P> {
    pub fn new(port: &'p P) -> Self {
        Self { port, last_ts: 0 }
    }

    pub fn last_ts(&self) -> i64 {
        self.last_ts
    }

    pub fn reset(&mut self) {
        self.last_ts = 0;
    }

    /// One sync cycle: fetch, detect mismatches, update `last_ts` unless a
    /// `ts_regression` was flagged (spec §4.12 step 4).
    pub fn sync(&mut self, known_order_ids: Option<&HashSet<String>>) -> SyncResult {
        let snapshot = match self.port.fetch_account_snapshot() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "account sync fetch failed");
                return SyncResult {
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        let mismatches = self.detect_mismatches(&snapshot, known_order_ids);

        if !mismatches.iter().any(|m| m.mismatch_type == MismatchType::TsRegression) {
            self.last_ts = snapshot.ts;
        }

        SyncResult {
            snapshot: Some(snapshot),
            mismatches,
            error: None,
        }
    }

    fn detect_mismatches(&self, snapshot: &AccountSnapshot, known_order_ids: Option<&HashSet<String>>) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();

        if self.last_ts > 0 && snapshot.ts < self.last_ts {
            mismatches.push(mismatch(
                MismatchType::TsRegression,
                "*",
                snapshot.ts,
                json!({"snapshot_ts": snapshot.ts, "last_ts": self.last_ts}),
            ));
        }

        let mut pos_keys = HashSet::new();
        for p in &snapshot.positions {
            let key = (p.symbol.clone(), p.side);
            if !pos_keys.insert(key.clone()) {
                mismatches.push(mismatch(
                    MismatchType::DuplicateKey,
                    &p.symbol,
                    snapshot.ts,
                    json!({"kind": "position", "side": format!("{:?}", p.side)}),
                ));
            }
        }

        let mut order_ids = HashSet::new();
        for o in &snapshot.open_orders {
            if !order_ids.insert(o.order_id.clone()) {
                mismatches.push(mismatch(
                    MismatchType::DuplicateKey,
                    &o.symbol,
                    snapshot.ts,
                    json!({"kind": "order", "order_id": o.order_id}),
                ));
            }
        }

        for p in &snapshot.positions {
            if p.qty < Decimal::ZERO {
                mismatches.push(mismatch(
                    MismatchType::NegativeQty,
                    &p.symbol,
                    snapshot.ts,
                    json!({"kind": "position", "qty": p.qty.to_string()}),
                ));
            }
        }
        for o in &snapshot.open_orders {
            if o.qty < Decimal::ZERO {
                mismatches.push(mismatch(
                    MismatchType::NegativeQty,
                    &o.symbol,
                    snapshot.ts,
                    json!({"kind": "order", "order_id": o.order_id, "qty": o.qty.to_string()}),
                ));
            }
        }

        if let Some(known) = known_order_ids {
            for o in &snapshot.open_orders {
                if !known.contains(&o.order_id) {
                    mismatches.push(mismatch(
                        MismatchType::OrphanOrder,
                        &o.symbol,
                        snapshot.ts,
                        json!({"order_id": o.order_id}),
                    ));
                }
            }
        }

        mismatches
    }

    /// Sum of `price * (qty - filled_qty)` over open orders with positive
    /// remaining quantity.
    pub fn pending_notional(snapshot: &AccountSnapshot) -> Decimal {
        snapshot
            .open_orders
            .iter()
            .map(|o| (o.qty - o.filled_qty, o.price))
            .filter(|(remaining, _)| *remaining > Decimal::ZERO)
            .map(|(remaining, price)| price * remaining)
            .sum()
    }

    /// `sum(|qty| * mark_price)` over all positions.
    pub fn position_notional(snapshot: &AccountSnapshot) -> Decimal {
        snapshot.positions.iter().map(|p| p.qty.abs() * p.mark_price).sum()
    }
}
