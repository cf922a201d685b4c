//! Reconciliation (spec §4.12): compares expected vs observed exchange
//! state and, on mismatch, evaluates a remediation budget (§4.13) and audit
//! log (§4.14) before any corrective action is taken. Detection and
//! remediation gating are strictly separated: `ReconcileEngine::run` only
//! ever detects and writes an audit trail — a `RECONCILE_RUN` event per
//! cycle and a `REMEDIATE_ATTEMPT`/`REMEDIATE_RESULT` pair per mismatch a
//! caller chooses to act on.

pub mod account_syncer;
pub mod audit;
pub mod budget;
pub mod stores;

use std::collections::HashSet;

use tracing::warn;

use crate::clock::Clock;
use crate::data::{Mismatch, MismatchType, OrderIdentityConfig};
use crate::reconcile::stores::{ExpectedStateStore, ObservedStateStore};

pub use account_syncer::{AccountSyncer, SyncResult};
pub use audit::{AuditConfig, AuditEvent, AuditEventType, AuditWriter};
pub use budget::{BudgetState, RemediationBudget, RemediationBudgetConfig};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub enabled: bool,
    pub order_grace_period_ms: i64,
    pub symbol_filter: Option<String>,
}

pub struct ReconcileEngine {
    config: ReconcileConfig,
    identity: OrderIdentityConfig,
    clock: std::sync::Arc<dyn Clock>,
}

impl ReconcileEngine {
    pub fn new(config: ReconcileConfig, identity: OrderIdentityConfig, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self { config, identity, clock }
    }

    /// Runs one reconciliation cycle (spec §4.12 steps 1-3): expected
    /// orders vs observed, observed-but-unexpected orders we own, and
    /// nonzero positions the expected side has marked flat.
    pub fn run(&self, expected: &ExpectedStateStore, observed: &ObservedStateStore) -> Vec<Mismatch> {
        if !self.config.enabled {
            return Vec::new();
        }

        let now = self.clock.now_ms();
        let mut mismatches = Vec::new();
        mismatches.extend(self.check_expected_orders(expected, observed, now));
        mismatches.extend(self.check_unexpected_orders(expected, observed, now));
        mismatches.extend(self.check_positions(expected, observed, now));

        for m in &mismatches {
            warn!(
                mismatch_type = m.mismatch_type.as_str(),
                symbol = %m.symbol,
                client_order_id = ?m.client_order_id,
                action_plan = %m.action_plan,
                "reconcile mismatch detected"
            );
        }

        mismatches
    }

    fn in_scope(&self, symbol: &str) -> bool {
        match &self.config.symbol_filter {
            Some(filter) => filter == symbol,
            None => true,
        }
    }

    fn check_expected_orders(&self, expected: &ExpectedStateStore, observed: &ObservedStateStore, now: i64) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();
        for order in expected.active_orders() {
            if !self.in_scope(&order.symbol) {
                continue;
            }
            match observed.get_order(&order.client_order_id) {
                None => {
                    let age_ms = now - order.created_ts;
                    if age_ms > self.config.order_grace_period_ms {
                        mismatches.push(Mismatch {
                            mismatch_type: MismatchType::OrderMissingOnExchange,
                            symbol: order.symbol.clone(),
                            client_order_id: Some(order.client_order_id.clone()),
                            expected: serde_json::to_value(order).ok(),
                            observed: None,
                            ts_detected: now,
                            action_plan: format!(
                                "would cancel order {} (missing on exchange after {age_ms}ms)",
                                order.client_order_id
                            ),
                        });
                    }
                }
                Some(observed_order) => {
                    if observed_order.status.is_terminal() {
                        continue;
                    }
                    use crate::data::OrderState;
                    if !matches!(observed_order.status, OrderState::Open | OrderState::PartiallyFilled) {
                        mismatches.push(Mismatch {
                            mismatch_type: MismatchType::OrderStatusDivergence,
                            symbol: order.symbol.clone(),
                            client_order_id: Some(order.client_order_id.clone()),
                            expected: serde_json::to_value(order).ok(),
                            observed: serde_json::to_value(observed_order).ok(),
                            ts_detected: now,
                            action_plan: format!(
                                "status divergence: expected={:?}, observed={:?}",
                                order.status, observed_order.status
                            ),
                        });
                    }
                }
            }
        }
        mismatches
    }

    fn check_unexpected_orders(&self, expected: &ExpectedStateStore, observed: &ObservedStateStore, now: i64) -> Vec<Mismatch> {
        let expected_cids: HashSet<&str> = expected
            .all_orders()
            .into_iter()
            .map(|o| o.client_order_id.as_str())
            .collect();

        observed
            .open_orders()
            .into_iter()
            .filter(|o| self.in_scope(&o.symbol))
            .filter(|o| self.identity.is_ours(&o.client_order_id))
            .filter(|o| !expected_cids.contains(o.client_order_id.as_str()))
            .map(|o| Mismatch {
                mismatch_type: MismatchType::OrderExistsUnexpected,
                symbol: o.symbol.clone(),
                client_order_id: Some(o.client_order_id.clone()),
                expected: None,
                observed: serde_json::to_value(o).ok(),
                ts_detected: now,
                action_plan: format!("would cancel unexpected order {}", o.client_order_id),
            })
            .collect()
    }

    fn check_positions(&self, expected: &ExpectedStateStore, observed: &ObservedStateStore, now: i64) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();
        for expected_pos in expected.all_positions() {
            if !self.in_scope(&expected_pos.symbol) {
                continue;
            }
            let Some(observed_pos) = observed.get_position(&expected_pos.symbol) else {
                continue;
            };
            if expected_pos.qty.is_zero() && !observed_pos.qty.is_zero() {
                mismatches.push(Mismatch {
                    mismatch_type: MismatchType::PositionNonzeroUnexpected,
                    symbol: expected_pos.symbol.clone(),
                    client_order_id: None,
                    expected: serde_json::to_value(expected_pos).ok(),
                    observed: serde_json::to_value(observed_pos).ok(),
                    ts_detected: now,
                    action_plan: format!(
                        "would flatten position {} (observed={})",
                        expected_pos.symbol, observed_pos.qty
                    ),
                });
            }
        }
        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::data::{AccountSnapshot, ExpectedOrder, ExpectedPosition, OpenOrderSnap, OrderState, OrderType, Side};
    use rust_decimal_macros::dec;

    fn engine(clock: std::sync::Arc<dyn Clock>) -> ReconcileEngine {
        ReconcileEngine::new(
            ReconcileConfig {
                enabled: true,
                order_grace_period_ms: 5_000,
                symbol_filter: None,
            },
            OrderIdentityConfig::new("grinder_".into(), "default".into()),
            clock,
        )
    }

    #[test]
    fn missing_order_flagged_after_grace_period() {
        let clock = FakeClock::new(20_000);
        let mut expected = ExpectedStateStore::new(200, 86_400_000, clock.clone());
        expected.record_order(ExpectedOrder {
            client_order_id: "grinder_default_BTCUSDT_1_1_1".into(),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            price: dec!(100),
            quantity: dec!(1),
            status: OrderState::Open,
            created_ts: 0,
        });
        let observed = ObservedStateStore::new();
        let mismatches = engine(clock).run(&expected, &observed);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].mismatch_type, MismatchType::OrderMissingOnExchange);
    }

    #[test]
    fn unexpected_owned_order_is_flagged() {
        let clock = FakeClock::new(0);
        let expected = ExpectedStateStore::new(200, 86_400_000, clock.clone());
        let mut observed = ObservedStateStore::new();
        let snapshot = AccountSnapshot::build(
            vec![],
            vec![OpenOrderSnap {
                order_id: "grinder_default_BTCUSDT_1_1_1".into(),
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
        observed.update_from_snapshot(&snapshot);
        let mismatches = engine(clock).run(&expected, &observed);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].mismatch_type, MismatchType::OrderExistsUnexpected);
    }

    #[test]
    fn foreign_order_not_ours_is_ignored() {
        let clock = FakeClock::new(0);
        let expected = ExpectedStateStore::new(200, 86_400_000, clock.clone());
        let mut observed = ObservedStateStore::new();
        let snapshot = AccountSnapshot::build(
            vec![],
            vec![OpenOrderSnap {
                order_id: "manual_order_123".into(),
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
        observed.update_from_snapshot(&snapshot);
        let mismatches = engine(clock).run(&expected, &observed);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn nonzero_position_against_expected_flat_is_flagged() {
        let clock = FakeClock::new(0);
        let mut expected = ExpectedStateStore::new(200, 86_400_000, clock.clone());
        expected.set_position(ExpectedPosition {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(0),
        });
        let mut observed = ObservedStateStore::new();
        let snapshot = AccountSnapshot::build(
            vec![crate::data::PositionSnap {
                symbol: "BTCUSDT".into(),
                side: Side::Buy,
                qty: dec!(0.5),
                entry_price: dec!(100),
                mark_price: dec!(100),
                unrealized_pnl: dec!(0),
                leverage: dec!(1),
                ts: 1,
            }],
            vec![],
            "rest".into(),
        );
        observed.update_from_snapshot(&snapshot);
        let mismatches = engine(clock).run(&expected, &observed);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].mismatch_type, MismatchType::PositionNonzeroUnexpected);
    }

    #[test]
    fn disabled_engine_returns_no_mismatches() {
        let clock = FakeClock::new(0);
        let mut cfg_engine = engine(clock.clone());
        cfg_engine.config.enabled = false;
        let expected = ExpectedStateStore::new(200, 86_400_000, clock);
        let observed = ObservedStateStore::new();
        assert!(cfg_engine.run(&expected, &observed).is_empty());
    }
}
