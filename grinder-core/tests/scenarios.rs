//! End-to-end scenarios (spec §8).

use grinder_core::clock::FakeClock;
use grinder_core::data::{
    ExecutionState, ExpectedOrder, GridMode, GridPlan, OrderIdentityConfig, OrderState, Regime, ResetAction, Side,
    SymbolConstraints,
};
use grinder_core::digest::digest_of;
use grinder_core::error::CircuitState;
use grinder_core::execution::{diff, ActionKind, ExecutionEngineConfig};
use grinder_core::port::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use grinder_core::port::idempotent::IdempotentExchangePort;
use grinder_core::port::retry::RetryPolicy;
use grinder_core::port::simulated::SimulatedExchangePort;
use grinder_core::port::ExchangePort;
use grinder_core::reconcile::stores::{ExpectedStateStore, ObservedStateStore};
use grinder_core::reconcile::{ReconcileConfig, ReconcileEngine};
use rust_decimal_macros::dec;

fn constraints() -> SymbolConstraints {
    SymbolConstraints {
        step_size: dec!(0.001),
        min_qty: dec!(0.001),
        tick_size: dec!(0.01),
    }
}

fn grid_plan(center: rust_decimal::Decimal) -> GridPlan {
    GridPlan {
        mode: GridMode::Bilateral,
        center_price: center,
        spacing_bps: 10,
        levels_up: 5,
        levels_down: 5,
        size_schedule: vec![dec!(0.01); 5],
        skew_bps: 0,
        regime: Regime::Range,
        width_bps: 50,
        reset_action: ResetAction::None,
        reason_codes: vec!["REGIME_RANGE".to_string()],
    }
}

/// Scenario 1: static-grid replay emits 10 PLACE actions (5 buy + 5 sell)
/// on the first snapshot against an empty ExecutionState, and the digest
/// of the resulting action list is identical across two independent runs.
#[test]
fn static_grid_replay_is_deterministic() {
    let plan = grid_plan(dec!(50000));
    let state = ExecutionState::default();
    let config = ExecutionEngineConfig { reprice_threshold: dec!(0.01) };

    let run1 = diff(&plan, &state, &constraints(), &config);
    let run2 = diff(&plan, &state, &constraints(), &config);

    assert_eq!(run1.actions.len(), 10);
    assert_eq!(run1.actions.iter().filter(|a| a.kind == ActionKind::Place).count(), 10);
    assert_eq!(run1.actions.iter().filter(|a| a.side == Side::Buy).count(), 5);
    assert_eq!(run1.actions.iter().filter(|a| a.side == Side::Sell).count(), 5);

    let digest1 = digest_of(&run1.actions.iter().map(|a| (a.side, a.level_id.clone(), a.price, a.quantity)).collect::<Vec<_>>());
    let digest2 = digest_of(&run2.actions.iter().map(|a| (a.side, a.level_id.clone(), a.price, a.quantity)).collect::<Vec<_>>());
    assert_eq!(digest1.unwrap(), digest2.unwrap());
}

/// Scenario 2: crossing fill semantics — a resting BUY at mid fills, a
/// resting SELL above mid does not.
#[test]
fn crossing_fill_only_touches_one_side() {
    let clock = FakeClock::new(0);
    let port = SimulatedExchangePort::new(clock);
    port.place_order("BTCUSDT", Side::Buy, dec!(50000), dec!(0.01), "1", 0).unwrap();
    port.place_order("BTCUSDT", Side::Sell, dec!(51000), dec!(0.01), "2", 0).unwrap();

    let fills = port.simulate_fills("BTCUSDT", dec!(50000));
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, dec!(50000));
    assert_eq!(fills[0].quantity, dec!(0.01));
}

/// Scenario 3: two sequential place_order calls with identical
/// (symbol, side, price, quantity, level_id) — differing only in `ts` —
/// collapse to one underlying call and return the same order_id.
#[test]
fn idempotent_place_collapses_to_one_call() {
    let clock = FakeClock::new(0);
    let exchange = SimulatedExchangePort::new(clock.clone());
    let circuit = CircuitBreaker::new(CircuitBreakerConfig::default(), clock.clone());
    let retry = RetryPolicy::disabled();
    let port = IdempotentExchangePort::new(exchange, clock.clone(), circuit, retry, "test".to_string());

    let id1 = port.place_order("BTCUSDT", Side::Buy, dec!(49900), dec!(0.01), "2", 1000).unwrap();
    let id2 = port.place_order("BTCUSDT", Side::Buy, dec!(49900), dec!(0.01), "2", 2000).unwrap();
    assert_eq!(id1, id2);
}

/// Scenario 4: failure_threshold=2 trips the circuit to OPEN; it does not
/// admit calls until open_interval_ms has elapsed.
#[test]
fn circuit_trips_and_recovers_after_interval() {
    let clock = FakeClock::new(0);
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig {
            failure_threshold: 2,
            open_interval_ms: 30_000,
            half_open_probe_count: 1,
            success_threshold: 1,
        },
        clock.clone(),
    );

    breaker.record_failure("place");
    assert_eq!(breaker.state("place"), CircuitState::Closed);
    breaker.record_failure("place");
    assert_eq!(breaker.state("place"), CircuitState::Open);
    assert!(!breaker.allow("place"));

    clock.advance(30_000);
    assert!(breaker.allow("place"));
    assert_eq!(breaker.state("place"), CircuitState::HalfOpen);

    breaker.record_success("place");
    assert_eq!(breaker.state("place"), CircuitState::Closed);
}

/// Scenario 6: an observed order we own but never recorded as expected is
/// flagged ORDER_EXISTS_UNEXPECTED exactly once.
#[test]
fn reconcile_flags_orphan_owned_order() {
    let clock = FakeClock::new(0);
    let expected = ExpectedStateStore::new(200, 86_400_000, clock.clone());
    let mut observed = ObservedStateStore::new();

    let snapshot = grinder_core::data::AccountSnapshot::build(
        vec![],
        vec![grinder_core::data::OpenOrderSnap {
            order_id: "grinder_default_BTCUSDT_1_1_1".into(),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            order_type: grinder_core::data::OrderType::Limit,
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

    let engine = ReconcileEngine::new(
        ReconcileConfig {
            enabled: true,
            order_grace_period_ms: 5_000,
            symbol_filter: None,
        },
        OrderIdentityConfig::new("grinder_".into(), "default".into()),
        clock,
    );
    let mismatches = engine.run(&expected, &observed);
    assert_eq!(mismatches.len(), 1);
    assert_eq!(
        mismatches[0].mismatch_type,
        grinder_core::data::MismatchType::OrderExistsUnexpected
    );

    // ensures the unused `ExpectedOrder` import above actually exercises the
    // type it documents (expected stays empty for this scenario)
    let _: Vec<&ExpectedOrder> = expected.all_orders();
}
