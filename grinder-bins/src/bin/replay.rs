//! Fixture replay / paper engine (spec §8 scenarios 1-2): drives a
//! sequence of market snapshots read from a JSON fixture file through the
//! full decision pipeline — feature engine, grid policy, execution diff,
//! gating chain — against a `SimulatedExchangePort`, printing the
//! resulting actions and fills. No network, no HA, no real exchange.

use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use grinder_core::clock::FakeClock;
use grinder_core::data::{ExecutionState, OrderIntent, Snapshot, SymbolConstraints};
use grinder_core::execution::{diff, ExecutionEngineConfig};
use grinder_core::features::{FeatureEngine, FeatureEngineConfig, RegimeThresholds};
use grinder_core::gating::kill_switch_gate::KillSwitchGate;
use grinder_core::gating::prefilter::{PrefilterConfig, PrefilterGate};
use grinder_core::gating::rate_limiter::{RateLimiterConfig, RateLimiterGate};
use grinder_core::gating::risk::{RiskGate, RiskGateConfig};
use grinder_core::gating::toxicity::{ToxicityConfig, ToxicityGate};
use grinder_core::gating::GatingChain;
use grinder_core::port::simulated::SimulatedExchangePort;
use grinder_core::port::ExchangePort;
use grinder_core::safety::drawdown::DrawdownGuard;
use grinder_core::safety::kill_switch::KillSwitch;
use grinder_strategies::{GridPolicy, StaticGridPolicy, StaticGridPolicyConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

fn load_fixture(path: &str) -> Result<Vec<Snapshot>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading fixture {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing fixture {path} as Snapshot[]"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let path = env::args().nth(1).unwrap_or_else(|| "fixtures/replay.json".to_string());
    let snapshots = load_fixture(&path)?;
    info!(count = snapshots.len(), path = %path, "loaded replay fixture");

    let clock = FakeClock::new(0);
    let port = SimulatedExchangePort::new(clock.clone());
    let mut feature_engine = FeatureEngine::new(FeatureEngineConfig::default(), RegimeThresholds::default());
    let policy = StaticGridPolicy::new(StaticGridPolicyConfig {
        spacing_bps: 10,
        levels: 5,
        size_per_level: dec!(0.01),
    });
    let constraints = SymbolConstraints {
        step_size: dec!(0.001),
        min_qty: dec!(0.001),
        tick_size: dec!(0.01),
    };
    let exec_config = ExecutionEngineConfig {
        reprice_threshold: dec!(0.01),
    };
    let mut state = ExecutionState::default();

    let kill_switch = Arc::new(KillSwitch::new(clock.clone()));
    let drawdown_guard = Arc::new(DrawdownGuard::new(dec!(100_000), dec!(0.2)));
    // Gate order follows spec §4.3/§2's pipeline: Prefilter -> RateLimiter
    // -> Risk -> Toxicity -> KillSwitch.
    let gating = GatingChain::new(vec![
        Box::new(PrefilterGate::new(PrefilterConfig {
            blacklist: Default::default(),
            spread_max_bps: 100,
            vol_24h_min: Decimal::ZERO,
            vol_1h_min: Decimal::ZERO,
            trade_count_min: 0,
            oi_min: Decimal::ZERO,
        })),
        Box::new(RateLimiterGate::new(
            RateLimiterConfig {
                max_orders_per_minute: 120,
                cooldown_ms: 0,
            },
            clock.clone(),
        )),
        Box::new(RiskGate::new(RiskGateConfig {
            max_notional_per_symbol: dec!(50_000),
            max_notional_total: dec!(100_000),
            max_daily_loss: dec!(5_000),
        })),
        Box::new(ToxicityGate::new(ToxicityConfig::default())),
        Box::new(KillSwitchGate::new(kill_switch, drawdown_guard)),
    ]);

    for snapshot in &snapshots {
        clock.set(snapshot.ts);
        let features = feature_engine.process(snapshot);
        let plan = policy.plan(&features);
        plan.check_invariants().expect("policy must emit structurally valid plans");

        let result = diff(&plan, &state, &constraints, &exec_config);
        for action in &result.actions {
            match action.kind {
                grinder_core::execution::ActionKind::Cancel => {
                    if let Some(order_id) = &action.order_id {
                        port.cancel_order(order_id)?;
                        state.clear_order(action.side, &action.level_id);
                    }
                }
                grinder_core::execution::ActionKind::Place => {
                    let intent = OrderIntent {
                        symbol: snapshot.symbol.clone(),
                        side: action.side,
                        price: action.price,
                        quantity: action.quantity,
                        reason: "grid_place".to_string(),
                        level_id: action.level_id.clone(),
                    };
                    if let Err((gate, blocked)) = gating.evaluate(&intent) {
                        warn!(gate, reason = ?blocked.reason, level_id = %action.level_id, "place blocked by gating chain");
                        continue;
                    }
                    let order_id = port.place_order(
                        &snapshot.symbol,
                        action.side,
                        action.price,
                        action.quantity,
                        &action.level_id,
                        snapshot.ts,
                    )?;
                    state.set_order(action.side, &action.level_id, order_id, action.price, action.quantity);
                }
                grinder_core::execution::ActionKind::Replace => {
                    let intent = OrderIntent {
                        symbol: snapshot.symbol.clone(),
                        side: action.side,
                        price: action.price,
                        quantity: action.quantity,
                        reason: "grid_replace".to_string(),
                        level_id: action.level_id.clone(),
                    };
                    if let Err((gate, blocked)) = gating.evaluate(&intent) {
                        warn!(gate, reason = ?blocked.reason, level_id = %action.level_id, "replace blocked by gating chain");
                        continue;
                    }
                    if let Some(order_id) = &action.order_id {
                        let new_id = port.replace_order(order_id, action.price, action.quantity, snapshot.ts)?;
                        state.set_order(action.side, &action.level_id, new_id, action.price, action.quantity);
                    }
                }
            }
        }

        let fills = port.simulate_fills(&snapshot.symbol, features.mid_price);
        for fill in &fills {
            info!(order_id = %fill.order_id, price = %fill.price, qty = %fill.quantity, "fill");
            state
                .active_orders
                .retain(|_, resting| resting.order_id != fill.order_id);
        }
    }

    info!(open_orders = state.active_orders.len(), "replay complete");
    Ok(())
}
