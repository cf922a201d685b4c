//! RiskGate (spec §4.3): per-symbol notional cap, total notional cap,
//! realized+unrealized daily loss cap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::data::OrderIntent;

use super::{Gate, GatingResult};

pub struct RiskGateConfig {
    pub max_notional_per_symbol: Decimal,
    pub max_notional_total: Decimal,
    pub max_daily_loss: Decimal,
}

#[derive(Default)]
struct State {
    notional_by_symbol: HashMap<String, Decimal>,
    total_notional: Decimal,
    realized_pnl_today: Decimal,
    unrealized_pnl: Decimal,
}

pub struct RiskGate {
    config: RiskGateConfig,
    state: Arc<Mutex<State>>,
}

impl RiskGate {
    pub fn new(config: RiskGateConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn set_notional(&self, symbol: &str, notional: Decimal, total: Decimal) {
        let mut state = self.state.lock();
        state.notional_by_symbol.insert(symbol.to_string(), notional);
        state.total_notional = total;
    }

    pub fn set_pnl(&self, realized_today: Decimal, unrealized: Decimal) {
        let mut state = self.state.lock();
        state.realized_pnl_today = realized_today;
        state.unrealized_pnl = unrealized;
    }
}

impl Gate for RiskGate {
    fn name(&self) -> &'static str {
        "risk"
    }

    fn evaluate(&self, intent: &OrderIntent) -> GatingResult {
        let notional = intent.price * intent.quantity;
        let state = self.state.lock();

        let daily_loss = -(state.realized_pnl_today + state.unrealized_pnl);
        if daily_loss > self.config.max_daily_loss {
            return GatingResult::block(
                "DAILY_LOSS_LIMIT_EXCEEDED",
                format!("daily_loss={daily_loss}"),
            );
        }

        let symbol_notional = state
            .notional_by_symbol
            .get(&intent.symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
            + notional;
        if symbol_notional > self.config.max_notional_per_symbol {
            return GatingResult::block(
                "MAX_NOTIONAL_EXCEEDED",
                format!("scope=symbol {symbol_notional} > {}", self.config.max_notional_per_symbol),
            );
        }

        let total_notional = state.total_notional + notional;
        if total_notional > self.config.max_notional_total {
            return GatingResult::block(
                "MAX_NOTIONAL_EXCEEDED",
                format!("scope=total {total_notional} > {}", self.config.max_notional_total),
            );
        }

        GatingResult::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Side;
    use rust_decimal_macros::dec;

    fn intent(price: Decimal, qty: Decimal) -> OrderIntent {
        OrderIntent {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            price,
            quantity: qty,
            reason: "grid".into(),
            level_id: "1".into(),
        }
    }

    #[test]
    fn blocks_on_symbol_notional_cap() {
        let gate = RiskGate::new(RiskGateConfig {
            max_notional_per_symbol: dec!(1000),
            max_notional_total: dec!(100000),
            max_daily_loss: dec!(100000),
        });
        let r = gate.evaluate(&intent(dec!(100000), dec!(1)));
        assert_eq!(r.reason, Some("MAX_NOTIONAL_EXCEEDED"));
    }

    #[test]
    fn blocks_on_daily_loss() {
        let gate = RiskGate::new(RiskGateConfig {
            max_notional_per_symbol: dec!(100000),
            max_notional_total: dec!(100000),
            max_daily_loss: dec!(500),
        });
        gate.set_pnl(dec!(-1000), dec!(0));
        let r = gate.evaluate(&intent(dec!(10), dec!(1)));
        assert_eq!(r.reason, Some("DAILY_LOSS_LIMIT_EXCEEDED"));
    }

    #[test]
    fn allows_within_limits() {
        let gate = RiskGate::new(RiskGateConfig {
            max_notional_per_symbol: dec!(1000),
            max_notional_total: dec!(1000),
            max_daily_loss: dec!(1000),
        });
        assert!(gate.evaluate(&intent(dec!(10), dec!(1))).allowed);
    }
}
