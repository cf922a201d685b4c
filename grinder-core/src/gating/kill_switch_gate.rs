//! KillSwitch gate (spec §4.3): the last gate in the chain, short-circuiting
//! all trading once the latched kill switch or drawdown guard has tripped.

use std::sync::Arc;

use crate::data::OrderIntent;
use crate::safety::drawdown::DrawdownGuard;
use crate::safety::kill_switch::KillSwitch;

use super::{Gate, GatingResult};

pub struct KillSwitchGate {
    kill_switch: Arc<KillSwitch>,
    drawdown_guard: Arc<DrawdownGuard>,
}

impl KillSwitchGate {
    pub fn new(kill_switch: Arc<KillSwitch>, drawdown_guard: Arc<DrawdownGuard>) -> Self {
        Self {
            kill_switch,
            drawdown_guard,
        }
    }
}

impl Gate for KillSwitchGate {
    fn name(&self) -> &'static str {
        "kill_switch"
    }

    fn evaluate(&self, _intent: &OrderIntent) -> GatingResult {
        if self.kill_switch.is_triggered() {
            return GatingResult::block(
                "KILL_SWITCH_ACTIVE",
                self.kill_switch.reason_string().unwrap_or_default(),
            );
        }
        if self.drawdown_guard.is_triggered() {
            return GatingResult::block("DRAWDOWN_LIMIT_EXCEEDED", "drawdown guard latched");
        }
        GatingResult::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::data::{KillSwitchReason, Side};
    use rust_decimal_macros::dec;

    fn intent() -> OrderIntent {
        OrderIntent {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            price: dec!(100),
            quantity: dec!(1),
            reason: "grid".into(),
            level_id: "1".into(),
        }
    }

    #[test]
    fn blocks_once_kill_switch_tripped() {
        let clock = FakeClock::new(0);
        let ks = Arc::new(KillSwitch::new(clock.clone()));
        let dg = Arc::new(DrawdownGuard::new(dec!(10000), dec!(5)));
        let gate = KillSwitchGate::new(ks.clone(), dg);
        assert!(gate.evaluate(&intent()).allowed);
        ks.trip(KillSwitchReason::Manual, "operator".into());
        let r = gate.evaluate(&intent());
        assert_eq!(r.reason, Some("KILL_SWITCH_ACTIVE"));
    }

    #[test]
    fn blocks_once_drawdown_triggered() {
        let clock = FakeClock::new(0);
        let ks = Arc::new(KillSwitch::new(clock));
        let dg = Arc::new(DrawdownGuard::new(dec!(10000), dec!(5)));
        dg.update(dec!(9000));
        let gate = KillSwitchGate::new(ks, dg);
        let r = gate.evaluate(&intent());
        assert_eq!(r.reason, Some("DRAWDOWN_LIMIT_EXCEEDED"));
    }
}
