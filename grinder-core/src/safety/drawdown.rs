//! DrawdownGuard (spec §4.8), grounded in the teacher's `CircuitBreaker`
//! pattern of atomics + a mutex for the rarely-mutated latch state, adapted
//! to the guard's own trigger/reset semantics from the original
//! `risk/drawdown.py`.

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::data::DrawdownGuardState;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownUpdateResult {
    pub triggered: bool,
    pub drawdown_pct: Decimal,
    pub high_water_mark: Decimal,
    pub previously_triggered: bool,
}

pub struct DrawdownGuard {
    state: Mutex<DrawdownGuardState>,
}

impl DrawdownGuard {
    pub fn new(initial_capital: Decimal, max_drawdown_pct: Decimal) -> Self {
        Self {
            state: Mutex::new(DrawdownGuardState {
                initial_capital,
                high_water_mark: initial_capital,
                max_drawdown_pct,
                triggered: false,
                trigger_equity: None,
                trigger_drawdown_pct: None,
            }),
        }
    }

    /// Observes one equity snapshot. Latched: once triggered, every later
    /// update returns `triggered=true` with `previously_triggered=true`,
    /// regardless of whether equity has since recovered.
    pub fn update(&self, equity: Decimal) -> DrawdownUpdateResult {
        let mut state = self.state.lock();
        let was_triggered = state.triggered;

        if equity > state.high_water_mark {
            state.high_water_mark = equity;
        }

        let drawdown_pct = if state.high_water_mark.is_zero() {
            Decimal::ZERO
        } else {
            ((state.high_water_mark - equity) / state.high_water_mark * Decimal::from(100))
                .max(Decimal::ZERO)
        };

        if was_triggered {
            return DrawdownUpdateResult {
                triggered: true,
                drawdown_pct,
                high_water_mark: state.high_water_mark,
                previously_triggered: true,
            };
        }

        if drawdown_pct >= state.max_drawdown_pct {
            state.triggered = true;
            state.trigger_equity = Some(equity);
            state.trigger_drawdown_pct = Some(drawdown_pct);
        }

        DrawdownUpdateResult {
            triggered: state.triggered,
            drawdown_pct,
            high_water_mark: state.high_water_mark,
            previously_triggered: false,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.state.lock().triggered
    }

    /// Explicit reset (spec §4.8): clears the latch and, if a new capital
    /// figure is given, rebases the high-water-mark to it.
    pub fn reset(&self, initial_capital: Option<Decimal>) {
        let mut state = self.state.lock();
        state.triggered = false;
        state.trigger_equity = None;
        state.trigger_drawdown_pct = None;
        if let Some(capital) = initial_capital {
            state.initial_capital = capital;
            state.high_water_mark = capital;
        }
    }

    pub fn snapshot(&self) -> DrawdownGuardState {
        self.state.lock().clone()
    }
}
