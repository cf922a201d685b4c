//! RateLimiter gate (spec §4.3): sliding-60s window count plus a per-order
//! cooldown. Thread safety follows the teacher's token-bucket rate limiter
//! (`parking_lot::Mutex` guarding the window state), generalized here to a
//! sliding window rather than a token bucket since the spec's boundary
//! behavior ("exactly max_orders_per_minute allowed, next blocked until
//! oldest expires") is a sliding-window contract.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::data::OrderIntent;

use super::{Gate, GatingResult};

pub struct RateLimiterConfig {
    pub max_orders_per_minute: usize,
    pub cooldown_ms: i64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_orders_per_minute: 60,
            cooldown_ms: 0,
        }
    }
}

struct State {
    window: VecDeque<i64>,
    last_order_ms: Option<i64>,
}

pub struct RateLimiterGate {
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl RateLimiterGate {
    pub fn new(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(State {
                window: VecDeque::new(),
                last_order_ms: None,
            }),
        }
    }

    fn evict_expired(window: &mut VecDeque<i64>, now_ms: i64) {
        while let Some(&front) = window.front() {
            if now_ms - front >= 60_000 {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Gate for RateLimiterGate {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    fn evaluate(&self, _intent: &OrderIntent) -> GatingResult {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();

        if let Some(last) = state.last_order_ms {
            if now_ms - last < self.config.cooldown_ms {
                return GatingResult::block("COOLDOWN_ACTIVE", format!("last_order_ms={last}"));
            }
        }

        Self::evict_expired(&mut state.window, now_ms);
        if state.window.len() >= self.config.max_orders_per_minute {
            return GatingResult::block(
                "RATE_LIMIT_EXCEEDED",
                format!("{} orders in trailing 60s", state.window.len()),
            );
        }

        state.window.push_back(now_ms);
        state.last_order_ms = Some(now_ms);
        GatingResult::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::data::Side;
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
    fn exactly_max_per_minute_allowed_next_blocked() {
        let clock = FakeClock::new(0);
        let gate = RateLimiterGate::new(
            RateLimiterConfig {
                max_orders_per_minute: 3,
                cooldown_ms: 0,
            },
            clock.clone(),
        );
        assert!(gate.evaluate(&intent()).allowed);
        assert!(gate.evaluate(&intent()).allowed);
        assert!(gate.evaluate(&intent()).allowed);
        let blocked = gate.evaluate(&intent());
        assert!(!blocked.allowed);
        assert_eq!(blocked.reason, Some("RATE_LIMIT_EXCEEDED"));
    }

    #[test]
    fn oldest_expiring_unblocks_window() {
        let clock = FakeClock::new(0);
        let gate = RateLimiterGate::new(
            RateLimiterConfig {
                max_orders_per_minute: 1,
                cooldown_ms: 0,
            },
            clock.clone(),
        );
        assert!(gate.evaluate(&intent()).allowed);
        assert!(!gate.evaluate(&intent()).allowed);
        clock.advance(60_000);
        assert!(gate.evaluate(&intent()).allowed);
    }

    #[test]
    fn cooldown_blocks_rapid_fire() {
        let clock = FakeClock::new(0);
        let gate = RateLimiterGate::new(
            RateLimiterConfig {
                max_orders_per_minute: 100,
                cooldown_ms: 500,
            },
            clock.clone(),
        );
        assert!(gate.evaluate(&intent()).allowed);
        let blocked = gate.evaluate(&intent());
        assert_eq!(blocked.reason, Some("COOLDOWN_ACTIVE"));
        clock.advance(500);
        assert!(gate.evaluate(&intent()).allowed);
    }
}
