//! EmergencyExitExecutor (spec §4.11): cancel-all, then market-flatten every
//! non-zero position, then a bounded verify loop. Latched to run at most
//! once per process lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::port::ExchangePort;

#[derive(Debug, Clone)]
pub struct EmergencyExitConfig {
    pub symbols: Vec<String>,
    pub verify_attempts: u32,
    pub verify_interval_ms: u64,
}

impl Default for EmergencyExitConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            verify_attempts: 10,
            verify_interval_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyExitResult {
    pub triggered_at_ms: i64,
    pub reason: String,
    pub orders_cancelled: u64,
    pub market_orders_placed: u64,
    pub positions_remaining: u64,
    pub success: bool,
}

pub struct EmergencyExitExecutor<P: ExchangePort> {
    port: Arc<P>,
    clock: Arc<dyn Clock>,
    config: EmergencyExitConfig,
    fired: AtomicBool,
}

impl<P: ExchangePort> EmergencyExitExecutor<P> {
    pub fn new(port: Arc<P>, clock: Arc<dyn Clock>, config: EmergencyExitConfig) -> Self {
        Self {
            port,
            clock,
            config,
            fired: AtomicBool::new(false),
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Runs the sequence once. Returns `None` on every call after the
    /// first, per the spec's "at most once per process lifetime" latch.
    pub fn run(&self, reason: &str) -> Option<EmergencyExitResult> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return None;
        }

        let triggered_at_ms = self.clock.now_ms();
        let mut orders_cancelled = 0u64;
        let mut market_orders_placed = 0u64;

        for symbol in &self.config.symbols {
            match self.port.cancel_all_orders(symbol) {
                Ok(n) => orders_cancelled += n,
                Err(e) => error!(symbol = %symbol, error = %e, "emergency cancel_all failed"),
            }
        }

        for symbol in &self.config.symbols {
            let positions = match self.port.fetch_positions(Some(symbol)) {
                Ok(p) => p,
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "emergency fetch_positions failed");
                    continue;
                }
            };
            for position in positions.into_iter().filter(|p| !p.qty.is_zero()) {
                let close_side = position.side.opposite();
                match self.port.place_market_order(symbol, close_side, position.qty.abs(), true) {
                    Ok(_) => market_orders_placed += 1,
                    Err(e) => error!(symbol = %symbol, error = %e, "emergency market close failed"),
                }
            }
        }

        let mut positions_remaining = self.count_remaining();
        let mut attempts = 0;
        while positions_remaining > 0 && attempts < self.config.verify_attempts {
            self.clock.sleep_ms(self.config.verify_interval_ms);
            positions_remaining = self.count_remaining();
            attempts += 1;
        }

        let success = positions_remaining == 0;
        if success {
            info!(reason, orders_cancelled, market_orders_placed, "emergency exit completed");
        } else {
            warn!(reason, positions_remaining, "emergency exit verify loop exhausted");
        }

        Some(EmergencyExitResult {
            triggered_at_ms,
            reason: reason.to_string(),
            orders_cancelled,
            market_orders_placed,
            positions_remaining,
            success,
        })
    }

    fn count_remaining(&self) -> u64 {
        let mut total: u64 = 0;
        for symbol in &self.config.symbols {
            if let Ok(positions) = self.port.fetch_positions(Some(symbol)) {
                total += positions.iter().filter(|p| !p.qty.is_zero()).count() as u64;
            }
        }
        total
    }
}
