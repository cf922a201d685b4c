//! RemediationBudget (spec §4.13), ported from `reconcile/budget.py`: two
//! axes (call count, notional USDT), each checked per-run and per-day, with
//! a persisted (date, calls_today, notional_today) JSON state that resets
//! at UTC midnight.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetState {
    pub date: String,
    pub calls_today: u32,
    pub notional_today: Decimal,
    pub last_updated_ts_ms: i64,
    #[serde(skip)]
    pub calls_this_run: u32,
    #[serde(skip)]
    pub notional_this_run: Decimal,
}

impl Default for BudgetState {
    fn default() -> Self {
        Self {
            date: String::new(),
            calls_today: 0,
            notional_today: Decimal::ZERO,
            last_updated_ts_ms: 0,
            calls_this_run: 0,
            notional_this_run: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemediationBudgetConfig {
    pub max_calls_per_day: u32,
    pub max_notional_per_day: Decimal,
    pub max_calls_per_run: u32,
    pub max_notional_per_run: Decimal,
}

pub struct RemediationBudget {
    config: RemediationBudgetConfig,
    state: BudgetState,
}

fn today_utc_str() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

impl RemediationBudget {
    pub fn new(config: RemediationBudgetConfig) -> Self {
        let mut budget = Self {
            config,
            state: BudgetState::default(),
        };
        budget.check_date_reset();
        budget
    }

    pub fn from_persisted(config: RemediationBudgetConfig, persisted: &str) -> Self {
        let state = serde_json::from_str(persisted).unwrap_or_default();
        let mut budget = Self { config, state };
        budget.check_date_reset();
        budget
    }

    pub fn to_persisted(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.state)
    }

    fn check_date_reset(&mut self) {
        let today = today_utc_str();
        if self.state.date != today {
            self.state.date = today;
            self.state.calls_today = 0;
            self.state.notional_today = Decimal::ZERO;
        }
    }

    pub fn reset_run_counters(&mut self) {
        self.check_date_reset();
        self.state.calls_this_run = 0;
        self.state.notional_this_run = Decimal::ZERO;
    }

    /// `(can_execute, block_reason)` per spec §4.13's four block reasons,
    /// checked in per-run-then-per-day order.
    pub fn can_execute(&mut self, notional_usdt: Decimal) -> (bool, Option<&'static str>) {
        self.check_date_reset();

        if self.state.calls_this_run >= self.config.max_calls_per_run {
            return (false, Some("max_calls_per_run"));
        }
        if self.state.notional_this_run + notional_usdt > self.config.max_notional_per_run {
            return (false, Some("max_notional_per_run"));
        }
        if self.state.calls_today >= self.config.max_calls_per_day {
            return (false, Some("max_calls_per_day"));
        }
        if self.state.notional_today + notional_usdt > self.config.max_notional_per_day {
            return (false, Some("max_notional_per_day"));
        }
        (true, None)
    }

    pub fn record_execution(&mut self, notional_usdt: Decimal, now_ms: i64) {
        self.state.calls_this_run += 1;
        self.state.notional_this_run += notional_usdt;
        self.state.calls_today += 1;
        self.state.notional_today += notional_usdt;
        self.state.last_updated_ts_ms = now_ms;
    }

    pub fn state(&self) -> &BudgetState {
        &self.state
    }
}
