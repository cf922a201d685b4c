//! Safety entities (spec §3): DrawdownGuard state, KillSwitch state,
//! SystemState. Behavior lives in `crate::safety`; these are the plain
//! data records it operates on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownGuardState {
    pub initial_capital: Decimal,
    pub high_water_mark: Decimal,
    pub max_drawdown_pct: Decimal,
    pub triggered: bool,
    pub trigger_equity: Option<Decimal>,
    pub trigger_drawdown_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KillSwitchReason {
    DrawdownLimit,
    Manual,
    Error,
}

impl KillSwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            KillSwitchReason::DrawdownLimit => "DRAWDOWN_LIMIT",
            KillSwitchReason::Manual => "MANUAL",
            KillSwitchReason::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillSwitchState {
    pub triggered: bool,
    pub reason: Option<KillSwitchReason>,
    pub triggered_at_ts: Option<i64>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsecutiveLossAction {
    Pause,
    Degraded,
}

impl ConsecutiveLossAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsecutiveLossAction::Pause => "PAUSE",
            ConsecutiveLossAction::Degraded => "DEGRADED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsecutiveLossState {
    pub count: u32,
    pub tripped: bool,
    pub last_row_id: Option<String>,
    pub last_ts_ms: Option<i64>,
}

/// Process-wide operating state (spec §4.10). Only one is current at a
/// time; the FSM derives it from guard and flag inputs rather than letting
/// callers set it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Init,
    Ready,
    Active,
    Throttled,
    Paused,
    Emergency,
    Shutdown,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::Init => "INIT",
            SystemState::Ready => "READY",
            SystemState::Active => "ACTIVE",
            SystemState::Throttled => "THROTTLED",
            SystemState::Paused => "PAUSED",
            SystemState::Emergency => "EMERGENCY",
            SystemState::Shutdown => "SHUTDOWN",
        }
    }
}
