//! Safety interlocks (spec §4.8-§4.11): drawdown guard, kill switch, system
//! FSM, emergency exit executor.

pub mod consecutive_loss_guard;
pub mod drawdown;
pub mod emergency_exit;
pub mod fsm;
pub mod kill_switch;

pub use consecutive_loss_guard::{ConsecutiveLossConfig, ConsecutiveLossGuard};
pub use drawdown::{DrawdownGuard, DrawdownUpdateResult};
pub use emergency_exit::{EmergencyExitConfig, EmergencyExitExecutor, EmergencyExitResult};
pub use fsm::{FsmInputs, IntentKind, SystemFsm};
pub use kill_switch::KillSwitch;
