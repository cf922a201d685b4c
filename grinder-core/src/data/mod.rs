//! The data model (spec §3): plain records for every entity the pipeline
//! passes between components. No behavior lives here beyond small,
//! obviously-pure helpers (invariant checks, sort-key derivation).

pub mod account;
pub mod decision;
pub mod execution;
pub mod idempotency;
pub mod market;
pub mod reconcile;
pub mod safety;

pub use account::{AccountSnapshot, OpenOrderSnap, OrderType, PositionSnap};
pub use decision::{Decision, GridMode, GridPlan, OrderIntent, Regime, ResetAction, Side};
pub use execution::{
    generate_client_order_id, parse_client_order_id, ExecutionState, OrderIdentity,
    OrderIdentityConfig, OrderRecord, OrderState, RestingOrder, SymbolConstraints,
    LEGACY_STRATEGY_MARKER,
};
pub use idempotency::{IdempotencyEntry, IdempotencyStatus, DONE_TTL_S, INFLIGHT_TTL_S};
pub use market::{FeatureSnapshot, MidBar, Snapshot};
pub use reconcile::{
    ExpectedOrder, ExpectedPosition, Mismatch, MismatchType, ObservedOrder, ObservedPosition,
};
pub use safety::{
    ConsecutiveLossAction, ConsecutiveLossState, DrawdownGuardState, KillSwitchReason,
    KillSwitchState, SystemState,
};
