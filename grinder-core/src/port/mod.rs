//! Exchange port (spec §6): the abstract boundary between the decision
//! pipeline and a real or simulated exchange. Concrete adapters (live REST
//! client, simulated fill engine) implement `ExchangePort` directly;
//! `IdempotentExchangePort` wraps any of them with the idempotency/retry/
//! circuit-breaker protocol from §4.6/§4.7.

pub mod circuit_breaker;
pub mod idempotent;
pub mod retry;
pub mod simulated;

use rust_decimal::Decimal;

use crate::data::{AccountSnapshot, OrderRecord, PositionSnap, Side};
use crate::error::PortError;

/// Names of the operations this port exposes, used as the `op` metric
/// label and as the key into `DeadlinePolicy`/`CircuitBreaker` per-op state.
pub const OP_PLACE_ORDER: &str = "place_order";
pub const OP_CANCEL_ORDER: &str = "cancel_order";
pub const OP_CANCEL_ALL: &str = "cancel_all";
pub const OP_REPLACE_ORDER: &str = "replace_order";
pub const OP_PLACE_MARKET_ORDER: &str = "place_market_order";
pub const OP_GET_OPEN_ORDERS: &str = "get_open_orders";
pub const OP_GET_POSITIONS: &str = "get_positions";
pub const OP_GET_ACCOUNT: &str = "get_account";
pub const OP_EXCHANGE_INFO: &str = "exchange_info";
pub const OP_PING_TIME: &str = "ping_time";
pub const OP_GET_USER_TRADES: &str = "get_user_trades";

pub const WRITE_OPS: &[&str] = &[
    OP_PLACE_ORDER,
    OP_CANCEL_ORDER,
    OP_CANCEL_ALL,
    OP_REPLACE_ORDER,
    OP_PLACE_MARKET_ORDER,
];

/// Abstract exchange boundary (spec §6). Implementations may be a live REST
/// client or a deterministic simulator driving fixture replay.
pub trait ExchangePort: Send + Sync {
    fn place_order(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        level_id: &str,
        ts: i64,
    ) -> Result<String, PortError>;

    fn cancel_order(&self, order_id: &str) -> Result<bool, PortError>;

    fn replace_order(
        &self,
        order_id: &str,
        new_price: Decimal,
        new_quantity: Decimal,
        ts: i64,
    ) -> Result<String, PortError>;

    fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<String, PortError>;

    fn cancel_all_orders(&self, symbol: &str) -> Result<u64, PortError>;

    fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<OrderRecord>, PortError>;

    fn fetch_positions(&self, symbol: Option<&str>) -> Result<Vec<PositionSnap>, PortError>;

    fn fetch_account_snapshot(&self) -> Result<AccountSnapshot, PortError>;
}
