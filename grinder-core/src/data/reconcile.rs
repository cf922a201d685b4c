//! Reconciliation entities (spec §3, §4.12): ExpectedOrder/ExpectedPosition,
//! ObservedOrder/ObservedPosition, Mismatch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::decision::Side;
use super::execution::OrderState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub status: OrderState,
    pub created_ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedPosition {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub status: OrderState,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedPosition {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchType {
    OrderMissingOnExchange,
    OrderExistsUnexpected,
    OrderStatusDivergence,
    PositionNonzeroUnexpected,
    DuplicateKey,
    TsRegression,
    NegativeQty,
    OrphanOrder,
}

impl MismatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchType::OrderMissingOnExchange => "ORDER_MISSING_ON_EXCHANGE",
            MismatchType::OrderExistsUnexpected => "ORDER_EXISTS_UNEXPECTED",
            MismatchType::OrderStatusDivergence => "ORDER_STATUS_DIVERGENCE",
            MismatchType::PositionNonzeroUnexpected => "POSITION_NONZERO_UNEXPECTED",
            MismatchType::DuplicateKey => "duplicate_key",
            MismatchType::TsRegression => "ts_regression",
            MismatchType::NegativeQty => "negative_qty",
            MismatchType::OrphanOrder => "orphan_order",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mismatch {
    #[serde(rename = "type")]
    pub mismatch_type: MismatchType,
    pub symbol: String,
    pub client_order_id: Option<String>,
    pub expected: Option<serde_json::Value>,
    pub observed: Option<serde_json::Value>,
    pub ts_detected: i64,
    pub action_plan: String,
}
