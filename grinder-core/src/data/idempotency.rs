//! Idempotency entities (spec §3, §4.6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    Inflight,
    Done,
    Failed,
}

pub const INFLIGHT_TTL_S: i64 = 300;
pub const DONE_TTL_S: i64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    pub key: String,
    pub status: IdempotencyStatus,
    pub op_name: String,
    pub request_fingerprint: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub result: Option<String>,
}

impl IdempotencyEntry {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}
