//! Error sum types (spec §7, §9).
//!
//! `PortError` replaces the original transient/non-retryable/conflict/
//! circuit-open exception hierarchy with a single enum that retries, the
//! circuit breaker, and the idempotent port all dispatch on.

use std::fmt;

/// Stable reason strings, also used as metric label values (spec §4.7).
/// Never rename these — they are part of the metrics contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Timeout,
    Connect,
    Dns,
    Tls,
    Http429,
    Http5xx,
    Http4xx,
    Decode,
    Unknown,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Timeout => "timeout",
            Reason::Connect => "connect",
            Reason::Dns => "dns",
            Reason::Tls => "tls",
            Reason::Http429 => "429",
            Reason::Http5xx => "5xx",
            Reason::Http4xx => "4xx",
            Reason::Decode => "decode",
            Reason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker state, surfaced in `PortError::CircuitOpen` and in the
/// `grinder_circuit_state` gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every exchange-port failure mode, replacing the original exception
/// hierarchy (spec §9). Retry/circuit-breaker/idempotency logic all
/// dispatch on the variant rather than catching distinct exception types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Network/5xx/429 — retried per RetryPolicy, trips the circuit on
    /// exhaustion.
    Transient(Reason),
    /// 4xx, validation, unsupported method, ownership rejection — surfaced
    /// without retry; does not trip the circuit.
    NonRetryable(Reason),
    /// An equal-parameter request is already in flight.
    Conflict,
    /// The per-operation circuit is open or half-open and out of probes.
    CircuitOpen(String, CircuitState),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::Transient(r) => write!(f, "transient error: {r}"),
            PortError::NonRetryable(r) => write!(f, "non-retryable error: {r}"),
            PortError::Conflict => write!(f, "idempotency conflict: request already in flight"),
            PortError::CircuitOpen(op, state) => {
                write!(f, "circuit open for op {op} (state={state})")
            }
        }
    }
}

impl std::error::Error for PortError {}

impl PortError {
    /// Whether this error should count against the circuit breaker's
    /// consecutive-failure counter. Conflicts and circuit-open rejections
    /// are not upstream failures; 4xx is a caller mistake, not degradation.
    pub fn trips_circuit(&self) -> bool {
        matches!(self, PortError::Transient(_))
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            PortError::Transient(r) | PortError::NonRetryable(r) => Some(*r),
            _ => None,
        }
    }
}

/// Fatal, non-recoverable conditions (spec §7): duplicate key in a supposedly
/// sorted snapshot, timestamp regression, negative quantity, checksum
/// mismatch on a signed evidence bundle, invalid leader-election interval
/// configuration. These abort the current snapshot cycle in the decision
/// path, or refuse startup in bootstrap.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("duplicate key in snapshot: {0}")]
    DuplicateKey(String),
    #[error("timestamp regression: observed {observed} < last accepted {last_accepted}")]
    TsRegression { observed: i64, last_accepted: i64 },
    #[error("negative quantity observed: {0}")]
    NegativeQty(String),
    #[error("checksum mismatch on {0}")]
    ChecksumMismatch(String),
    #[error("invalid leader election interval: renew_interval_ms ({renew}) >= lock_ttl_ms ({ttl})")]
    InvalidLeaseInterval { renew: u64, ttl: u64 },
    #[error("configuration invalid: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_trips_circuit_others_do_not() {
        assert!(PortError::Transient(Reason::Timeout).trips_circuit());
        assert!(!PortError::NonRetryable(Reason::Http4xx).trips_circuit());
        assert!(!PortError::Conflict.trips_circuit());
        assert!(!PortError::CircuitOpen("place".into(), CircuitState::Open).trips_circuit());
    }

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(Reason::Http429.as_str(), "429");
        assert_eq!(Reason::Http5xx.as_str(), "5xx");
        assert_eq!(Reason::Http4xx.as_str(), "4xx");
    }
}
