//! RetryPolicy and DeadlinePolicy (spec §4.7), ported from the original
//! `net/retry_policy.py`. No side effects: pure configuration plus pure
//! delay/classification functions.

use std::collections::HashMap;

use crate::error::Reason;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub retryable: &'static [Reason],
}

const RETRYABLE_READ: &[Reason] = &[
    Reason::Timeout,
    Reason::Connect,
    Reason::Dns,
    Reason::Http5xx,
    Reason::Http429,
];

const RETRYABLE_WRITE: &[Reason] = &[Reason::Timeout, Reason::Connect, Reason::Dns, Reason::Http5xx];

impl RetryPolicy {
    /// Safe-by-default: retries are disabled (`max_attempts=1`) until the
    /// caller explicitly enables `LATENCY_RETRY_ENABLED=1`.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 100,
            max_delay_ms: 500,
            backoff_multiplier: 2.0,
            jitter: false,
            retryable: RETRYABLE_READ,
        }
    }

    pub fn for_read(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            retryable: RETRYABLE_READ,
            ..Self::disabled()
        }
    }

    pub fn for_write(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            retryable: RETRYABLE_WRITE,
            ..Self::disabled()
        }
    }

    /// `min(base * multiplier^attempt, max)`, truncated to an integer.
    /// Deterministic when `jitter` is false (always false in this
    /// implementation's production config, per spec §5).
    pub fn compute_delay_ms(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_delay_ms as f64);
        capped as u64
    }

    pub fn is_retryable(&self, reason: Reason) -> bool {
        self.retryable.contains(&reason)
    }
}

#[derive(Debug, Clone)]
pub struct DeadlinePolicy {
    deadlines: HashMap<&'static str, u64>,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        use super::*;
        let mut deadlines = HashMap::new();
        deadlines.insert(OP_PLACE_ORDER, 1500);
        deadlines.insert(OP_CANCEL_ORDER, 600);
        deadlines.insert(OP_CANCEL_ALL, 1200);
        deadlines.insert(OP_GET_OPEN_ORDERS, 2000);
        deadlines.insert(OP_GET_POSITIONS, 2500);
        deadlines.insert(OP_GET_ACCOUNT, 2500);
        deadlines.insert(OP_EXCHANGE_INFO, 5000);
        deadlines.insert(OP_PING_TIME, 800);
        deadlines.insert(OP_GET_USER_TRADES, 2500);
        Self { deadlines }
    }
}

impl DeadlinePolicy {
    pub fn deadline_ms(&self, op: &str) -> u64 {
        self.deadlines.get(op).copied().unwrap_or(5000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_pure_function_of_attempt_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 500,
            backoff_multiplier: 2.0,
            jitter: false,
            retryable: RETRYABLE_READ,
        };
        assert_eq!(policy.compute_delay_ms(0), 100);
        assert_eq!(policy.compute_delay_ms(1), 200);
        assert_eq!(policy.compute_delay_ms(2), 400);
        assert_eq!(policy.compute_delay_ms(3), 500);
        assert_eq!(policy.compute_delay_ms(10), 500);
    }

    #[test]
    fn read_retries_429_write_does_not() {
        let read = RetryPolicy::for_read(3);
        let write = RetryPolicy::for_write(3);
        assert!(read.is_retryable(Reason::Http429));
        assert!(!write.is_retryable(Reason::Http429));
    }

    #[test]
    fn default_deadlines_match_spec() {
        let policy = DeadlinePolicy::default();
        assert_eq!(policy.deadline_ms(super::super::OP_CANCEL_ORDER), 600);
        assert_eq!(policy.deadline_ms(super::super::OP_PLACE_ORDER), 1500);
        assert_eq!(policy.deadline_ms("unknown_op"), 5000);
    }
}
