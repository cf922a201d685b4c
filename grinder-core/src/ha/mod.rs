//! Leader election (spec §4.16): a TTL-lease lock against a key-value store
//! supporting atomic compare-and-set with PX/NX/XX semantics. The store
//! itself (Redis in production) is an external collaborator per §1 — this
//! module owns the `LockStore` trait and the renewal state machine, not the
//! wire protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Active,
    Standby,
    Unknown,
}

impl Default for Role {
    fn default() -> Self {
        Role::Unknown
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Active => "active",
            Role::Standby => "standby",
            Role::Unknown => "unknown",
        }
    }
}

/// Abstraction over the distributed lock backend (Redis `SET key val PX ms
/// [NX|XX]` plus an atomic check-and-delete) so the renewal state machine
/// is testable without a real store.
pub trait LockStore: Send + Sync {
    /// `SET key value PX ttl_ms NX` — acquire only if absent. Returns true
    /// on success.
    fn set_nx(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, String>;
    /// `SET key value PX ttl_ms XX` — renew only if the key already exists
    /// (regardless of value; callers check `get` first per spec's sequence).
    fn set_xx(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, String>;
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    /// Atomic check-and-delete: removes `key` only if its value is
    /// `expected`. Returns true if deleted.
    fn check_and_delete(&self, key: &str, expected: &str) -> Result<bool, String>;
}

#[derive(Debug, Clone)]
pub struct LeaderElectionConfig {
    pub lock_key: String,
    pub lock_ttl_ms: u64,
    pub renew_interval_ms: u64,
    pub instance_id: String,
}

impl LeaderElectionConfig {
    pub fn validate(&self) -> Result<(), InvariantError> {
        if self.lock_ttl_ms < 1000 {
            return Err(InvariantError::Config(format!(
                "lock_ttl_ms ({}) must be >= 1000ms",
                self.lock_ttl_ms
            )));
        }
        if self.renew_interval_ms >= self.lock_ttl_ms {
            return Err(InvariantError::InvalidLeaseInterval {
                renew: self.renew_interval_ms,
                ttl: self.lock_ttl_ms,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HaState {
    role: Role,
    lock_holder: Option<String>,
    lock_failures: u64,
}

pub struct LeaderElection<S: LockStore> {
    config: LeaderElectionConfig,
    store: S,
    clock: Arc<dyn Clock>,
    state: Mutex<HaState>,
    last_lock_attempt_ms: AtomicU64,
}

impl<S: LockStore> LeaderElection<S> {
    pub fn new(config: LeaderElectionConfig, store: S, clock: Arc<dyn Clock>) -> Result<Self, InvariantError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            clock,
            state: Mutex::new(HaState::default()),
            last_lock_attempt_ms: AtomicU64::new(0),
        })
    }

    pub fn role(&self) -> Role {
        self.state.lock().role
    }

    pub fn is_active(&self) -> bool {
        self.role() == Role::Active
    }

    /// One iteration of the renewal loop (spec §4.16 steps 1-5). Callers
    /// drive this on a `renew_interval_ms` tick from a background task; the
    /// loop itself (sleep + stop-event observation) lives in the binary.
    pub fn tick(&self) {
        self.last_lock_attempt_ms
            .store(self.clock.now_ms() as u64, Ordering::SeqCst);

        let result = self.attempt_lock();
        if let Err(e) = result {
            warn!(error = %e, "leader election lock attempt failed, demoting to standby");
            self.become_standby(None);
            let mut state = self.state.lock();
            state.lock_failures += 1;
        }
    }

    fn attempt_lock(&self) -> Result<(), String> {
        let holder = self.store.get(&self.config.lock_key)?;
        match holder {
            Some(ref h) if h == &self.config.instance_id => {
                if self.store.set_xx(&self.config.lock_key, &self.config.instance_id, self.config.lock_ttl_ms)? {
                    self.become_active();
                } else {
                    self.become_standby(None);
                }
            }
            None => {
                if self.store.set_nx(&self.config.lock_key, &self.config.instance_id, self.config.lock_ttl_ms)? {
                    self.become_active();
                } else {
                    self.become_standby(None);
                }
            }
            Some(other) => self.become_standby(Some(other)),
        }
        Ok(())
    }

    fn become_active(&self) {
        let mut state = self.state.lock();
        if state.role != Role::Active {
            info!(instance_id = %self.config.instance_id, "became active (acquired lock)");
        }
        state.role = Role::Active;
        state.lock_holder = Some(self.config.instance_id.clone());
        state.lock_failures = 0;
    }

    fn become_standby(&self, holder: Option<String>) {
        let mut state = self.state.lock();
        if state.role == Role::Active {
            warn!(instance_id = %self.config.instance_id, "lost lock, demoting to standby");
        }
        state.role = Role::Standby;
        state.lock_holder = holder;
    }

    /// Conditional release via atomic check-and-delete (spec §4.16 stop
    /// sequence). No-op if another instance now holds the lock.
    pub fn release(&self) {
        match self.store.check_and_delete(&self.config.lock_key, &self.config.instance_id) {
            Ok(true) => info!(instance_id = %self.config.instance_id, "released lock"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "could not release lock"),
        }
        self.become_standby(None);
    }
}

/// In-memory LockStore for tests and the fixture-replay / paper-engine
/// binary, which runs single-instance and has no real coordination need.
#[derive(Default)]
pub struct InMemoryLockStore {
    entries: Mutex<std::collections::HashMap<String, (String, i64)>>,
    clock: Option<Arc<dyn Clock>>,
}

impl InMemoryLockStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(std::collections::HashMap::new()),
            clock: Some(clock),
        }
    }

    fn now_ms(&self) -> i64 {
        self.clock.as_ref().map(|c| c.now_ms()).unwrap_or(0)
    }

    fn is_live(&self, expires_at: i64) -> bool {
        self.now_ms() < expires_at
    }
}

impl LockStore for InMemoryLockStore {
    fn set_nx(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, String> {
        let mut entries = self.entries.lock();
        let expires_at = self.now_ms() + ttl_ms as i64;
        match entries.get(key) {
            Some((_, exp)) if self.is_live(*exp) => Ok(false),
            _ => {
                entries.insert(key.to_string(), (value.to_string(), expires_at));
                Ok(true)
            }
        }
    }

    fn set_xx(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, String> {
        let mut entries = self.entries.lock();
        let expires_at = self.now_ms() + ttl_ms as i64;
        match entries.get(key) {
            Some((_, exp)) if self.is_live(*exp) => {
                entries.insert(key.to_string(), (value.to_string(), expires_at));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let entries = self.entries.lock();
        Ok(entries.get(key).filter(|(_, exp)| self.is_live(*exp)).map(|(v, _)| v.clone()))
    }

    fn check_and_delete(&self, key: &str, expected: &str) -> Result<bool, String> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(|(v, _)| v.as_str()) == Some(expected) {
            entries.remove(key);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
