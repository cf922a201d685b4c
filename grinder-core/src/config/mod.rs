//! Runtime configuration, loaded from environment variables (spec §6).
//!
//! Two-tier philosophy, mirrored from this codebase's existing config
//! module: `Config::from_env()` fills in defaults permissively, and
//! `validate()` is a separate step that refuses to arm any write path on
//! an invalid combination. Callers must call both.

use std::env;

use anyhow::{bail, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: Option<String>,
    pub ha_lock_ttl_ms: u64,
    pub ha_renew_interval_ms: u64,

    pub reconcile_enabled: bool,
    pub reconcile_interval_ms: u64,

    pub emergency_exit_enabled: bool,

    pub audit_enabled: bool,
    pub audit_path: Option<String>,

    pub allow_legacy_order_id: bool,
    pub allow_mainnet_trade: bool,
    pub latency_retry_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            ha_lock_ttl_ms: 10_000,
            ha_renew_interval_ms: 3_000,
            reconcile_enabled: false,
            reconcile_interval_ms: 30_000,
            emergency_exit_enabled: false,
            audit_enabled: false,
            audit_path: None,
            allow_legacy_order_id: false,
            allow_mainnet_trade: false,
            latency_retry_enabled: false,
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|v| v == "1").unwrap_or(false)
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("{key} must be an integer: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            redis_url: env::var("GRINDER_REDIS_URL").ok(),
            ha_lock_ttl_ms: env_u64("GRINDER_HA_LOCK_TTL_MS", 10_000)?,
            ha_renew_interval_ms: env_u64("GRINDER_HA_RENEW_INTERVAL_MS", 3_000)?,
            reconcile_enabled: env_flag("RECONCILE_ENABLED"),
            reconcile_interval_ms: env_u64("RECONCILE_INTERVAL_MS", 30_000)?,
            emergency_exit_enabled: env_flag("GRINDER_EMERGENCY_EXIT_ENABLED"),
            audit_enabled: env_flag("GRINDER_AUDIT_ENABLED"),
            audit_path: env::var("GRINDER_AUDIT_PATH").ok(),
            allow_legacy_order_id: env_flag("ALLOW_LEGACY_ORDER_ID"),
            allow_mainnet_trade: env_flag("ALLOW_MAINNET_TRADE"),
            latency_retry_enabled: env_flag("LATENCY_RETRY_ENABLED"),
        })
    }

    /// Refuses to arm the process on invalid combinations. Must be called
    /// before any write path (leader election, live trading) is started.
    pub fn validate(&self) -> Result<()> {
        if self.ha_renew_interval_ms >= self.ha_lock_ttl_ms {
            bail!(
                "GRINDER_HA_RENEW_INTERVAL_MS ({}) must be < GRINDER_HA_LOCK_TTL_MS ({})",
                self.ha_renew_interval_ms,
                self.ha_lock_ttl_ms
            );
        }
        if self.ha_lock_ttl_ms < 1_000 {
            bail!("GRINDER_HA_LOCK_TTL_MS must be >= 1000");
        }
        if self.audit_enabled && self.audit_path.is_none() {
            bail!("GRINDER_AUDIT_ENABLED=1 requires GRINDER_AUDIT_PATH to be set");
        }
        if self.reconcile_enabled && self.reconcile_interval_ms == 0 {
            bail!("RECONCILE_INTERVAL_MS must be > 0 when RECONCILE_ENABLED=1");
        }
        Ok(())
    }
}
