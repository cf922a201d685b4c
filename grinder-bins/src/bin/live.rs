//! Live wiring binary: HTTP observability server, leader election,
//! reconcile loop, and the top-level system FSM, run concurrently under a
//! single `tokio` runtime. The raw exchange connector (HMAC request
//! signing against a real REST API) is a deployment-specific concern not
//! built here; `SimulatedExchangePort` stands in so every other component
//! — idempotency, retry, circuit breaker, reconcile, HA — runs against a
//! real `ExchangePort` implementation end to end. Swap it for a live
//! connector without touching anything else in this binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use grinder_core::clock::system_clock;
use grinder_core::config::Config;
use grinder_core::ha::{InMemoryLockStore, LeaderElection, LeaderElectionConfig};
use grinder_core::monitoring::{MonitoringServer, MonitoringServerConfig, MetricsRegistry, ReadinessFlag};
use grinder_core::port::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use grinder_core::port::idempotent::IdempotentExchangePort;
use grinder_core::port::retry::RetryPolicy;
use grinder_core::port::simulated::SimulatedExchangePort;
use grinder_core::port::ExchangePort;
use grinder_core::reconcile::stores::{ExpectedStateStore, ObservedStateStore};
use grinder_core::reconcile::{ReconcileConfig, ReconcileEngine};
use grinder_core::safety::{FsmInputs, SystemFsm};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;
    config.validate()?;
    info!(?config, "grinder-live starting");

    let clock = system_clock();
    let metrics = Arc::new(MetricsRegistry::new().expect("metrics registry must construct"));
    let readiness = ReadinessFlag::new(false);

    let monitoring = MonitoringServer::new(MonitoringServerConfig::default(), metrics.clone(), readiness.clone());
    let monitoring_handle = tokio::spawn(async move {
        if let Err(e) = monitoring.serve().await {
            error!(error = %e, "monitoring server exited");
        }
    });

    let lock_store = InMemoryLockStore::new(clock.clone());
    let leader_election = Arc::new(
        LeaderElection::new(
            LeaderElectionConfig {
                lock_key: "grinder:leader:lock".to_string(),
                lock_ttl_ms: config.ha_lock_ttl_ms,
                renew_interval_ms: config.ha_renew_interval_ms,
                instance_id: format!("grinder-{}", std::process::id()),
            },
            lock_store,
            clock.clone(),
        )
        .expect("HA config validated by Config::validate"),
    );

    let fsm = Arc::new(SystemFsm::new());

    let retry = if config.latency_retry_enabled {
        RetryPolicy::for_write(3)
    } else {
        RetryPolicy::disabled()
    };
    let circuit = CircuitBreaker::new(CircuitBreakerConfig::default(), clock.clone());
    let exchange = SimulatedExchangePort::new(clock.clone());
    let port = Arc::new(IdempotentExchangePort::new(exchange, clock.clone(), circuit, retry, "grinder-live".to_string()));

    let ha_task = {
        let leader_election = leader_election.clone();
        let readiness = readiness.clone();
        let metrics = metrics.clone();
        let fsm = fsm.clone();
        let renew_interval = Duration::from_millis(config.ha_renew_interval_ms);
        tokio::spawn(async move {
            loop {
                leader_election.tick();
                let active = leader_election.is_active();
                readiness.set(active);
                metrics.set_ha_role(leader_election.role().as_str());
                let state = fsm.tick(FsmInputs {
                    health_ok: true,
                    armed: active,
                    ..Default::default()
                });
                metrics.fsm_current_state.with_label_values(&[state.as_str()]).set(1.0);
                tokio::time::sleep(renew_interval).await;
            }
        })
    };

    let reconcile_task = {
        let metrics = metrics.clone();
        let leader_election = leader_election.clone();
        let port = port.clone();
        let interval = Duration::from_millis(config.reconcile_interval_ms);
        let enabled = config.reconcile_enabled;
        tokio::spawn(async move {
            if !enabled {
                return;
            }
            let engine = ReconcileEngine::new(
                ReconcileConfig {
                    enabled: true,
                    order_grace_period_ms: 5_000,
                    symbol_filter: None,
                },
                grinder_core::data::OrderIdentityConfig::new("grinder_".into(), "default".into()),
                clock.clone(),
            );
            let expected = ExpectedStateStore::new(200, 86_400_000, clock.clone());
            let mut observed = ObservedStateStore::new();

            loop {
                tokio::time::sleep(interval).await;
                if !leader_election.is_active() {
                    continue;
                }
                match port.fetch_account_snapshot() {
                    Ok(snapshot) => {
                        metrics.reconcile_last_snapshot_ts_ms.set(snapshot.ts as f64);
                        observed.update_from_snapshot(&snapshot);
                        let mismatches = engine.run(&expected, &observed);
                        for m in &mismatches {
                            metrics
                                .reconcile_mismatch_total
                                .with_label_values(&[m.mismatch_type.as_str()])
                                .inc();
                        }
                    }
                    Err(e) => error!(error = %e, "reconcile snapshot fetch failed"),
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    readiness.set(false);
    leader_election.release();
    monitoring_handle.abort();
    ha_task.abort();
    reconcile_task.abort();
    Ok(())
}
