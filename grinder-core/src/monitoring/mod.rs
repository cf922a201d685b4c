//! Observability (spec §4.17): Prometheus metrics and the `/healthz`,
//! `/readyz`, `/metrics` HTTP surface.

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::{MonitoringServer, MonitoringServerConfig, ReadinessFlag};
