//! Prometheus metrics (spec §4.17/§6): a closed metric-name and label
//! vocabulary. Forbidden labels never appear: `symbol, order_id, key,
//! client_id, idempotency_key`. Every metric is registered with at least
//! one series at startup — a `{..., "none"} 0` placeholder where the spec
//! calls for one — so a scrape before any traffic still proves the metric
//! exists.

use prometheus::{CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry};

/// Central registry, grouped by concern the way this codebase's trading/
/// performance/risk/system split does.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub up: Gauge,
    pub uptime_seconds: Gauge,
    pub ha_role: GaugeVec,
    pub gating_allowed_total: CounterVec,
    pub gating_blocked_total: CounterVec,
    pub connector_retries_total: CounterVec,
    pub idempotency_hits_total: CounterVec,
    pub idempotency_conflicts_total: CounterVec,
    pub idempotency_misses_total: CounterVec,
    pub circuit_state: GaugeVec,
    pub circuit_rejected_total: CounterVec,
    pub circuit_trips_total: CounterVec,
    pub reconcile_mismatch_total: CounterVec,
    pub reconcile_action_planned_total: CounterVec,
    pub reconcile_action_executed_total: CounterVec,
    pub reconcile_action_blocked_total: CounterVec,
    pub reconcile_last_snapshot_ts_ms: Gauge,
    pub reconcile_budget_calls_used_day: Gauge,
    pub reconcile_budget_calls_remaining_day: Gauge,
    pub reconcile_budget_notional_used_day: Gauge,
    pub reconcile_budget_notional_remaining_day: Gauge,
    pub kill_switch_triggered: Gauge,
    pub drawdown_pct: Gauge,
    pub fsm_current_state: GaugeVec,
    pub fsm_transitions_total: CounterVec,
    pub http_requests_total: CounterVec,
    pub http_retries_total: CounterVec,
    pub http_fail_total: CounterVec,
    pub http_latency_ms: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let up = register_gauge(&registry, "grinder_up", "1 if the process is running")?;
        let uptime_seconds = register_gauge(&registry, "grinder_uptime_seconds", "Seconds since process start")?;
        let ha_role = register_gauge_vec(&registry, "grinder_ha_role", "One-hot HA role", &["role"])?;
        let gating_allowed_total = register_counter_vec(
            &registry,
            "grinder_gating_allowed_total",
            "Intents allowed by a gate",
            &["gate"],
        )?;
        let gating_blocked_total = register_counter_vec(
            &registry,
            "grinder_gating_blocked_total",
            "Intents blocked by a gate",
            &["gate", "reason"],
        )?;
        let connector_retries_total = register_counter_vec(
            &registry,
            "grinder_connector_retries_total",
            "Exchange port retries",
            &["op", "reason"],
        )?;
        let idempotency_hits_total = register_counter_vec(
            &registry,
            "grinder_idempotency_hits_total",
            "Idempotent port cache hits",
            &["op"],
        )?;
        let idempotency_conflicts_total = register_counter_vec(
            &registry,
            "grinder_idempotency_conflicts_total",
            "Idempotent port in-flight conflicts",
            &["op"],
        )?;
        let idempotency_misses_total = register_counter_vec(
            &registry,
            "grinder_idempotency_misses_total",
            "Idempotent port cache misses",
            &["op"],
        )?;
        let circuit_state = register_gauge_vec(
            &registry,
            "grinder_circuit_state",
            "One-hot circuit breaker state per operation",
            &["op", "state"],
        )?;
        let circuit_rejected_total = register_counter_vec(
            &registry,
            "grinder_circuit_rejected_total",
            "Calls rejected by an open circuit",
            &["op"],
        )?;
        let circuit_trips_total = register_counter_vec(
            &registry,
            "grinder_circuit_trips_total",
            "Circuit breaker trips",
            &["op", "reason"],
        )?;
        let reconcile_mismatch_total = register_counter_vec(
            &registry,
            "grinder_reconcile_mismatch_total",
            "Reconciliation mismatches detected",
            &["type"],
        )?;
        let reconcile_action_planned_total = register_counter_vec(
            &registry,
            "grinder_reconcile_action_planned_total",
            "Remediation actions planned",
            &["action"],
        )?;
        let reconcile_action_executed_total = register_counter_vec(
            &registry,
            "grinder_reconcile_action_executed_total",
            "Remediation actions executed",
            &["action"],
        )?;
        let reconcile_action_blocked_total = register_counter_vec(
            &registry,
            "grinder_reconcile_action_blocked_total",
            "Remediation actions blocked by budget or mode",
            &["action"],
        )?;
        let reconcile_last_snapshot_ts_ms =
            register_gauge(&registry, "grinder_reconcile_last_snapshot_ts_ms", "Timestamp of the last account snapshot")?;
        let reconcile_budget_calls_used_day =
            register_gauge(&registry, "grinder_reconcile_budget_calls_used_day", "Remediation calls used today")?;
        let reconcile_budget_calls_remaining_day = register_gauge(
            &registry,
            "grinder_reconcile_budget_calls_remaining_day",
            "Remediation calls remaining today",
        )?;
        let reconcile_budget_notional_used_day = register_gauge(
            &registry,
            "grinder_reconcile_budget_notional_used_day",
            "Remediation notional used today",
        )?;
        let reconcile_budget_notional_remaining_day = register_gauge(
            &registry,
            "grinder_reconcile_budget_notional_remaining_day",
            "Remediation notional remaining today",
        )?;
        let kill_switch_triggered = register_gauge(&registry, "grinder_kill_switch_triggered", "1 if the kill switch is tripped")?;
        let drawdown_pct = register_gauge(&registry, "grinder_drawdown_pct", "Current drawdown percentage")?;
        let fsm_current_state = register_gauge_vec(&registry, "grinder_fsm_current_state", "One-hot system FSM state", &["state"])?;
        let fsm_transitions_total = register_counter_vec(
            &registry,
            "grinder_fsm_transitions_total",
            "System FSM transitions",
            &["from_state", "to_state", "reason"],
        )?;
        let http_requests_total = register_counter_vec(&registry, "grinder_http_requests_total", "Exchange HTTP requests", &["op"])?;
        let http_retries_total = register_counter_vec(&registry, "grinder_http_retries_total", "Exchange HTTP retries", &["op"])?;
        let http_fail_total = register_counter_vec(&registry, "grinder_http_fail_total", "Exchange HTTP failures", &["op"])?;
        let http_latency_ms = register_histogram(
            &registry,
            "grinder_http_latency_ms",
            "Exchange HTTP request latency in milliseconds",
            vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0],
        )?;

        // Placeholder series for label-carrying metrics with nothing
        // recorded yet, so a scrape before any traffic still proves
        // presence (spec §4.17).
        gating_allowed_total.with_label_values(&["none"]).inc_by(0.0);
        gating_blocked_total.with_label_values(&["none", "none"]).inc_by(0.0);
        connector_retries_total.with_label_values(&["none", "none"]).inc_by(0.0);
        idempotency_hits_total.with_label_values(&["none"]).inc_by(0.0);
        idempotency_conflicts_total.with_label_values(&["none"]).inc_by(0.0);
        idempotency_misses_total.with_label_values(&["none"]).inc_by(0.0);
        circuit_rejected_total.with_label_values(&["none"]).inc_by(0.0);
        circuit_trips_total.with_label_values(&["none", "none"]).inc_by(0.0);
        reconcile_mismatch_total.with_label_values(&["none"]).inc_by(0.0);
        reconcile_action_planned_total.with_label_values(&["none"]).inc_by(0.0);
        reconcile_action_executed_total.with_label_values(&["none"]).inc_by(0.0);
        reconcile_action_blocked_total.with_label_values(&["none"]).inc_by(0.0);
        fsm_transitions_total.with_label_values(&["none", "none", "none"]).inc_by(0.0);
        http_requests_total.with_label_values(&["none"]).inc_by(0.0);
        http_retries_total.with_label_values(&["none"]).inc_by(0.0);
        http_fail_total.with_label_values(&["none"]).inc_by(0.0);
        for role in ["active", "standby", "unknown"] {
            ha_role.with_label_values(&[role]).set(0.0);
        }
        for state in ["closed", "open", "half_open"] {
            circuit_state.with_label_values(&["none", state]).set(0.0);
        }

        Ok(Self {
            registry,
            up,
            uptime_seconds,
            ha_role,
            gating_allowed_total,
            gating_blocked_total,
            connector_retries_total,
            idempotency_hits_total,
            idempotency_conflicts_total,
            idempotency_misses_total,
            circuit_state,
            circuit_rejected_total,
            circuit_trips_total,
            reconcile_mismatch_total,
            reconcile_action_planned_total,
            reconcile_action_executed_total,
            reconcile_action_blocked_total,
            reconcile_last_snapshot_ts_ms,
            reconcile_budget_calls_used_day,
            reconcile_budget_calls_remaining_day,
            reconcile_budget_notional_used_day,
            reconcile_budget_notional_remaining_day,
            kill_switch_triggered,
            drawdown_pct,
            fsm_current_state,
            fsm_transitions_total,
            http_requests_total,
            http_retries_total,
            http_fail_total,
            http_latency_ms,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sets the one-hot `grinder_ha_role` gauge, zeroing the other roles.
    pub fn set_ha_role(&self, role: &str) {
        for candidate in ["active", "standby", "unknown"] {
            self.ha_role.with_label_values(&[candidate]).set(if candidate == role { 1.0 } else { 0.0 });
        }
    }

    /// Sets the one-hot `grinder_circuit_state{op,state}` gauge for `op`.
    pub fn set_circuit_state(&self, op: &str, state: &str) {
        for candidate in ["closed", "open", "half_open"] {
            self.circuit_state.with_label_values(&[op, candidate]).set(if candidate == state { 1.0 } else { 0.0 });
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| panic!("metrics registry must construct: {e}"))
    }
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let gauge = Gauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn register_gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec, prometheus::Error> {
    let vec = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn register_counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<CounterVec, prometheus::Error> {
    let vec = CounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn register_histogram(registry: &Registry, name: &str, help: &str, buckets: Vec<f64>) -> Result<Histogram, prometheus::Error> {
    let histogram = Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets))?;
    registry.register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

#[allow(dead_code)]
const _FORBIDDEN_LABELS: [&str; 5] = ["symbol", "order_id", "key", "client_id", "idempotency_key"];

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn every_metric_has_at_least_one_series_at_construction() {
        let reg = MetricsRegistry::new().unwrap();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&reg.registry().gather(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("grinder_gating_blocked_total"));
        assert!(text.contains(r#"gate="none""#));
    }

    #[test]
    fn no_forbidden_label_appears_in_exposition() {
        let reg = MetricsRegistry::new().unwrap();
        reg.gating_allowed_total.with_label_values(&["prefilter"]).inc();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&reg.registry().gather(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        for forbidden in _FORBIDDEN_LABELS {
            assert!(!text.contains(&format!("{forbidden}=")), "forbidden label {forbidden} leaked");
        }
    }

    #[test]
    fn ha_role_is_one_hot() {
        let reg = MetricsRegistry::new().unwrap();
        reg.set_ha_role("active");
        assert_eq!(reg.ha_role.with_label_values(&["active"]).get(), 1.0);
        assert_eq!(reg.ha_role.with_label_values(&["standby"]).get(), 0.0);
    }
}
