//! Observability HTTP server (spec §4.17/§6): `/healthz`, `/readyz`,
//! `/metrics`. Same manual hyper accept loop as this codebase's other
//! service entry points — no web framework.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::metrics::MetricsRegistry;

/// Shared readiness flag, flipped by the HA lock holder logic (spec §4.16):
/// ACTIVE reports ready, STANDBY/UNKNOWN report 503.
#[derive(Clone)]
pub struct ReadinessFlag(Arc<AtomicBool>);

impl ReadinessFlag {
    pub fn new(ready: bool) -> Self {
        Self(Arc::new(AtomicBool::new(ready)))
    }

    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for ReadinessFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

#[derive(Clone)]
pub struct MonitoringServerConfig {
    pub listen_addr: SocketAddr,
    pub metrics_path: String,
}

impl Default for MonitoringServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 9090).into(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

pub struct MonitoringServer {
    config: MonitoringServerConfig,
    registry: Arc<MetricsRegistry>,
    readiness: ReadinessFlag,
    started_at: Instant,
}

impl MonitoringServer {
    pub fn new(config: MonitoringServerConfig, registry: Arc<MetricsRegistry>, readiness: ReadinessFlag) -> Self {
        Self {
            config,
            registry,
            readiness,
            started_at: Instant::now(),
        }
    }

    pub async fn serve(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "monitoring server listening");

        let registry = self.registry;
        let readiness = self.readiness;
        let metrics_path = self.config.metrics_path;
        let started_at = self.started_at;

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "monitoring server accept failed");
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let registry = registry.clone();
            let readiness = readiness.clone();
            let metrics_path = metrics_path.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let registry = registry.clone();
                    let readiness = readiness.clone();
                    let metrics_path = metrics_path.clone();
                    async move { handle_request(req, registry, readiness, metrics_path, started_at).await }
                });
                if let Err(e) = hyper::server::conn::http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, %peer, "monitoring connection error");
                }
            });
        }
    }
}

#[derive(Serialize)]
struct HealthzBody {
    status: &'static str,
    uptime_s: f64,
}

#[derive(Serialize)]
struct ReadyzBody {
    ready: bool,
    role: &'static str,
}

async fn handle_request(
    req: Request<Incoming>,
    registry: Arc<MetricsRegistry>,
    readiness: ReadinessFlag,
    metrics_path: String,
    started_at: Instant,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    if path == "/healthz" {
        return Ok(json_response(
            StatusCode::OK,
            &HealthzBody {
                status: "ok",
                uptime_s: started_at.elapsed().as_secs_f64(),
            },
        ));
    }
    if path == "/readyz" {
        let ready = readiness.get();
        let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
        let role = if ready { "ACTIVE" } else { "STANDBY" };
        return Ok(json_response(status, &ReadyzBody { ready, role }));
    }
    if path == metrics_path {
        return Ok(encode_metrics(&registry));
    }
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from_static(b"not found")))
        .expect("static 404 response is well-formed"))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).expect("response body serializes infallibly");
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .expect("well-formed response")
}

fn encode_metrics(registry: &MetricsRegistry) -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = registry.registry().gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "metrics encoding failed");
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::from_static(b"metrics encoding failed")))
            .expect("well-formed response");
    }
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", encoder.format_type())
        .body(Full::new(Bytes::from(buffer)))
        .expect("well-formed response")
}
