// # ddns-metrics
//
// Prometheus counters for the DDNS system, exported in the text format on
// `GET /metrics`:
//
// ```text
// dyndns_changed_ipv4_total{domains="foo.example.org;bar.example.org"} 3
// dyndns_changed_ipv6_total{domains="foo.example.org;bar.example.org"} 1
// dyndns_requests_total{method="GET",status="200"} 12
// ```
//
// [`Metrics`] plugs into the reconciler as a [`ChangeObserver`] and into the
// relay router through [`track_requests`]. The endpoint runs on its own
// listener (see [`serve`]).

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use ddns_core::traits::observer::domains_label;
use ddns_core::traits::{ChangeObserver, IpVersion};
use ddns_core::{Error, Result};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TEXT_FORMAT, TextEncoder};
use std::fmt;
use std::future::Future;
use tokio::net::TcpListener;

/// Counter registry shared by the reconciler, the relay router and the
/// metrics endpoint
///
/// Clones share the same counters.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    changed_ipv4: IntCounterVec,
    changed_ipv6: IntCounterVec,
    requests: IntCounterVec,
}

impl Metrics {
    /// Create and register all counters at zero
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let changed_ipv4 = register(
            &registry,
            "dyndns_changed_ipv4_total",
            "Total number of times the IPv4 address has changed",
            &["domains"],
        )?;
        let changed_ipv6 = register(
            &registry,
            "dyndns_changed_ipv6_total",
            "Total number of times the IPv6 address has changed",
            &["domains"],
        )?;
        let requests = register(
            &registry,
            "dyndns_requests_total",
            "Total number of requests made to update the DNS records",
            &["method", "status"],
        )?;

        Ok(Self {
            registry,
            changed_ipv4,
            changed_ipv6,
            requests,
        })
    }

    /// Changes counted for `version` and exactly `domains`
    pub fn changed(&self, version: IpVersion, domains: &[String]) -> u64 {
        let label = domains_label(domains);
        self.changed_counter(version)
            .with_label_values(&[label.as_str()])
            .get()
    }

    /// Requests counted for `method` answered with `status`
    pub fn requests(&self, method: &str, status: StatusCode) -> u64 {
        self.requests
            .with_label_values(&[method, status.as_str()])
            .get()
    }

    /// Count one handled request
    pub fn record_request(&self, method: &str, status: StatusCode) {
        self.requests
            .with_label_values(&[method, status.as_str()])
            .inc();
    }

    /// Render every counter in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Other(format!("metrics: {e}")))
    }

    fn changed_counter(&self, version: IpVersion) -> &IntCounterVec {
        match version {
            IpVersion::V4 => &self.changed_ipv4,
            IpVersion::V6 => &self.changed_ipv6,
        }
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl ChangeObserver for Metrics {
    fn notify_changed(&self, version: IpVersion, domains: &[String]) {
        let label = domains_label(domains);
        self.changed_counter(version)
            .with_label_values(&[label.as_str()])
            .inc();
    }
}

fn register(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels).map_err(metrics_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metrics_error)?;
    Ok(counter)
}

fn metrics_error(err: prometheus::Error) -> Error {
    Error::Other(format!("metrics: {err}"))
}

/// Middleware counting every request by method and response status
///
/// ```rust,ignore
/// router.layer(axum::middleware::from_fn_with_state(metrics, track_requests))
/// ```
pub async fn track_requests(
    State(metrics): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics.record_request(method.as_str(), response.status());
    response
}

/// Build the router exporting `metrics` on `GET /metrics`
pub fn router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(export))
        .with_state(metrics)
}

/// Serve the metrics endpoint on `listener` until `shutdown` completes
pub async fn serve<F>(listener: TcpListener, metrics: Metrics, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Metrics endpoint listening on {}", addr);
    }

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn export(State(metrics): State<Metrics>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
