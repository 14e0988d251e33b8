//! Contract Test: Relay Round Trip
//!
//! This test runs a relay server on an ephemeral port with an in-memory
//! provider behind it and drives it with the relay client.
//!
//! Constraints verified:
//! - A relayed update performs exactly the direct reconciliation pass
//! - The shared secret and the allow-list are enforced before any pass
//! - Invalid input is answered with 400 and never reaches the provider
//! - Concurrent requests do not interleave their passes
//! - A pass that outlives its request still runs to completion
//! - Requests and record changes are counted when metrics are attached

use async_trait::async_trait;
use axum::http::StatusCode;
use ddns_core::traits::{DnsProvider, IpVersion, Record, RecordType, UpdateClient};
use ddns_core::{Error, MemoryProvider, Reconciler};
use ddns_metrics::Metrics;
use ddns_relay::{AppState, RelayClient, UpdateResponse, serve};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

const SECRET: &str = "relay-secret";

async fn zones() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.add_zone("44a6dc905d4ff61b", "example.org").await;
    provider.add_zone("78fc43dc6a8c5e7c", "example.net").await;
    provider
}

/// Provider whose writes for one name take `delay` to complete
struct StallingProvider {
    inner: MemoryProvider,
    name: &'static str,
    delay: Duration,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl StallingProvider {
    fn new(inner: MemoryProvider, name: &'static str, delay: Duration) -> Self {
        Self {
            inner,
            name,
            delay,
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl DnsProvider for StallingProvider {
    async fn resolve_zone(&self, domain: &str) -> Result<String, Error> {
        self.inner.resolve_zone(domain).await
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>, Error> {
        self.inner.list_records(zone_id, name, record_type).await
    }

    async fn write_record(&self, zone_id: &str, record: &Record) -> Result<(), Error> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if record.name == self.name {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.inner.write_record(zone_id, record).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn provider_name(&self) -> &'static str {
        "stalling"
    }
}

struct TestServer {
    addr: SocketAddr,
    provider: MemoryProvider,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<ddns_core::Result<()>>,
}

impl TestServer {
    async fn start(secret: Option<&str>, allowed: &[&str]) -> Self {
        let provider = zones().await;
        let state = AppState::with_policy(
            Reconciler::new(Arc::new(provider.clone())),
            secret.map(str::to_string),
            allowed.iter().map(|d| d.to_string()).collect(),
        );
        Self::with_state(provider, state).await
    }

    async fn with_state(provider: MemoryProvider, state: AppState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            provider,
            shutdown,
            handle,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn client(&self, domains: &[&str], ipv4: Option<&str>, ipv6: Option<&str>) -> RelayClient {
        let mut client = RelayClient::new(self.url(), true).unwrap().with_secret(SECRET);
        client.data_mut().set_domains(domains);
        if let Some(addr) = ipv4 {
            client.data_mut().set_ipv4(addr).unwrap();
        }
        if let Some(addr) = ipv6 {
            client.data_mut().set_ipv6(addr).unwrap();
        }
        client
    }

    fn query(&self, domains: &str, ipv4: &str) -> reqwest::RequestBuilder {
        reqwest::Client::new()
            .get(self.url())
            .query(&[("domains", domains), ("ipv4", ipv4)])
    }

    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        assert_ok!(self.handle.await.unwrap());
    }
}

#[tokio::test]
async fn relayed_update_reconciles_at_the_server() {
    let server = TestServer::start(Some(SECRET), &[]).await;
    let client = server.client(&["foo.example.org"], Some("100.100.100.100"), Some("fd69::dead"));

    client.update().await.expect("relayed update succeeds");

    let records = server.provider.records("foo.example.org").await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.proxied));
    assert!(records.iter().any(|r| r.record_type == RecordType::Aaaa && r.content == "fd69::dead"));

    // Second update converges without writes
    client.update().await.unwrap();
    assert_eq!(server.provider.writes().await.len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn wrong_secret_is_rejected_without_provider_calls() {
    let server = TestServer::start(Some(SECRET), &[]).await;
    let mut client = RelayClient::new(server.url(), true).unwrap().with_secret("guess");
    client.data_mut().set_domains(["foo.example.org"]);
    client.data_mut().set_ipv4("100.100.100.100").unwrap();

    let err = client.update().await.unwrap_err();
    assert!(matches!(err, Error::Relay(ref msg) if msg.contains("401")), "got {err:?}");
    assert_eq!(server.provider.request_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn domain_outside_allow_list_is_forbidden() {
    let server = TestServer::start(Some(SECRET), &["example.org"]).await;
    let client = server.client(
        &["foo.example.org", "bar.example.net"],
        Some("100.100.100.100"),
        None,
    );

    let err = client.update().await.unwrap_err();
    assert!(matches!(err, Error::Relay(ref msg) if msg.contains("403")), "got {err:?}");
    assert_eq!(server.provider.request_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn invalid_address_is_a_bad_request() {
    let server = TestServer::start(None, &[]).await;

    let response = server.query("foo.example.org", "fd69::dead").send().await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: UpdateResponse = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(server.provider.request_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn provider_failure_is_a_bad_gateway() {
    let server = TestServer::start(Some(SECRET), &[]).await;
    let client = server.client(&["foo.example.com"], Some("100.100.100.100"), None);

    let err = client.update().await.unwrap_err();
    assert!(matches!(err, Error::Relay(ref msg) if msg.contains("502")), "got {err:?}");

    server.stop().await;
}

#[tokio::test]
async fn concurrent_updates_do_not_interleave() {
    let server = TestServer::start(Some(SECRET), &[]).await;
    let first = server.client(&["foo.example.org"], Some("100.100.100.100"), None);
    let second = server.client(&["foo.example.org"], Some("100.100.100.100"), None);

    let (a, b) = tokio::join!(first.update(), second.update());
    a.unwrap();
    b.unwrap();

    // Serialized passes: one creates, the other sees the record
    assert_eq!(server.provider.records("foo.example.org").await.len(), 1);
    assert_eq!(server.provider.writes().await.len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn healthcheck_reports_healthy() {
    let server = TestServer::start(Some(SECRET), &[]).await;

    let body: serde_json::Value = reqwest::get(format!("{}/healthcheck", server.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!({"ok": "healthy"}));

    server.stop().await;
}

#[tokio::test]
async fn stalled_pass_completes_after_the_request_times_out() {
    let provider = zones().await;
    let stalling = StallingProvider::new(provider.clone(), "b.example.org", Duration::from_millis(300));
    let (started, finished) = (stalling.started.clone(), stalling.finished.clone());
    let state = AppState::with_policy(Reconciler::new(Arc::new(stalling)), None, Vec::new())
        .with_pass_timeout(Duration::from_millis(50));
    let server = TestServer::with_state(provider, state).await;

    let response = server
        .query("a.example.org,b.example.org", "100.100.100.100")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::GATEWAY_TIMEOUT);
    let body: UpdateResponse = response.json().await.unwrap();
    assert!(!body.success);

    // The write in flight is not cancelled with the request
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(finished.load(Ordering::SeqCst), 2);
    assert_eq!(server.provider.records("a.example.org").await.len(), 1);
    assert_eq!(server.provider.records("b.example.org").await.len(), 1);

    // The next request converges without writes
    let response = server
        .query("a.example.org,b.example.org", "100.100.100.100")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(server.provider.writes().await.len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn requests_and_changes_are_counted() {
    let metrics = Metrics::new().unwrap();
    let provider = zones().await;
    let reconciler =
        Reconciler::new(Arc::new(provider.clone())).with_observer(Arc::new(metrics.clone()));
    let state = AppState::with_policy(reconciler, Some(SECRET.to_string()), Vec::new())
        .with_metrics(metrics.clone());
    let server = TestServer::with_state(provider, state).await;

    let client = server.client(&["foo.example.org"], Some("100.100.100.100"), None);
    assert_ok!(client.update().await);
    assert_ok!(client.update().await);

    let mut intruder = RelayClient::new(server.url(), true).unwrap();
    intruder.data_mut().set_domains(["foo.example.org"]);
    intruder.data_mut().set_ipv4("100.100.100.100").unwrap();
    assert!(intruder.update().await.is_err());

    assert_eq!(metrics.requests("GET", StatusCode::OK), 2);
    assert_eq!(metrics.requests("GET", StatusCode::UNAUTHORIZED), 1);
    // only the first pass changed anything
    let domains = vec!["foo.example.org".to_string()];
    assert_eq!(metrics.changed(IpVersion::V4, &domains), 1);
    assert_eq!(metrics.changed(IpVersion::V6, &domains), 0);

    server.stop().await;
}
