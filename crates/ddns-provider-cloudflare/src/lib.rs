// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// Each trait method makes exactly one HTTP request and propagates every
// failure to the caller. Deciding whether a write is needed is owned by the
// `Reconciler`; retrying is owned by the next pass of the `Runner`.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...&status=active`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
//
// Every response is wrapped in the envelope `{success, errors, result}`.

use async_trait::async_trait;
use ddns_core::traits::{DnsProvider, Record, RecordType};
use ddns_core::{DirectClient, Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Response envelope shared by every API v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
}

/// DNS record as sent to and received from the API
#[derive(Debug, Serialize, Deserialize)]
struct DnsRecord {
    #[serde(default, skip_serializing)]
    id: Option<String>,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    #[serde(default)]
    proxied: bool,
    ttl: u32,
}

impl From<&Record> for DnsRecord {
    fn from(record: &Record) -> Self {
        Self {
            id: None,
            record_type: record.record_type.as_str().to_string(),
            name: record.name.clone(),
            content: record.content.clone(),
            proxied: record.proxied,
            ttl: record.ttl,
        }
    }
}

impl DnsRecord {
    /// Convert to the core model; records of other types yield `None`
    fn into_record(self) -> Option<Record> {
        let record_type = self.record_type.parse::<RecordType>().ok()?;
        Some(Record {
            id: self.id,
            record_type,
            name: self.name,
            content: self.content,
            proxied: self.proxied,
            ttl: self.ttl,
        })
    }
}

/// Cloudflare DNS provider
///
/// Stateless and single-shot: nothing is cached between calls.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, overridable for tests
    endpoint: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    ///
    /// # Errors
    ///
    /// - `Error::MissingToken` if the token is empty
    /// - `Error::Config` if the HTTP client cannot be built
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token,
            endpoint: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Use a different API base URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Send an authenticated request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::transient(format!("{context}: HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transient(format!("{context}: failed to read response: {e}")))?;

        let envelope = serde_json::from_str::<Envelope<T>>(&body);

        if !status.is_success() {
            let detail = match &envelope {
                Ok(envelope) if !envelope.errors.is_empty() => describe(&envelope.errors),
                _ => body,
            };
            return Err(status_error(status, context, &detail));
        }

        let envelope = envelope.map_err(|e| {
            Error::provider(PROVIDER, format!("{context}: failed to parse response: {e}"))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{context}: {}", describe(&envelope.errors)),
            ));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider(PROVIDER, format!("{context}: response has no result")))
    }
}

/// Zone name of a domain: its last two labels
///
/// `foo.example.org` and `example.org` both map to `example.org`.
///
/// Public suffixes with more than one label are not recognised:
/// `foo.example.co.uk` maps to `co.uk`, which matches no account zone, so
/// resolution fails with `ZoneNotFound`.
pub fn zone_name(domain: &str) -> Result<String> {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(Error::config(format!("Invalid domain name: {domain}")));
    }
    Ok(labels[labels.len() - 2..].join("."))
}

/// Map a non-success HTTP status to an error class
fn status_error(status: StatusCode, context: &str, detail: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{context}: invalid API token or insufficient permissions ({status})"
        )),
        404 => Error::not_found(format!("{context}: {detail}")),
        429 => Error::transient(format!("{context}: rate limit exceeded ({status})")),
        500..=599 => Error::transient(format!("{context}: server error {status}: {detail}")),
        _ => Error::provider(PROVIDER, format!("{context}: {status}: {detail}")),
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn resolve_zone(&self, domain: &str) -> Result<String> {
        let name = zone_name(domain)?;
        tracing::debug!("Looking up zone ID for {} (zone: {})", domain, name);

        let request = self
            .client
            .get(format!("{}/zones", self.endpoint))
            .query(&[("name", name.as_str()), ("status", "active")]);
        let zones: Vec<ZoneResult> = self.send(request, "zone lookup").await?;

        match zones.as_slice() {
            [] => Err(Error::zone_not_found(name)),
            [zone] => {
                tracing::debug!("Found zone ID: {}", zone.id);
                Ok(zone.id.clone())
            }
            many => Err(Error::AmbiguousZone {
                zone: name,
                matches: many.len(),
            }),
        }
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>> {
        let mut query = vec![("name", name)];
        if let Some(record_type) = record_type {
            query.push(("type", record_type.as_str()));
        }

        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.endpoint, zone_id))
            .query(&query);
        let records: Vec<DnsRecord> = self.send(request, "record lookup").await?;

        Ok(records
            .into_iter()
            .filter_map(DnsRecord::into_record)
            .filter(|r| record_type.is_none_or(|t| r.record_type == t))
            .collect())
    }

    async fn write_record(&self, zone_id: &str, record: &Record) -> Result<()> {
        let payload = DnsRecord::from(record);
        let base = format!("{}/zones/{}/dns_records", self.endpoint, zone_id);

        let request = match record.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => self.client.put(format!("{base}/{id}")).json(&payload),
            None => self.client.post(base).json(&payload),
        };

        let _: DnsRecord = self.send(request, "record write").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Create an update client reconciling directly against Cloudflare
///
/// # Errors
///
/// - `Error::MissingToken` if the token is empty
pub fn client(api_token: impl Into<String>, proxied: bool) -> Result<DirectClient> {
    let provider = CloudflareProvider::new(api_token)?;
    Ok(DirectClient::new(Arc::new(provider), proxied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::{Reconciler, UpdateClient};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test-token";

    fn envelope(result: serde_json::Value) -> serde_json::Value {
        json!({ "success": true, "errors": [], "messages": [], "result": result })
    }

    fn provider(server: &MockServer) -> CloudflareProvider {
        CloudflareProvider::new(TOKEN).unwrap().with_endpoint(server.uri())
    }

    async fn mount_zone(server: &MockServer, name: &str, id: &str) {
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", name))
            .and(query_param("status", "active"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope(json!([{ "id": id, "name": name, "status": "active" }]))),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(CloudflareProvider::new(""), Err(Error::MissingToken)));
        assert!(matches!(client("  ", true), Err(Error::MissingToken)));
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("secret_token_12345").unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn test_zone_name() {
        assert_eq!(zone_name("foo.example.org").unwrap(), "example.org");
        assert_eq!(zone_name("a.b.example.org").unwrap(), "example.org");
        assert_eq!(zone_name("example.org").unwrap(), "example.org");
        assert!(zone_name("localhost").is_err());
        assert!(zone_name("foo..org").is_err());
        assert_eq!(zone_name("*.example.org").unwrap(), "example.org");
        // multi-label public suffixes are cut at two labels
        assert_eq!(zone_name("foo.example.co.uk").unwrap(), "co.uk");
    }

    #[test]
    fn test_status_classes() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "x", ""),
            Error::Authentication(_)
        ));
        assert!(matches!(status_error(StatusCode::NOT_FOUND, "x", ""), Error::NotFound(_)));
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "x", "").is_retryable());
        assert!(status_error(StatusCode::BAD_GATEWAY, "x", "").is_retryable());
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "x", ""),
            Error::Provider { .. }
        ));
    }

    #[tokio::test]
    async fn test_resolve_zone() {
        let server = MockServer::start().await;
        mount_zone(&server, "example.org", "44a6dc905d4ff61b").await;

        let zone_id = provider(&server).resolve_zone("foo.example.org").await.unwrap();
        assert_eq!(zone_id, "44a6dc905d4ff61b");
    }

    #[tokio::test]
    async fn test_resolve_zone_without_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
            .mount(&server)
            .await;

        let err = provider(&server).resolve_zone("foo.example.org").await.unwrap_err();
        assert!(matches!(err, Error::ZoneNotFound(ref z) if z == "example.org"));
    }

    #[tokio::test]
    async fn test_resolve_zone_ambiguous() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
                { "id": "1", "name": "example.org" },
                { "id": "2", "name": "example.org" }
            ]))))
            .mount(&server)
            .await;

        let err = provider(&server).resolve_zone("foo.example.org").await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousZone { matches: 2, .. }));
    }

    #[tokio::test]
    async fn test_list_records_matched_by_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/44a6dc905d4ff61b/dns_records"))
            .and(query_param("name", "foo.example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
                {
                    "id": "21d167bb587e1d3e",
                    "type": "A",
                    "name": "foo.example.org",
                    "content": "100.100.100.100",
                    "proxied": true,
                    "ttl": 1
                },
                {
                    "id": "ff0012854eddab59",
                    "type": "AAAA",
                    "name": "foo.example.org",
                    "content": "fd00::dead",
                    "proxied": false,
                    "ttl": 1
                },
                {
                    "id": "0000000000000003",
                    "type": "TXT",
                    "name": "foo.example.org",
                    "content": "hello",
                    "ttl": 300
                }
            ]))))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let all = provider
            .list_records("44a6dc905d4ff61b", "foo.example.org", None)
            .await
            .unwrap();
        assert_eq!(
            all,
            [
                Record::new(RecordType::A, "foo.example.org", "100.100.100.100", true)
                    .with_id("21d167bb587e1d3e"),
                Record::new(RecordType::Aaaa, "foo.example.org", "fd00::dead", false)
                    .with_id("ff0012854eddab59"),
            ]
        );

        let aaaa = provider
            .list_records("44a6dc905d4ff61b", "foo.example.org", Some(RecordType::Aaaa))
            .await
            .unwrap();
        assert_eq!(aaaa.len(), 1);
        assert_eq!(aaaa[0].id.as_deref(), Some("ff0012854eddab59"));
    }

    #[tokio::test]
    async fn test_create_posts_without_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones/78fc43dc6a8c5e7c/dns_records"))
            .and(body_json(json!({
                "type": "A",
                "name": "bar.example.org",
                "content": "100.100.100.100",
                "proxied": true,
                "ttl": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "id": "0000000000000004",
                "type": "A",
                "name": "bar.example.org",
                "content": "100.100.100.100",
                "proxied": true,
                "ttl": 1
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let record = Record::new(RecordType::A, "bar.example.org", "100.100.100.100", true);
        assert_ok!(provider(&server).write_record("78fc43dc6a8c5e7c", &record).await);
    }

    #[tokio::test]
    async fn test_update_puts_to_record_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/78fc43dc6a8c5e7c/dns_records/21d167bb587e1d3e"))
            .and(body_json(json!({
                "type": "A",
                "name": "bar.example.org",
                "content": "100.100.100.120",
                "proxied": false,
                "ttl": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "id": "21d167bb587e1d3e",
                "type": "A",
                "name": "bar.example.org",
                "content": "100.100.100.120",
                "proxied": false,
                "ttl": 1
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let record = Record::new(RecordType::A, "bar.example.org", "100.100.100.120", false)
            .with_id("21d167bb587e1d3e");
        assert_ok!(provider(&server).write_record("78fc43dc6a8c5e7c", &record).await);
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 81057, "message": "Record already exists." }],
                "result": null
            })))
            .mount(&server)
            .await;

        let record = Record::new(RecordType::A, "bar.example.org", "100.100.100.100", true);
        let err = assert_err!(provider(&server).write_record("z", &record).await);
        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("Record already exists."));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 9109, "message": "Invalid access token" }],
                "result": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zones/z/dns_records"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = provider(&server);
        assert!(matches!(
            provider.resolve_zone("foo.example.org").await,
            Err(Error::Authentication(_))
        ));

        let err = provider.list_records("z", "foo.example.org", None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_transient() {
        let provider = CloudflareProvider::new(TOKEN)
            .unwrap()
            .with_endpoint("http://127.0.0.1:1");

        let err = provider.resolve_zone("foo.example.org").await.unwrap_err();
        assert!(err.is_retryable(), "Expected transient error, got {err:?}");
    }

    #[tokio::test]
    async fn test_direct_client_against_api() {
        let server = MockServer::start().await;
        mount_zone(&server, "example.org", "44a6dc905d4ff61b").await;
        Mock::given(method("GET"))
            .and(path("/zones/44a6dc905d4ff61b/dns_records"))
            .and(query_param("name", "foo.example.org"))
            .and(query_param("type", "A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([{
                "id": "21d167bb587e1d3e",
                "type": "A",
                "name": "foo.example.org",
                "content": "100.100.100.120",
                "proxied": false,
                "ttl": 1
            }]))))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zones/44a6dc905d4ff61b/dns_records"))
            .and(query_param("name", "foo.example.org"))
            .and(query_param("type", "AAAA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([{
                "id": "ff0012854eddab59",
                "type": "AAAA",
                "name": "foo.example.org",
                "content": "fd69::dead",
                "proxied": false,
                "ttl": 1
            }]))))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/zones/44a6dc905d4ff61b/dns_records/21d167bb587e1d3e"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "id": "21d167bb587e1d3e",
                "type": "A",
                "name": "foo.example.org",
                "content": "100.100.100.100",
                "proxied": false,
                "ttl": 1
            }))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = Arc::new(provider(&server));
        let mut client = DirectClient::new(provider.clone(), false);
        client.data_mut().set_domains(["foo.example.org"]);
        client.data_mut().set_ipv4("100.100.100.100").unwrap();
        client.data_mut().set_ipv6("fd69::dead").unwrap();

        let report = client.reconcile().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(Reconciler::new(provider).provider_name(), "cloudflare");
    }
}
