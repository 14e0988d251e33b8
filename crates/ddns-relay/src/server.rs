//! Relay server
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!
//! ## `/` (GET)
//!
//!   Expects the query string of [`UpdateQuery`]:
//!
//!   ```text
//!   /?token=<secret>&domains=foo.example.org&ipv4=100.100.100.100&ipv6=fd69::dead&proxy=true
//!   ```
//!
//!   The server checks the shared secret (when configured), decodes the
//!   address state, checks every domain against the allow-list and runs one
//!   reconciliation pass with its own provider credential. Passes from
//!   concurrent requests are serialized.
//!
//!   Answers `{"success": bool, "msg": string}` with:
//!   - 200 on success
//!   - 400 for invalid input (no domains, no address, bad address)
//!   - 401 for a wrong or missing secret
//!   - 403 for a domain outside the allow-list
//!   - 502 when the provider pass fails
//!   - 504 when the pass outlives the request; it keeps running to completion
//!
//! A pass runs on its own task, so neither a timeout nor a disconnecting
//! caller cancels a provider call in flight.

use crate::wire::{UpdateQuery, UpdateResponse};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use ddns_core::{Error, Reconciler, Result};
use ddns_metrics::{Metrics, track_requests};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// How long a request waits for its pass before answering 504
pub const PASS_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared state of the relay server
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
    metrics: Option<Metrics>,
    pass_timeout: Duration,
}

struct Shared {
    /// Locked for the whole pass
    reconciler: Mutex<Reconciler>,
    secret: Option<String>,
    allowed: Vec<String>,
}

impl AppState {
    /// Serve passes with `reconciler`, accepting any caller and any domain
    pub fn new(reconciler: Reconciler) -> Self {
        Self::with_policy(reconciler, None, Vec::new())
    }

    /// Serve passes with `reconciler`, restricted by `secret` and `allowed`
    ///
    /// An empty `allowed` list permits every domain.
    pub fn with_policy(reconciler: Reconciler, secret: Option<String>, allowed: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Shared {
                reconciler: Mutex::new(reconciler),
                secret,
                allowed,
            }),
            metrics: None,
            pass_timeout: PASS_TIMEOUT,
        }
    }

    /// Count requests in `metrics`
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace how long a request waits for its pass
    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Whether callers may update `domain`
    ///
    /// A domain is allowed if it equals an allow-list entry or is a
    /// subdomain of one.
    pub fn is_allowed(&self, domain: &str) -> bool {
        let allowed = &self.inner.allowed;
        allowed.is_empty()
            || allowed.iter().any(|entry| {
                domain.eq_ignore_ascii_case(entry)
                    || domain
                        .to_ascii_lowercase()
                        .ends_with(&format!(".{}", entry.to_ascii_lowercase()))
            })
    }

    fn authorize(&self, token: Option<&str>) -> std::result::Result<(), ApiError> {
        match &self.inner.secret {
            Some(secret) if token != Some(secret.as_str()) => Err(ApiError::Unauthorized),
            _ => Ok(()),
        }
    }
}

/// Failure of an update request
#[derive(Debug)]
pub enum ApiError {
    /// Missing or wrong shared secret
    Unauthorized,
    /// Domain outside the allow-list
    Forbidden(String),
    /// Input rejected before any provider call
    BadRequest(Error),
    /// The provider pass failed
    Upstream(Error),
    /// The pass did not finish within the pass timeout
    Timeout,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_invalid_data() {
            Self::BadRequest(err)
        } else {
            Self::Upstream(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid token".to_string()),
            ApiError::Forbidden(domain) => (
                StatusCode::FORBIDDEN,
                format!("domain {domain} is not allowed"),
            ),
            ApiError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Upstream(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "update still in progress".to_string(),
            ),
        };
        (status, Json(UpdateResponse::failed(msg))).into_response()
    }
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(update))
        .route("/healthcheck", get(health_check));
    if let Some(metrics) = state.metrics.clone() {
        router = router.layer(middleware::from_fn_with_state(metrics, track_requests));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve relay requests on `listener` until `shutdown` completes
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Relay server listening on {}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Relay server stopped");
    Ok(())
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

async fn update(
    State(state): State<AppState>,
    Query(query): Query<UpdateQuery>,
) -> std::result::Result<Json<UpdateResponse>, ApiError> {
    state.authorize(query.token.as_deref())?;

    let data = query.to_state()?;
    if let Some(denied) = data.domains().iter().find(|d| !state.is_allowed(d)) {
        tracing::debug!("rejected update for \"{denied}\"");
        return Err(ApiError::Forbidden(denied.clone()));
    }

    let domains = data.domains().join(",");
    let shared = Arc::clone(&state.inner);
    let pass = tokio::spawn(async move {
        let reconciler = shared.reconciler.lock().await;
        reconciler.reconcile(&data).await
    });

    let report = match tokio::time::timeout(state.pass_timeout, pass).await {
        Ok(Ok(report)) => report,
        Ok(Err(join)) => {
            return Err(ApiError::Upstream(Error::Other(format!(
                "update pass aborted: {join}"
            ))));
        }
        Err(_) => {
            tracing::warn!("update for {} still running after {:?}", domains, state.pass_timeout);
            return Err(ApiError::Timeout);
        }
    };

    match report {
        Ok(report) => {
            tracing::info!(
                "accepted update for {} ({} created, {} updated)",
                domains,
                report.created,
                report.updated
            );
            Ok(Json(UpdateResponse::ok(format!(
                "Updated {} record(s), {} already up to date",
                report.writes(),
                report.unchanged
            ))))
        }
        Err(err) => {
            tracing::warn!("update for {} failed: {}", domains, err);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::MemoryProvider;

    fn state(allowed: &[&str]) -> AppState {
        AppState::with_policy(
            Reconciler::new(Arc::new(MemoryProvider::new())),
            Some("relay-secret".to_string()),
            allowed.iter().map(|d| d.to_string()).collect(),
        )
    }

    #[test]
    fn test_allow_list() {
        let state = state(&["example.org"]);
        assert!(state.is_allowed("example.org"));
        assert!(state.is_allowed("foo.example.org"));
        assert!(state.is_allowed("FOO.Example.org"));
        assert!(!state.is_allowed("notexample.org"));
        assert!(!state.is_allowed("example.net"));
    }

    #[test]
    fn test_empty_allow_list_permits_all() {
        assert!(state(&[]).is_allowed("anything.example.net"));
    }

    #[test]
    fn test_authorize() {
        let state = state(&[]);
        assert!(state.authorize(Some("relay-secret")).is_ok());
        assert!(matches!(state.authorize(None), Err(ApiError::Unauthorized)));
        assert!(matches!(state.authorize(Some("guess")), Err(ApiError::Unauthorized)));

        let open = AppState::new(Reconciler::new(Arc::new(MemoryProvider::new())));
        assert!(open.authorize(None).is_ok());
    }

    #[test]
    fn test_error_status() {
        let status = |err: ApiError| err.into_response().status();
        assert_eq!(status(Error::NoDomains.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::zone_not_found("example.org").into()), StatusCode::BAD_GATEWAY);
        assert_eq!(status(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ApiError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(ApiError::Timeout), StatusCode::GATEWAY_TIMEOUT);
    }
}
