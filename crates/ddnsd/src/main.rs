// # ddnsd - DDNS Daemon
//
// This daemon is a THIN integration layer: it reads configuration, sets up
// logging and wires the library crates together. All reconciliation logic
// lives in ddns-core.
//
// ## Modes
//
// - `client`: Reconcile directly against Cloudflare on a fixed interval
// - `relay`: Send the address state to a relay server on a fixed interval
// - `server`: Accept relay requests and reconcile with the server's token
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### General
// - `DDNS_MODE`: client, relay or server (default: client)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
// - `DDNS_METRICS_ENABLED`: Serve Prometheus metrics on `/metrics` (default: false)
// - `DDNS_METRICS_PORT`: Port of the metrics endpoint (default: 9090)
//
// ### Client / Relay
// - `DDNS_PROVIDER_API_TOKEN`: Cloudflare API token (client mode)
// - `DDNS_RECORDS`: Comma-separated list of domains to manage
// - `DDNS_PROXIED`: Proxy records through Cloudflare (default: true)
// - `DDNS_INTERVAL_SECS`: Seconds between passes, at least 30 (default: 300)
// - `DDNS_IPV4` / `DDNS_IPV6`: Track the family (default: true / false)
// - `DDNS_IP_SOURCE_V4_URL` / `DDNS_IP_SOURCE_V6_URL`: Lookup service overrides
// - `DDNS_RELAY_ENDPOINT`: Relay server URL (relay mode)
// - `DDNS_RELAY_SECRET`: Shared secret presented to the relay server
//
// ### Server
// - `DDNS_PROVIDER_API_TOKEN`: Cloudflare API token
// - `DDNS_SERVER_BIND`: Listen address (default: 0.0.0.0:8080)
// - `DDNS_SERVER_DOMAINS`: Comma-separated allow-list (default: any)
// - `DDNS_RELAY_SECRET`: Secret callers must present
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER_API_TOKEN=your_token
// export DDNS_RECORDS=example.com,www.example.com
// export DDNS_IPV6=true
//
// ddnsd
// ```

use anyhow::{Context, Result};
use ddns_core::config::{ClientConfig, MetricsConfig, Mode, ServerConfig};
use ddns_core::{Reconciler, Runner, UpdateClient};
use ddns_ip_http::{DEFAULT_IPV4_URL, DEFAULT_IPV6_URL, HttpIpSource};
use ddns_metrics::Metrics;
use ddns_provider_cloudflare::CloudflareProvider;
use ddns_relay::{AppState, RelayClient};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    mode: Mode,
    client: ClientConfig,
    server: ServerConfig,
    metrics: MetricsConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mode = match env_opt("DDNS_MODE") {
            Some(mode) => mode.parse()?,
            None => Mode::default(),
        };

        let token = env_opt("DDNS_PROVIDER_API_TOKEN");
        let secret = env_opt("DDNS_RELAY_SECRET");
        let defaults = ClientConfig::default();

        let client = ClientConfig {
            token: token.clone(),
            proxied: env_bool("DDNS_PROXIED", defaults.proxied)?,
            domains: env_list("DDNS_RECORDS"),
            interval_secs: match env_opt("DDNS_INTERVAL_SECS") {
                Some(secs) => secs
                    .parse()
                    .with_context(|| format!("DDNS_INTERVAL_SECS is not a number: {secs}"))?,
                None => defaults.interval_secs,
            },
            ipv4: env_bool("DDNS_IPV4", defaults.ipv4)?,
            ipv6: env_bool("DDNS_IPV6", defaults.ipv6)?,
            ipv4_url: env_opt("DDNS_IP_SOURCE_V4_URL"),
            ipv6_url: env_opt("DDNS_IP_SOURCE_V6_URL"),
            endpoint: env_opt("DDNS_RELAY_ENDPOINT"),
            secret: secret.clone(),
        };

        let mut server = ServerConfig {
            token: token.unwrap_or_default(),
            domains: env_list("DDNS_SERVER_DOMAINS"),
            secret,
            ..ServerConfig::default()
        };
        if let Some(bind) = env_opt("DDNS_SERVER_BIND") {
            server.bind = bind
                .parse()
                .with_context(|| format!("DDNS_SERVER_BIND is not a socket address: {bind}"))?;
        }

        let mut metrics = MetricsConfig {
            enabled: env_bool("DDNS_METRICS_ENABLED", false)?,
            ..MetricsConfig::default()
        };
        if let Some(port) = env_opt("DDNS_METRICS_PORT") {
            metrics.port = port
                .parse()
                .with_context(|| format!("DDNS_METRICS_PORT is not a port: {port}"))?;
        }

        Ok(Self {
            mode,
            client,
            server,
            metrics,
            log_level: env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration for the selected mode
    fn validate(&self) -> Result<()> {
        match self.mode {
            Mode::Client | Mode::Relay => self.client.validate(self.mode)?,
            Mode::Server => self.server.validate()?,
        }

        self.metrics.validate()?;
        if self.mode == Mode::Server
            && self.metrics.enabled
            && self.metrics.port == self.server.bind.port()
        {
            anyhow::bail!(
                "DDNS_METRICS_PORT {} collides with the server port",
                self.metrics.port
            );
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Non-empty value of an environment variable
fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match env_opt(name).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{name} must be true or false. Got: {v}"),
        },
    }
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon in {} mode", config.mode);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon in the configured mode
async fn run_daemon(config: Config) -> Result<()> {
    let (metrics, metrics_task) = if config.metrics.enabled {
        let (metrics, task) = start_metrics(&config.metrics).await?;
        (Some(metrics), Some(task))
    } else {
        (None, None)
    };

    let result = run_mode(config, metrics).await;

    if let Some(task) = metrics_task {
        task.abort();
    }
    result
}

/// Bind the metrics endpoint and serve it in the background
async fn start_metrics(
    config: &MetricsConfig,
) -> Result<(Metrics, JoinHandle<ddns_core::Result<()>>)> {
    let metrics = Metrics::new()?;
    let listener = TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("Failed to bind metrics endpoint {}", config.addr()))?;
    let task = tokio::spawn(ddns_metrics::serve(
        listener,
        metrics.clone(),
        std::future::pending(),
    ));
    Ok((metrics, task))
}

async fn run_mode(config: Config, metrics: Option<Metrics>) -> Result<()> {
    match config.mode {
        Mode::Client => {
            let token = config.client.token.clone().unwrap_or_default();
            let mut client = ddns_provider_cloudflare::client(token, config.client.proxied)?;
            if let Some(metrics) = metrics {
                client = client.with_observer(Arc::new(metrics));
            }
            run_client(Box::new(client), &config.client).await
        }
        Mode::Relay => {
            if metrics.is_some() {
                warn!("Record changes are counted by the relay server, not in relay mode");
            }
            let endpoint = config.client.endpoint.clone().unwrap_or_default();
            let mut client = RelayClient::new(endpoint, config.client.proxied)?;
            if let Some(secret) = &config.client.secret {
                client = client.with_secret(secret.clone());
            }
            info!("Relaying updates through {}", client.endpoint());
            run_client(Box::new(client), &config.client).await
        }
        Mode::Server => run_server(config.server, metrics).await,
    }
}

/// Drive an update client until a shutdown signal arrives
async fn run_client(mut client: Box<dyn UpdateClient>, config: &ClientConfig) -> Result<()> {
    client.data_mut().set_domains(&config.domains);
    for domain in client.data().domains() {
        info!("Managing record: {}", domain);
    }

    let source = HttpIpSource::new(
        config.ipv4_url.as_deref().unwrap_or(DEFAULT_IPV4_URL),
        config.ipv6_url.as_deref().unwrap_or(DEFAULT_IPV6_URL),
    );

    Runner::new(client, config.interval())
        .with_ip_source(Box::new(source), &config.versions())
        .run_until(shutdown_signal())
        .await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Serve relay requests until a shutdown signal arrives
async fn run_server(config: ServerConfig, metrics: Option<Metrics>) -> Result<()> {
    let provider = CloudflareProvider::new(config.token)?;
    if config.domains.is_empty() {
        info!("No allow-list configured, accepting every domain");
    }

    let mut reconciler = Reconciler::new(Arc::new(provider));
    if let Some(metrics) = &metrics {
        reconciler = reconciler.with_observer(Arc::new(metrics.clone()));
    }
    let mut state = AppState::with_policy(reconciler, config.secret, config.domains);
    if let Some(metrics) = metrics {
        state = state.with_metrics(metrics);
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    ddns_relay::serve(listener, state, shutdown_signal()).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Resolve once SIGTERM or SIGINT is received
async fn shutdown_signal() {
    match wait_for_shutdown().await {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => {
            error!("Shutdown error: {:#}", e);
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received, or an error if the handlers
/// could not be installed.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
