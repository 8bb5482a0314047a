//! Etsy MCP Server
//!
//! Single-binary Rust service that:
//! 1. Runs the Etsy OAuth (PKCE) flow in the browser via /auth and /callback
//! 2. Keeps the token record on disk and refreshes it on demand
//! 3. Exposes Etsy listing, shop and taxonomy tools over MCP at /mcp
//!
//! `etsy-mcp-server find-shop-id` prints the shop ID of the authenticated
//! account instead of starting the server.

mod auth_routes;
mod config;
mod error;
mod metrics;
mod pages;
mod shop;
mod tools;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use etsy_auth::{FileTokenStore, OAuthClient, TokenManager};
use etsy_client::{ApiKeyInterceptor, BearerTokenInterceptor, EtsyClient};
use metrics_exporter_prometheus::PrometheusHandle;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth_routes::AuthState;
use crate::config::Config;
use crate::tools::EtsyMcpServer;

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    tokens: Arc<TokenManager>,
    prometheus: PrometheusHandle,
    started_at: Instant,
    /// Public MCP endpoint URL shown on /docs
    mcp_url: String,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit covers every route, MCP included.
fn build_router(
    state: AppState,
    auth: AuthState,
    mcp: StreamableHttpService<EtsyMcpServer, LocalSessionManager>,
    max_connections: usize,
) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/docs", get(docs_handler))
        .route("/mcp/schema", get(schema_handler))
        .route("/metrics", get(metrics_handler))
        .route_service("/mcp", mcp)
        .with_state(state)
        .merge(auth_routes::build_auth_router(auth))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

/// Split argv into an optional subcommand and an optional `--config` value.
fn parse_args(args: &[String]) -> (Option<&str>, Option<&str>) {
    let mut command = None;
    let mut config_path = None;
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            config_path = iter.next().map(String::as_str);
        } else if command.is_none() && !arg.starts_with("--") {
            command = Some(arg.as_str());
        }
    }
    (command, config_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so find-shop-id output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (command, cli_config_path) = parse_args(&args);

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        api_base_url = %config.etsy.api_base_url,
        redirect_uri = %config.etsy.redirect_uri,
        token_file = %config.etsy.token_file.display(),
        shop_id_set = config.etsy.shop_id.is_some(),
        "configuration loaded"
    );

    let api_key = config
        .etsy
        .api_key
        .clone()
        .context("Etsy API key missing from configuration")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let oauth = OAuthClient::new(
        http.clone(),
        config.client_id(),
        config.etsy.redirect_uri.clone(),
    )
    .with_scopes(config.etsy.scopes.clone());
    let store = FileTokenStore::new(config.etsy.token_file.clone());
    let tokens = Arc::new(TokenManager::new(Arc::new(store), oauth));

    let client = Arc::new(
        EtsyClient::new(http, config.etsy.api_base_url.clone())
            .with_interceptor(Arc::new(ApiKeyInterceptor::new(api_key)))
            .with_interceptor(Arc::new(BearerTokenInterceptor::new(tokens.clone()))),
    );

    match command {
        Some("find-shop-id") => return find_shop_id(&tokens, &client).await,
        Some(other) => anyhow::bail!("unknown command: {other} (available: find-shop-id)"),
        None => {}
    }

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder().context("failed to install Prometheus recorder")?;

    if config.etsy.shop_id.is_none() {
        warn!("ETSY_SHOP_ID not set; shop-scoped tools will fail until it is configured");
    }

    let listen_addr = config.server.listen_addr;
    let ct = CancellationToken::new();
    let state = AppState {
        tokens: tokens.clone(),
        prometheus,
        started_at: Instant::now(),
        mcp_url: format!("http://{listen_addr}/mcp"),
    };
    let mcp = tools::mcp_service(client, config.etsy.shop_id.clone(), ct.child_token());
    let app = build_router(
        state,
        AuthState::new(tokens.clone()),
        mcp,
        config.server.max_connections,
    );

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(
        addr = %listen_addr,
        authenticated = tokens.has_valid_token().await,
        "accepting requests; visit /auth to authenticate with Etsy"
    );

    // Drain timeout starts at signal receipt, not at server start
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    // Close open MCP streams, then let axum drain
    ct.cancel();
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn find_shop_id(tokens: &TokenManager, client: &EtsyClient) -> Result<()> {
    let shops = shop::find_shops(tokens, client)
        .await
        .context("failed to find shop ID")?;
    print!("{}", shop::render_shops(&shops));
    Ok(())
}

/// Status page with authentication state and links.
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(pages::index(state.tokens.has_valid_token().await))
}

/// Health endpoint: process is up; `authenticated` reports the token state.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let authenticated = state.tokens.has_valid_token().await;
    // Read after the validity check so a refresh that just happened is reflected
    let token_expires_at = match state.tokens.current_record().await {
        Ok(record) => record.and_then(|r| r.expires_at),
        Err(e) => {
            warn!(error = %e, "failed to read token record for health check");
            None
        }
    };
    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "authenticated": authenticated,
        "token_expires_at": token_expires_at,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn docs_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(pages::docs(&EtsyMcpServer::tool_definitions(), &state.mcp_url))
}

/// Tool names and descriptions, taken from the registered tool router.
async fn schema_handler() -> impl IntoResponse {
    let tools: Vec<serde_json::Value> = EtsyMcpServer::tool_definitions()
        .iter()
        .map(|tool| {
            serde_json::json!({
                "name": tool.name,
                "description": tool.description,
            })
        })
        .collect();

    axum::Json(serde_json::json!({
        "name": tools::SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "tools": tools,
    }))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
