//! Browser OAuth flow: `/auth` and `/callback`
//!
//! - GET /auth     start PKCE flow, redirect to Etsy's consent page
//! - GET /callback exchange the authorization code, persist the token record
//!
//! Pending flows live in memory keyed by the CSRF `state` value and expire
//! after PKCE_EXPIRY. A restart drops them; the user just starts over.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use etsy_auth::TokenManager;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::pages;

/// Maximum age of a pending authorization before its state is rejected.
const PKCE_EXPIRY: Duration = Duration::from_secs(600);

/// In-flight authorization, created by /auth and consumed by /callback.
struct PendingAuth {
    verifier: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct AuthState {
    tokens: Arc<TokenManager>,
    pending: Arc<Mutex<HashMap<String, PendingAuth>>>,
}

impl AuthState {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self {
            tokens,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

pub fn build_auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/auth", get(start_auth))
        .route("/callback", get(callback))
        .with_state(state)
}

/// GET /auth: generate verifier, challenge and state, then redirect (303).
async fn start_auth(State(state): State<AuthState>) -> Response {
    let verifier = etsy_auth::generate_verifier();
    let challenge = etsy_auth::compute_challenge(&verifier);
    let csrf_state = etsy_auth::generate_state();

    let url = match state
        .tokens
        .oauth()
        .authorization_url(&csrf_state, &challenge)
    {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "failed to build authorization URL");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::auth_failure(&e.to_string())),
            )
                .into_response();
        }
    };

    {
        let mut pending = state.pending.lock().await;
        // Lazy cleanup while holding the lock
        let now = Instant::now();
        pending.retain(|_, p| p.expires_at > now);
        pending.insert(
            csrf_state,
            PendingAuth {
                verifier,
                expires_at: now + PKCE_EXPIRY,
            },
        );
    }

    info!("OAuth flow initiated, redirecting to Etsy");
    Redirect::to(&url).into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by Etsy when the user denies access
    error: Option<String>,
    error_description: Option<String>,
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Html(pages::auth_failure(message))).into_response()
}

/// GET /callback: validate state, exchange the code, persist the tokens.
async fn callback(
    State(state): State<AuthState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(err) = params.error {
        let description = params.error_description.unwrap_or_default();
        warn!(error = %err, description = %description, "Etsy returned an authorization error");
        return failure(
            StatusCode::BAD_REQUEST,
            &format!("Etsy denied the authorization: {err} {description}"),
        );
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "Invalid authorization code");
    };

    let pending = match params.state {
        Some(csrf_state) => state.pending.lock().await.remove(&csrf_state),
        None => None,
    };
    let Some(pending) = pending else {
        warn!("callback with unknown or missing state");
        return failure(
            StatusCode::BAD_REQUEST,
            "Unknown or missing state; start again from /auth",
        );
    };
    if Instant::now() >= pending.expires_at {
        return failure(
            StatusCode::BAD_REQUEST,
            "Authorization expired (>10 minutes); start again from /auth",
        );
    }

    let record = match state
        .tokens
        .oauth()
        .exchange_code(&code, &pending.verifier)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "authorization code exchange failed");
            return failure(
                StatusCode::BAD_GATEWAY,
                &format!("token exchange failed: {e}"),
            );
        }
    };

    if let Err(e) = state.tokens.persist(record).await {
        error!(error = %e, "failed to persist token record");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("failed to save tokens: {e}"),
        );
    }

    info!("OAuth flow completed, tokens saved");
    (StatusCode::OK, Html(pages::auth_success())).into_response()
}
