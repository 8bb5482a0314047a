//! Token record shape and the two token endpoint interactions
//!
//! 1. Authorization code exchange (completes the browser OAuth flow)
//! 2. Refresh (called by the manager when the stored token is near expiry)
//!
//! Both POST form-encoded bodies to the same endpoint and get the same JSON
//! shape back, so they share one request path.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{AUTHORIZE_ENDPOINT, DEFAULT_SCOPES, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// The persisted token pair, also the JSON body the token endpoint returns.
///
/// `expires_in` is the lifetime in seconds declared at issuance. `expires_at`
/// is absolute unix milliseconds; the token endpoint never sends it, the
/// manager fills it in when persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenRecord {
    /// Fill `expires_at` from `expires_in` if it is missing.
    pub fn with_computed_expiry(mut self, now_millis: u64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(
                self.expires_in
                    .saturating_mul(1000)
                    .saturating_add(now_millis),
            );
        }
        self
    }
}

/// Etsy OAuth client: builds authorization URLs and talks to the token endpoint.
///
/// Endpoints default to Etsy's production URLs and can be overridden, which is
/// how tests point it at a local mock.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    redirect_uri: String,
    scopes: String,
    token_endpoint: String,
    authorize_endpoint: String,
}

impl OAuthClient {
    pub fn new(
        http: reqwest::Client,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
        }
    }

    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    pub fn with_authorize_endpoint(mut self, url: impl Into<String>) -> Self {
        self.authorize_endpoint = url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Full authorization URL the user's browser is sent to.
    ///
    /// Etsy echoes `state` back on the callback, which is how the callback
    /// finds the matching PKCE verifier.
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &self.authorize_endpoint,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scopes.as_str()),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| Error::Http(format!("invalid authorize endpoint: {e}")))?;
        Ok(url.into())
    }

    /// Exchange an authorization code (plus the PKCE verifier) for tokens.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenRecord> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
                ("code_verifier", code_verifier),
            ],
            "token exchange",
        )
        .await
    }

    /// Mint a new token pair from a refresh token.
    pub async fn refresh_token(&self, refresh: &str) -> Result<TokenRecord> {
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh),
            ],
            "token refresh",
        )
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)], operation: &str) -> Result<TokenRecord> {
        debug!(endpoint = %self.token_endpoint, operation, "calling token endpoint");

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{operation} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the code or refresh token was revoked or is invalid
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::InvalidCredentials(format!(
                    "{operation} rejected ({status}): {body}"
                )));
            }

            return Err(Error::TokenExchange(format!(
                "{operation} returned {status}: {body}"
            )));
        }

        response
            .json::<TokenRecord>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid {operation} response: {e}")))
    }
}
