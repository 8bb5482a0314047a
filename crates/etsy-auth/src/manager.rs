//! Token lifecycle manager
//!
//! Serves an access token that stays valid for at least
//! `EXPIRY_BUFFER_MILLIS`, refreshing it on read when it is close to expiry.
//! There is no background timer: every request path goes through
//! `get_valid_access_token`, so the check happens exactly where it matters.
//!
//! Read failures are absorbed and logged: callers only learn whether they got
//! a usable token. Write failures from `persist` propagate, since losing a
//! freshly issued token would strand the user.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::constants::EXPIRY_BUFFER_MILLIS;
use crate::error::Result;
use crate::store::TokenStore;
use crate::token::{OAuthClient, TokenRecord};

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Whether a token expiring at `expires_at` must be refreshed at `now`.
///
/// A token exactly at the buffer boundary counts as expiring. A record with
/// no expiry is treated as already expired.
pub fn needs_refresh(expires_at: Option<u64>, now: u64) -> bool {
    let expires_at = expires_at.unwrap_or(0);
    expires_at.saturating_sub(EXPIRY_BUFFER_MILLIS) <= now
}

/// Owns the stored token pair and hands out valid access tokens.
///
/// Constructed once at startup and shared by `Arc` with the request layer.
/// The refresh path is serialized by `refresh_lock`; a caller that waited
/// on it re-reads the store and reuses the token the previous holder minted.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    oauth: OAuthClient,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, oauth: OAuthClient) -> Self {
        Self {
            store,
            oauth,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// A token valid for at least the expiry buffer, or `None`.
    ///
    /// `None` covers "never authenticated", "refresh failed" and "store
    /// unreadable" alike; each case is logged where it happens.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("no stored token");
                return None;
            }
            Err(e) => {
                error!(error = %e, "failed to read stored token");
                return None;
            }
        };

        if !needs_refresh(record.expires_at, now_millis()) {
            return Some(record.access_token);
        }

        info!(
            expires_at = record.expires_at.unwrap_or(0),
            "token expired or about to expire, refreshing"
        );
        self.refresh().await
    }

    /// Convenience predicate over `get_valid_access_token`. May trigger a refresh.
    pub async fn has_valid_token(&self) -> bool {
        self.get_valid_access_token().await.is_some()
    }

    /// Fill in `expires_at` if absent and replace the stored record.
    ///
    /// Returns the record as written.
    pub async fn persist(&self, record: TokenRecord) -> Result<TokenRecord> {
        let record = record.with_computed_expiry(now_millis());
        if let Err(e) = self.store.save(&record).await {
            error!(error = %e, "failed to persist token");
            return Err(e);
        }
        debug!(expires_at = record.expires_at.unwrap_or(0), "token persisted");
        Ok(record)
    }

    /// Stored record as-is, without any expiry check or refresh.
    pub async fn current_record(&self) -> Result<Option<TokenRecord>> {
        self.store.load().await
    }

    async fn refresh(&self) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;

        // Re-read under the lock: an earlier holder may already have refreshed.
        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("token disappeared before refresh");
                return None;
            }
            Err(e) => {
                error!(error = %e, "failed to read stored token before refresh");
                return None;
            }
        };
        if !needs_refresh(record.expires_at, now_millis()) {
            debug!("token already refreshed by a concurrent caller");
            return Some(record.access_token);
        }

        let fresh = match self.oauth.refresh_token(&record.refresh_token).await {
            Ok(fresh) => fresh,
            Err(e) => {
                metrics::counter!("etsy_token_refresh_total", "outcome" => "failed").increment(1);
                warn!(error = %e, "token refresh failed, re-run the authorization flow");
                return None;
            }
        };

        match self.persist(fresh).await {
            Ok(saved) => {
                metrics::counter!("etsy_token_refresh_total", "outcome" => "success")
                    .increment(1);
                info!("token refresh succeeded");
                Some(saved.access_token)
            }
            Err(_) => {
                metrics::counter!("etsy_token_refresh_total", "outcome" => "failed").increment(1);
                None
            }
        }
    }
}
