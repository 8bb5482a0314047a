//! Etsy Open API v3 client
//!
//! `EtsyClient` sends JSON requests to the Etsy API. Authentication is not
//! hard-wired: each request passes through the registered
//! `RequestInterceptor`s, which add the `x-api-key` header and the OAuth
//! bearer token. Non-2xx responses are classified (rate limit, auth, client,
//! server) and logged at the point of failure.

pub mod client;
pub mod error;
pub mod interceptors;
pub mod models;

pub use client::{DEFAULT_API_BASE_URL, EtsyClient};
pub use error::{Error, ErrorClassification, Result, classify_status};
pub use interceptors::{ApiKeyInterceptor, BearerTokenInterceptor};

use std::future::Future;
use std::pin::Pin;

/// Hook run on every outgoing request before it is sent.
///
/// Interceptors run in registration order and may add or replace headers.
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn RequestInterceptor>`).
pub trait RequestInterceptor: Send + Sync {
    /// Identifier for logging (e.g. "api-key", "bearer-token")
    fn id(&self) -> &str;

    fn prepare_request<'a>(
        &'a self,
        headers: &'a mut reqwest::header::HeaderMap,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
