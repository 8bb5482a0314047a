//! Built-in request interceptors: Etsy app key and OAuth bearer token.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::Secret;
use etsy_auth::TokenManager;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::RequestInterceptor;
use crate::error::{Error, Result};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Sets `x-api-key` to the app keystring. Etsy requires it on every v3 call,
/// authenticated or not.
pub struct ApiKeyInterceptor {
    api_key: Secret<String>,
}

impl ApiKeyInterceptor {
    pub fn new(api_key: Secret<String>) -> Self {
        Self { api_key }
    }
}

impl RequestInterceptor for ApiKeyInterceptor {
    fn id(&self) -> &str {
        "api-key"
    }

    fn prepare_request<'a>(
        &'a self,
        headers: &'a mut HeaderMap,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut value = HeaderValue::from_str(self.api_key.expose())
                .map_err(|e| Error::InvalidRequest(format!("invalid api key value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
            Ok(())
        })
    }
}

/// Attaches `Authorization: Bearer <token>` from the token manager.
///
/// When the manager has no usable token the request goes out without one;
/// Etsy's 401 is then classified and reported by the client.
pub struct BearerTokenInterceptor {
    tokens: Arc<TokenManager>,
}

impl BearerTokenInterceptor {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }
}

impl RequestInterceptor for BearerTokenInterceptor {
    fn id(&self) -> &str {
        "bearer-token"
    }

    fn prepare_request<'a>(
        &'a self,
        headers: &'a mut HeaderMap,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let Some(token) = self.tokens.get_valid_access_token().await else {
                debug!("no valid access token, sending request unauthenticated");
                return Ok(());
            };
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::InvalidRequest(format!("invalid token value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etsy_auth::{MemoryTokenStore, OAuthClient, TokenRecord, now_millis};

    fn token_manager(record: Option<TokenRecord>) -> Arc<TokenManager> {
        let store = match record {
            Some(r) => MemoryTokenStore::with_record(r),
            None => MemoryTokenStore::new(),
        };
        let oauth = OAuthClient::new(reqwest::Client::new(), "keystring", "http://localhost/cb")
            .with_token_endpoint("http://127.0.0.1:1/token");
        Arc::new(TokenManager::new(Arc::new(store), oauth))
    }

    fn valid_record() -> TokenRecord {
        TokenRecord {
            access_token: "12345.at".into(),
            refresh_token: "12345.rt".into(),
            expires_in: 3600,
            expires_at: Some(now_millis() + 3_600_000),
            token_type: "Bearer".into(),
        }
    }

    #[tokio::test]
    async fn api_key_is_injected() {
        let interceptor = ApiKeyInterceptor::new(Secret::new("keystring".to_string()));
        let mut headers = HeaderMap::new();
        interceptor.prepare_request(&mut headers).await.unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "keystring");
        assert!(headers.get("x-api-key").unwrap().is_sensitive());
    }

    #[tokio::test]
    async fn api_key_replaces_existing_value() {
        let interceptor = ApiKeyInterceptor::new(Secret::new("keystring".to_string()));
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("stale"));
        interceptor.prepare_request(&mut headers).await.unwrap();
        assert_eq!(headers.get_all("x-api-key").iter().count(), 1);
        assert_eq!(headers.get("x-api-key").unwrap(), "keystring");
    }

    #[tokio::test]
    async fn api_key_with_control_chars_is_rejected() {
        let interceptor = ApiKeyInterceptor::new(Secret::new("bad\nkey".to_string()));
        let mut headers = HeaderMap::new();
        let err = interceptor.prepare_request(&mut headers).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn bearer_token_is_injected_when_available() {
        let interceptor = BearerTokenInterceptor::new(token_manager(Some(valid_record())));
        let mut headers = HeaderMap::new();
        interceptor.prepare_request(&mut headers).await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer 12345.at");
    }

    #[tokio::test]
    async fn missing_token_leaves_request_unauthenticated() {
        let interceptor = BearerTokenInterceptor::new(token_manager(None));
        let mut headers = HeaderMap::new();
        interceptor.prepare_request(&mut headers).await.unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(
            ApiKeyInterceptor::new(Secret::new(String::new())).id(),
            "api-key"
        );
        assert_eq!(
            BearerTokenInterceptor::new(token_manager(None)).id(),
            "bearer-token"
        );
    }
}
