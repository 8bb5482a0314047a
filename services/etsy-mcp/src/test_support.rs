//! Fake Etsy API and token fixtures shared by the service tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Secret;
use etsy_auth::{MemoryTokenStore, OAuthClient, TokenManager, TokenRecord, now_millis};
use etsy_client::{ApiKeyInterceptor, BearerTokenInterceptor, EtsyClient};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub body: String,
}

type Routes = HashMap<(String, String), (StatusCode, String)>;

/// Serves fixed responses keyed by (method, path) under `/v3` and records
/// every request. Unknown routes get 404.
pub struct MockEtsyApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockEtsyApi {
    pub async fn start(routes: &[(&str, &str, StatusCode, &str)]) -> Self {
        let routes: Arc<Routes> = Arc::new(
            routes
                .iter()
                .map(|(m, p, s, b)| ((m.to_string(), p.to_string()), (*s, b.to_string())))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().fallback(move |request: Request<Body>| {
            let routes = routes.clone();
            let recorded = recorded.clone();
            async move {
                let method = request.method().to_string();
                let path = request.uri().path().to_string();
                let bytes = axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024)
                    .await
                    .unwrap();
                recorded.lock().unwrap().push(RecordedRequest {
                    method: method.clone(),
                    body: String::from_utf8_lossy(&bytes).to_string(),
                });
                let (status, body) = routes
                    .get(&(method, path))
                    .cloned()
                    .unwrap_or((StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.into()));
                (status, [(axum::http::header::CONTENT_TYPE, "application/json")], body)
            }
        });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/v3"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Token record valid for another hour.
pub fn fresh_record() -> TokenRecord {
    TokenRecord {
        access_token: "12345.access".into(),
        refresh_token: "12345.refresh".into(),
        expires_in: 3600,
        expires_at: Some(now_millis() + 3_600_000),
        token_type: "Bearer".into(),
    }
}

/// Token manager over an in-memory store. The token endpoint points at a
/// closed port, so any refresh attempt fails.
pub fn token_manager(record: Option<TokenRecord>) -> Arc<TokenManager> {
    let store = match record {
        Some(record) => MemoryTokenStore::with_record(record),
        None => MemoryTokenStore::new(),
    };
    let oauth = OAuthClient::new(
        reqwest::Client::new(),
        "keystring",
        "http://localhost:3000/callback",
    )
    .with_token_endpoint("http://127.0.0.1:1/v3/public/oauth/token");
    Arc::new(TokenManager::new(Arc::new(store), oauth))
}

pub fn etsy_client(base_url: &str, tokens: Arc<TokenManager>) -> Arc<EtsyClient> {
    Arc::new(
        EtsyClient::new(reqwest::Client::new(), base_url)
            .with_interceptor(Arc::new(ApiKeyInterceptor::new(Secret::new(
                "keystring".to_string(),
            ))))
            .with_interceptor(Arc::new(BearerTokenInterceptor::new(tokens))),
    )
}
