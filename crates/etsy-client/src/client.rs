//! Etsy v3 HTTP client
//!
//! All requests go through `send`: build URL, run interceptors, dispatch,
//! classify failures. Endpoint helpers below are thin wrappers that only fix
//! the path and the response type.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::RequestInterceptor;
use crate::error::{Error, ErrorClassification, Result, classify_status};
use crate::models::{DraftListing, Listing, ListingImage, ListingImageResponse, Paginated, Shop};

pub const DEFAULT_API_BASE_URL: &str = "https://openapi.etsy.com/v3";

pub struct EtsyClient {
    http: reqwest::Client,
    base_url: String,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl EtsyClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            interceptors: Vec::new(),
        }
    }

    /// Register an interceptor. Interceptors run in the order they were added.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, &[], None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for interceptor in &self.interceptors {
            if let Err(e) = interceptor.prepare_request(&mut headers).await {
                error!(interceptor = interceptor.id(), error = %e, "request interceptor failed");
                return Err(e);
            }
        }

        let mut request = self.http.request(method.clone(), &url).headers(headers);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, path, "sending Etsy API request");
        let response = request.send().await.map_err(|e| {
            error!(%method, path, error = %e, "no response received from Etsy API");
            record_request(&method, "error");
            Error::Http(e.to_string())
        })?;

        let status = response.status();
        record_request(&method, status.as_str());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            let classification = classify_status(status.as_u16());
            match classification {
                ErrorClassification::RateLimited => {
                    warn!(path, "Etsy rate limit exceeded, try again later")
                }
                ErrorClassification::Unauthorized => {
                    warn!(path, "Etsy rejected credentials, token may be invalid or expired")
                }
                ErrorClassification::Client | ErrorClassification::Server => {}
            }
            error!(%method, path, status = status.as_u16(), body = %body, "Etsy API error");
            return Err(Error::Api {
                status: status.as_u16(),
                classification,
                body,
            });
        }

        response.json::<T>().await.map_err(|e| {
            error!(%method, path, error = %e, "failed to decode Etsy API response");
            Error::Decode(e.to_string())
        })
    }

    // --- Shops ---

    pub async fn find_shop_by_name(&self, shop_name: &str) -> Result<Paginated<Shop>> {
        self.get("/application/shops", &[("shop_name", shop_name)])
            .await
    }

    pub async fn get_shop(&self, shop_id: &str) -> Result<Shop> {
        self.get(&format!("/application/shops/{shop_id}"), &[]).await
    }

    /// Shops owned by the authenticated user.
    pub async fn get_my_shops(&self) -> Result<Paginated<Shop>> {
        self.get("/application/users/me/shops", &[]).await
    }

    // --- Listings ---

    pub async fn create_draft_listing(&self, shop_id: &str, listing: &DraftListing) -> Result<Listing> {
        self.post(&format!("/application/shops/{shop_id}/listings"), listing)
            .await
    }

    pub async fn upload_listing_image(
        &self,
        shop_id: &str,
        listing_id: u64,
        image: &ListingImage,
    ) -> Result<ListingImageResponse> {
        self.post(
            &format!("/application/shops/{shop_id}/listings/{listing_id}/images"),
            image,
        )
        .await
    }

    /// Partial update; `changes` holds only the fields to modify.
    pub async fn update_listing(
        &self,
        shop_id: &str,
        listing_id: u64,
        changes: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Listing> {
        self.put(
            &format!("/application/shops/{shop_id}/listings/{listing_id}"),
            changes,
        )
        .await
    }

    /// Replace variations, SKUs and offerings for a listing.
    pub async fn update_listing_inventory(
        &self,
        shop_id: &str,
        listing_id: u64,
        inventory: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.put(
            &format!("/application/shops/{shop_id}/listings/{listing_id}/inventory"),
            inventory,
        )
        .await
    }

    // --- Taxonomy ---

    pub async fn get_taxonomies(&self) -> Result<Paginated<serde_json::Value>> {
        self.get("/application/seller-taxonomy/nodes", &[]).await
    }

    pub async fn get_taxonomy_properties(
        &self,
        taxonomy_id: u64,
    ) -> Result<Paginated<serde_json::Value>> {
        self.get(
            &format!("/application/seller-taxonomy/nodes/{taxonomy_id}/properties"),
            &[],
        )
        .await
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body)
        .map_err(|e| Error::InvalidRequest(format!("serializing request body: {e}")))
}

fn record_request(method: &Method, status: &str) {
    metrics::counter!(
        "etsy_api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::interceptors::{ApiKeyInterceptor, BearerTokenInterceptor};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::Secret;
    use etsy_auth::{MemoryTokenStore, OAuthClient, TokenManager, TokenRecord, now_millis};
    use serde_json::json;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct RecordedRequest {
        method: String,
        query: String,
        headers: HashMap<String, String>,
        body: String,
    }

    type Routes = HashMap<(String, String), (StatusCode, String)>;

    /// Fake Etsy API: fixed responses keyed by (method, path). Records the
    /// parts of each request the assertions below look at.
    struct MockEtsyApi {
        base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockEtsyApi {
        async fn start(routes: &[(&str, &str, StatusCode, &str)]) -> Self {
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
                    let query = request.uri().query().unwrap_or("").to_string();
                    let headers = request
                        .headers()
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                        .collect();
                    let bytes = axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024)
                        .await
                        .unwrap();
                    recorded.lock().unwrap().push(RecordedRequest {
                        method: method.clone(),
                        query,
                        headers,
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

        fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn tokens(authenticated: bool) -> Arc<TokenManager> {
        let store = if authenticated {
            MemoryTokenStore::with_record(TokenRecord {
                access_token: "12345.at".into(),
                refresh_token: "12345.rt".into(),
                expires_in: 3600,
                expires_at: Some(now_millis() + 3_600_000),
                token_type: "Bearer".into(),
            })
        } else {
            MemoryTokenStore::new()
        };
        let oauth = OAuthClient::new(reqwest::Client::new(), "keystring", "http://localhost/cb")
            .with_token_endpoint("http://127.0.0.1:1/token");
        Arc::new(TokenManager::new(Arc::new(store), oauth))
    }

    fn client(base_url: &str, authenticated: bool) -> EtsyClient {
        EtsyClient::new(reqwest::Client::new(), base_url)
            .with_interceptor(Arc::new(ApiKeyInterceptor::new(Secret::new(
                "keystring".to_string(),
            ))))
            .with_interceptor(Arc::new(BearerTokenInterceptor::new(tokens(authenticated))))
    }

    const SHOP: &str = r#"{"shop_id":42,"shop_name":"CeramicsCo","url":"https://www.etsy.com/shop/CeramicsCo"}"#;

    #[tokio::test]
    async fn get_shop_sends_auth_headers_and_decodes() {
        let api = MockEtsyApi::start(&[("GET", "/v3/application/shops/42", StatusCode::OK, SHOP)]).await;

        let shop = client(&api.base_url, true).get_shop("42").await.unwrap();
        assert_eq!(shop.shop_id, 42);
        assert_eq!(shop.shop_name, "CeramicsCo");

        let request = &api.requests()[0];
        assert_eq!(request.headers["x-api-key"], "keystring");
        assert_eq!(request.headers["authorization"], "Bearer 12345.at");
        assert_eq!(request.headers["content-type"], "application/json");
    }

    #[tokio::test]
    async fn unauthenticated_requests_omit_bearer_token() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/seller-taxonomy/nodes",
            StatusCode::OK,
            r#"{"count":0,"results":[]}"#,
        )])
        .await;

        let taxonomies = client(&api.base_url, false).get_taxonomies().await.unwrap();
        assert_eq!(taxonomies.count, 0);

        let request = &api.requests()[0];
        assert!(!request.headers.contains_key("authorization"));
        assert_eq!(request.headers["x-api-key"], "keystring");
    }

    #[tokio::test]
    async fn find_shop_by_name_passes_query() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/shops",
            StatusCode::OK,
            &format!(r#"{{"count":1,"results":[{SHOP}]}}"#),
        )])
        .await;

        let shops = client(&api.base_url, true)
            .find_shop_by_name("Ceramics Co")
            .await
            .unwrap();
        assert_eq!(shops.results[0].shop_id, 42);
        assert_eq!(api.requests()[0].query, "shop_name=Ceramics+Co");
    }

    #[tokio::test]
    async fn create_draft_listing_posts_json_body() {
        let api = MockEtsyApi::start(&[(
            "POST",
            "/v3/application/shops/42/listings",
            StatusCode::CREATED,
            r#"{"listing_id":987,"state":"draft","url":"https://www.etsy.com/listing/987"}"#,
        )])
        .await;

        let mut draft = DraftListing::new("Mug", "Stoneware mug", 24.0, 1633);
        draft.tags = vec!["mug".into(), "ceramic".into()];
        let listing = client(&api.base_url, true)
            .create_draft_listing("42", &draft)
            .await
            .unwrap();
        assert_eq!(listing.listing_id, 987);
        assert_eq!(listing.state.as_deref(), Some("draft"));

        let request = &api.requests()[0];
        assert_eq!(request.method, "POST");
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["title"], "Mug");
        assert_eq!(body["taxonomy_id"], 1633);
        assert_eq!(body["tags"], json!(["mug", "ceramic"]));
    }

    #[tokio::test]
    async fn upload_listing_image_posts_stripped_base64() {
        let api = MockEtsyApi::start(&[(
            "POST",
            "/v3/application/shops/42/listings/987/images",
            StatusCode::CREATED,
            r#"{"listing_image_id":555,"listing_id":987}"#,
        )])
        .await;

        let image = ListingImage::from_base64("data:image/jpeg;base64,/9j/4AAQ");
        let uploaded = client(&api.base_url, true)
            .upload_listing_image("42", 987, &image)
            .await
            .unwrap();
        assert_eq!(uploaded.listing_image_id, 555);

        let body: serde_json::Value = serde_json::from_str(&api.requests()[0].body).unwrap();
        assert_eq!(body["image"], "/9j/4AAQ");
    }

    #[tokio::test]
    async fn update_listing_and_inventory_use_put() {
        let api = MockEtsyApi::start(&[
            (
                "PUT",
                "/v3/application/shops/42/listings/987",
                StatusCode::OK,
                r#"{"listing_id":987,"title":"Renamed"}"#,
            ),
            (
                "PUT",
                "/v3/application/shops/42/listings/987/inventory",
                StatusCode::OK,
                r#"{"products":[]}"#,
            ),
        ])
        .await;
        let client = client(&api.base_url, true);

        let mut changes = serde_json::Map::new();
        changes.insert("title".into(), json!("Renamed"));
        let listing = client.update_listing("42", 987, &changes).await.unwrap();
        assert_eq!(listing.title.as_deref(), Some("Renamed"));

        let inventory = client
            .update_listing_inventory("42", 987, &json!({"products": []}))
            .await
            .unwrap();
        assert_eq!(inventory["products"], json!([]));

        let methods: Vec<String> = api.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["PUT", "PUT"]);
    }

    #[tokio::test]
    async fn delete_sends_no_body() {
        let api = MockEtsyApi::start(&[(
            "DELETE",
            "/v3/application/shops/42/listings/987/images/555",
            StatusCode::OK,
            "{}",
        )])
        .await;

        let response: serde_json::Value = client(&api.base_url, true)
            .delete("/application/shops/42/listings/987/images/555")
            .await
            .unwrap();
        assert_eq!(response, json!({}));

        let request = &api.requests()[0];
        assert_eq!(request.method, "DELETE");
        assert!(request.body.is_empty());
        assert_eq!(request.headers["authorization"], "Bearer 12345.at");
    }

    #[tokio::test]
    async fn taxonomy_properties_path_includes_id() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/seller-taxonomy/nodes/1633/properties",
            StatusCode::OK,
            r#"{"count":1,"results":[{"property_id":200,"name":"Primary color"}]}"#,
        )])
        .await;

        let props = client(&api.base_url, true)
            .get_taxonomy_properties(1633)
            .await
            .unwrap();
        assert_eq!(props.results[0]["property_id"], 200);
    }

    #[tokio::test]
    async fn get_my_shops_hits_user_endpoint() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/users/me/shops",
            StatusCode::OK,
            &format!(r#"{{"count":1,"results":[{SHOP}]}}"#),
        )])
        .await;

        let shops = client(&api.base_url, true).get_my_shops().await.unwrap();
        assert_eq!(shops.count, 1);
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let api = MockEtsyApi::start(&[
            ("GET", "/v3/application/shops/1", StatusCode::TOO_MANY_REQUESTS, r#"{"error":"limit"}"#),
            ("GET", "/v3/application/shops/2", StatusCode::UNAUTHORIZED, r#"{"error":"invalid_token"}"#),
            ("GET", "/v3/application/shops/3", StatusCode::INTERNAL_SERVER_ERROR, "{}"),
        ])
        .await;
        let client = client(&api.base_url, true);

        let cases = [
            ("1", 429, ErrorClassification::RateLimited),
            ("2", 401, ErrorClassification::Unauthorized),
            ("3", 500, ErrorClassification::Server),
            ("4", 404, ErrorClassification::Client),
        ];
        for (id, expected_status, expected_class) in cases {
            match client.get_shop(id).await.unwrap_err() {
                Error::Api {
                    status,
                    classification,
                    ..
                } => {
                    assert_eq!(status, expected_status);
                    assert_eq!(classification, expected_class);
                }
                other => panic!("expected Api error for shop {id}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn error_body_is_preserved() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/shops/9",
            StatusCode::BAD_REQUEST,
            r#"{"error":"shop_id must be an integer"}"#,
        )])
        .await;

        let err = client(&api.base_url, true).get_shop("9").await.unwrap_err();
        assert!(err.to_string().contains("shop_id must be an integer"));
    }

    #[tokio::test]
    async fn undecodable_success_body_is_decode_error() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/shops/42",
            StatusCode::OK,
            r#"{"unexpected":true}"#,
        )])
        .await;

        let err = client(&api.base_url, true).get_shop("42").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_api_is_http_error() {
        let err = client("http://127.0.0.1:1/v3", true)
            .get_shop("42")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got {err:?}");
    }

    struct FailingInterceptor;

    impl RequestInterceptor for FailingInterceptor {
        fn id(&self) -> &str {
            "failing"
        }

        fn prepare_request<'a>(
            &'a self,
            _headers: &'a mut HeaderMap,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async { Err(Error::InvalidRequest("boom".into())) })
        }
    }

    #[tokio::test]
    async fn interceptor_failure_aborts_before_dispatch() {
        let api = MockEtsyApi::start(&[("GET", "/v3/application/shops/42", StatusCode::OK, SHOP)]).await;
        let client = EtsyClient::new(reqwest::Client::new(), &api.base_url)
            .with_interceptor(Arc::new(FailingInterceptor));

        let err = client.get_shop("42").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(api.requests().is_empty());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = EtsyClient::new(reqwest::Client::new(), "https://openapi.etsy.com/v3/");
        assert_eq!(client.base_url, DEFAULT_API_BASE_URL);
    }
}
