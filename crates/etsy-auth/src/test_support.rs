//! Local stand-in for Etsy's token endpoint

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::Form;
use axum::http::{StatusCode, header};
use axum::routing::post;
use tokio::net::TcpListener;

/// Axum server on an ephemeral port that answers every token request with a
/// fixed status and body, recording the submitted form fields.
pub(crate) struct MockTokenEndpoint {
    pub url: String,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl MockTokenEndpoint {
    pub async fn start(status: StatusCode, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let body = body.to_string();
        let app = Router::new().route(
            "/v3/public/oauth/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let recorded = recorded.clone();
                let body = body.clone();
                async move {
                    recorded.lock().unwrap().push(form);
                    (status, [(header::CONTENT_TYPE, "application/json")], body)
                }
            }),
        );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/v3/public/oauth/token"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}
