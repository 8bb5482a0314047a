//! `find-shop-id` command: look up the shops owned by the authenticated user
//! and print the `ETSY_SHOP_ID` line for the first one.

use etsy_auth::TokenManager;
use etsy_client::EtsyClient;
use etsy_client::models::Shop;
use std::fmt::Write;
use tracing::info;

use crate::error::{Error, Result};

/// Fetch the authenticated user's shops. Fails without a usable token or
/// when the account has no shop.
pub async fn find_shops(tokens: &TokenManager, client: &EtsyClient) -> Result<Vec<Shop>> {
    if !tokens.has_valid_token().await {
        return Err(Error::NotAuthenticated);
    }

    let page = client.get_my_shops().await?;
    if page.results.is_empty() {
        return Err(Error::NoShops);
    }

    info!(count = page.results.len(), "shops found for account");
    Ok(page.results)
}

/// Human-readable shop list ending with the env line for the first shop.
pub fn render_shops(shops: &[Shop]) -> String {
    let mut out = String::from("Shops found for your account:\n-----------------------------\n");
    for (index, shop) in shops.iter().enumerate() {
        let _ = writeln!(out, "[{}] Shop: {}", index + 1, shop.shop_name);
        let _ = writeln!(out, "    ID: {}", shop.shop_id);
        let _ = writeln!(out, "    URL: {}", shop.url.as_deref().unwrap_or("-"));
        out.push('\n');
    }
    if let Some(first) = shops.first() {
        let _ = writeln!(out, "Your Etsy shop ID is: {}", first.shop_id);
        let _ = writeln!(out, "\nSet it in your environment or config with:");
        let _ = writeln!(out, "ETSY_SHOP_ID={}", first.shop_id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockEtsyApi, etsy_client, fresh_record, token_manager};
    use axum::http::StatusCode;

    const MY_SHOPS: &str = r#"{"count":2,"results":[
        {"shop_id":42,"shop_name":"CeramicsCo","url":"https://www.etsy.com/shop/CeramicsCo"},
        {"shop_id":43,"shop_name":"PrintsCo"}
    ]}"#;

    #[tokio::test]
    async fn lists_shops_for_authenticated_user() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/users/me/shops",
            StatusCode::OK,
            MY_SHOPS,
        )])
        .await;
        let tokens = token_manager(Some(fresh_record()));
        let client = etsy_client(&api.base_url, tokens.clone());

        let shops = find_shops(&tokens, &client).await.unwrap();
        assert_eq!(shops.len(), 2);
        assert_eq!(shops[0].shop_id, 42);

        let output = render_shops(&shops);
        assert!(output.contains("[1] Shop: CeramicsCo"));
        assert!(output.contains("[2] Shop: PrintsCo"));
        assert!(output.contains("URL: -"));
        assert!(output.trim_end().ends_with("ETSY_SHOP_ID=42"));
    }

    #[tokio::test]
    async fn requires_a_valid_token() {
        let api = MockEtsyApi::start(&[]).await;
        let tokens = token_manager(None);
        let client = etsy_client(&api.base_url, tokens.clone());

        let err = find_shops(&tokens, &client).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
        assert!(api.requests().is_empty(), "no API call without a token");
    }

    #[tokio::test]
    async fn account_without_shops_is_an_error() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/users/me/shops",
            StatusCode::OK,
            r#"{"count":0,"results":[]}"#,
        )])
        .await;
        let tokens = token_manager(Some(fresh_record()));
        let client = etsy_client(&api.base_url, tokens.clone());

        let err = find_shops(&tokens, &client).await.unwrap_err();
        assert!(matches!(err, Error::NoShops));
    }

    #[tokio::test]
    async fn api_errors_propagate() {
        let api = MockEtsyApi::start(&[(
            "GET",
            "/v3/application/users/me/shops",
            StatusCode::FORBIDDEN,
            r#"{"error":"insufficient scope"}"#,
        )])
        .await;
        let tokens = token_manager(Some(fresh_record()));
        let client = etsy_client(&api.base_url, tokens.clone());

        let err = find_shops(&tokens, &client).await.unwrap_err();
        assert!(matches!(err, Error::Etsy(_)));
        assert!(err.to_string().contains("insufficient scope"));
    }
}
