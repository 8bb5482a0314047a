//! Etsy OAuth token lifecycle
//!
//! PKCE authorization URL generation, token exchange/refresh against Etsy's
//! token endpoint, single-record token storage, and the `TokenManager` that
//! hands out access tokens valid for at least five more minutes.
//!
//! Token flow:
//! 1. `/auth` calls `pkce::generate_verifier()` + `OAuthClient::authorization_url()`
//! 2. User authorizes on etsy.com and is redirected back with a code
//! 3. `/callback` calls `OAuthClient::exchange_code()` then `TokenManager::persist()`
//! 4. Every Etsy API call asks `TokenManager::get_valid_access_token()`,
//!    which refreshes on read when the token is near expiry

pub mod constants;
pub mod error;
pub mod manager;
pub mod pkce;
pub mod store;
pub mod token;

#[cfg(test)]
mod test_support;

pub use constants::*;
pub use error::{Error, Result};
pub use manager::{TokenManager, needs_refresh, now_millis};
pub use pkce::{compute_challenge, generate_state, generate_verifier};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{OAuthClient, TokenRecord};
