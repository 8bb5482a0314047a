//! Etsy OAuth 2.0 endpoints and defaults
//!
//! Etsy's v3 API uses authorization code + PKCE. The client ID is the app's
//! keystring, which is public; the tokens are the only secrets and live in
//! the token store.

/// Authorization page the user is redirected to.
pub const AUTHORIZE_ENDPOINT: &str = "https://www.etsy.com/oauth/connect";

/// Token endpoint for code exchange and refresh.
pub const TOKEN_ENDPOINT: &str = "https://api.etsy.com/v3/public/oauth/token";

/// Redirect URI used when none is configured. Must match the app settings on Etsy.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";

/// Scopes needed to read shops and create or edit listings.
pub const DEFAULT_SCOPES: &str = "listings_r listings_w shops_r";

/// A stored access token must stay valid for at least this long to be handed
/// out without a refresh.
pub const EXPIRY_BUFFER_MILLIS: u64 = 300_000;
