//! Service-level errors surfaced by MCP tools and the find-shop-id command

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shop ID is not set in configuration; set ETSY_SHOP_ID or etsy.shop_id")]
    ShopIdMissing,

    #[error("No valid Etsy token; visit /auth on the running server to authenticate")]
    NotAuthenticated,

    #[error("No shops found for this Etsy account; create a shop on Etsy first")]
    NoShops,

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Etsy(#[from] etsy_client::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
