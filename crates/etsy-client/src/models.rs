//! Etsy listing, shop and taxonomy shapes
//!
//! Only the fields this server reads or writes are typed. Anything else Etsy
//! returns is kept in `extra` where it matters to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Who made the item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WhoMade {
    #[default]
    IDid,
    Collective,
    SomeoneElse,
}

/// When the item was made, as Etsy's fixed set of ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum WhenMade {
    #[serde(rename = "made_to_order")]
    MadeToOrder,
    #[default]
    #[serde(rename = "2020_2025")]
    Made2020To2025,
    #[serde(rename = "2010_2019")]
    Made2010To2019,
    #[serde(rename = "2000_2009")]
    Made2000To2009,
    #[serde(rename = "1990s")]
    Made1990s,
    #[serde(rename = "1980s")]
    Made1980s,
    #[serde(rename = "1970s")]
    Made1970s,
    #[serde(rename = "1960s")]
    Made1960s,
    #[serde(rename = "1950s")]
    Made1950s,
    #[serde(rename = "1940s")]
    Made1940s,
    #[serde(rename = "1930s")]
    Made1930s,
    #[serde(rename = "1920s")]
    Made1920s,
    #[serde(rename = "1910s")]
    Made1910s,
    #[serde(rename = "1900s")]
    Made1900s,
    #[serde(rename = "1800s")]
    Made1800s,
    #[serde(rename = "1700s")]
    Made1700s,
    #[serde(rename = "before_1700")]
    Before1700,
}

/// Body for `POST /application/shops/{shop_id}/listings`.
#[derive(Debug, Clone, Serialize)]
pub struct DraftListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub quantity: u32,
    pub who_made: WhoMade,
    pub when_made: WhenMade,
    pub is_supply: bool,
    pub taxonomy_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_profile_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_section_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_max: Option<u32>,
    /// "physical" or "download"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<String>,
}

impl DraftListing {
    /// Listing with Etsy's required fields; optional fields start empty.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        taxonomy_id: u64,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            price,
            quantity: 1,
            who_made: WhoMade::default(),
            when_made: WhenMade::default(),
            is_supply: false,
            taxonomy_id,
            shipping_profile_id: None,
            shop_section_id: None,
            tags: Vec::new(),
            materials: Vec::new(),
            styles: Vec::new(),
            processing_min: None,
            processing_max: None,
            listing_type: None,
        }
    }
}

/// Body for `POST /application/shops/{shop_id}/listings/{listing_id}/images`.
#[derive(Debug, Clone, Serialize)]
pub struct ListingImage {
    /// Base64 image bytes without any `data:` URL prefix
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl ListingImage {
    /// Accepts raw base64 or a `data:image/...;base64,` URL.
    pub fn from_base64(data: &str) -> Self {
        let image = match data.strip_prefix("data:image") {
            Some(rest) => rest.split_once(',').map_or(rest, |(_, b64)| b64),
            None => data,
        };
        Self {
            image: image.to_string(),
            rank: None,
            overwrite: None,
            alt_text: None,
        }
    }
}

/// Etsy's standard list envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub shop_id: u64,
    pub shop_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingImageResponse {
    pub listing_image_id: u64,
    #[serde(default)]
    pub listing_id: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
