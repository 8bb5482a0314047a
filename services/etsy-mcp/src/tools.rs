//! MCP server handler: Etsy listing, shop and taxonomy tools.
//!
//! Tool results are JSON text with a `success` flag. Failures come back as
//! MCP error results (`is_error: true`) carrying `{success: false, error,
//! message}` so the calling model sees why the Etsy call failed.

use std::sync::Arc;
use std::time::Instant;

use etsy_client::EtsyClient;
use etsy_client::models::{DraftListing, ListingImage, WhenMade, WhoMade};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{self, Error};

pub const SERVER_NAME: &str = "Etsy MCP Server";

/// Parameters for `createDraftListing`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftListingParams {
    /// Title of the listing
    pub title: String,
    /// Description of the listing
    pub description: String,
    /// Price of the item in the shop currency
    pub price: f64,
    /// Quantity available. Defaults to 1.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Who made the item
    #[serde(default)]
    pub who_made: WhoMade,
    /// When the item was made, e.g. "2020_2025" or "made_to_order"
    #[serde(default)]
    pub when_made: WhenMade,
    /// Is this a craft supply?
    #[serde(default)]
    pub is_supply: bool,
    /// Taxonomy ID for the listing category (see getTaxonomies)
    pub taxonomy_id: u64,
    /// Up to 13 search tags
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    pub shipping_profile_id: Option<u64>,
    pub shop_section_id: Option<u64>,
    /// Minimum processing time in days
    pub processing_min: Option<u32>,
    /// Maximum processing time in days
    pub processing_max: Option<u32>,
    /// "physical" or "download"
    pub listing_type: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl CreateDraftListingParams {
    fn into_draft(self) -> error::Result<DraftListing> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(Error::InvalidArguments(format!(
                "price must be a positive number, got {}",
                self.price
            )));
        }
        if let (Some(min), Some(max)) = (self.processing_min, self.processing_max)
            && min > max
        {
            return Err(Error::InvalidArguments(format!(
                "processingMin ({min}) must not exceed processingMax ({max})"
            )));
        }

        let mut draft = DraftListing::new(self.title, self.description, self.price, self.taxonomy_id);
        draft.quantity = self.quantity;
        draft.who_made = self.who_made;
        draft.when_made = self.when_made;
        draft.is_supply = self.is_supply;
        draft.tags = self.tags;
        draft.materials = self.materials;
        draft.styles = self.styles;
        draft.shipping_profile_id = self.shipping_profile_id;
        draft.shop_section_id = self.shop_section_id;
        draft.processing_min = self.processing_min;
        draft.processing_max = self.processing_max;
        draft.listing_type = self.listing_type;
        Ok(draft)
    }
}

/// Parameters for `uploadListingImage`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadListingImageParams {
    /// The ID of the listing
    pub listing_id: u64,
    /// Base64 encoded image data, raw or as a data:image/...;base64, URL
    pub image_data: String,
    /// Position in the listing's image list, 1 is the primary image
    pub rank: Option<u32>,
    pub alt_text: Option<String>,
}

/// Parameters for `getTaxonomyProperties`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetTaxonomyPropertiesParams {
    /// Taxonomy node ID
    pub taxonomy_id: u64,
}

/// Parameters for `getShop`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetShopParams {
    /// Shop ID. Defaults to the configured shop.
    pub shop_id: Option<String>,
}

/// Parameters for `findShopByName`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindShopByNameParams {
    /// Full or partial shop name
    pub shop_name: String,
}

/// Parameters for `updateListing`. Only the fields present are changed.
///
/// Serializes with Etsy's snake_case field names, which is the request body.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct UpdateListingParams {
    /// The ID of the listing
    #[serde(skip_serializing)]
    pub listing_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who_made: Option<WhoMade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when_made: Option<WhenMade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_supply: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_profile_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_section_id: Option<u64>,
    /// "active" publishes the listing, "inactive" hides it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl UpdateListingParams {
    fn changes(&self) -> error::Result<serde_json::Map<String, Value>> {
        let changes = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(Error::InvalidArguments(e.to_string())),
        };
        if changes.is_empty() {
            return Err(Error::InvalidArguments(
                "no fields to update were provided".into(),
            ));
        }
        Ok(changes)
    }
}

/// Parameters for `updateListingInventory`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingInventoryParams {
    /// The ID of the listing
    pub listing_id: u64,
    /// Etsy inventory body: `products` (each with `sku`, `property_values`
    /// and `offerings`) plus optional `price_on_property`,
    /// `quantity_on_property` and `sku_on_property`
    pub inventory: Value,
}

/// Etsy MCP server handler.
///
/// A new instance is created per request by the `StreamableHttpService`
/// factory; the Etsy client is shared.
#[derive(Clone)]
pub struct EtsyMcpServer {
    client: Arc<EtsyClient>,
    shop_id: Option<String>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl EtsyMcpServer {
    pub fn new(client: Arc<EtsyClient>, shop_id: Option<String>) -> Self {
        Self {
            client,
            shop_id,
            tool_router: Self::tool_router(),
        }
    }

    /// Tool definitions registered on this server, for `/mcp/schema` and `/docs`.
    pub fn tool_definitions() -> Vec<Tool> {
        Self::tool_router().list_all()
    }

    #[tool(
        name = "createDraftListing",
        description = "Create a draft listing in the configured Etsy shop"
    )]
    async fn create_draft_listing(
        &self,
        Parameters(params): Parameters<CreateDraftListingParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = self.run_create_draft_listing(params).await;
        respond("createDraftListing", started, "Failed to create draft listing", outcome)
    }

    #[tool(
        name = "uploadListingImage",
        description = "Upload a base64 encoded image to a listing in the configured Etsy shop"
    )]
    async fn upload_listing_image(
        &self,
        Parameters(params): Parameters<UploadListingImageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = self.run_upload_listing_image(params).await;
        respond("uploadListingImage", started, "Failed to upload image", outcome)
    }

    #[tool(
        name = "getTaxonomies",
        description = "Get the seller taxonomy used to categorize listings"
    )]
    async fn get_taxonomies(&self) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = match self.client.get_taxonomies().await {
            Ok(page) => Ok(json!({ "success": true, "taxonomies": page.results })),
            Err(e) => Err(e.into()),
        };
        respond("getTaxonomies", started, "Failed to fetch taxonomies", outcome)
    }

    #[tool(
        name = "getTaxonomyProperties",
        description = "Get the properties (color, material, size) available for a taxonomy node"
    )]
    async fn get_taxonomy_properties(
        &self,
        Parameters(params): Parameters<GetTaxonomyPropertiesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = match self.client.get_taxonomy_properties(params.taxonomy_id).await {
            Ok(page) => Ok(json!({
                "success": true,
                "taxonomy_id": params.taxonomy_id,
                "properties": page.results,
            })),
            Err(e) => Err(e.into()),
        };
        respond(
            "getTaxonomyProperties",
            started,
            "Failed to fetch taxonomy properties",
            outcome,
        )
    }

    #[tool(
        name = "getShop",
        description = "Get details of an Etsy shop, the configured shop by default"
    )]
    async fn get_shop(
        &self,
        Parameters(params): Parameters<GetShopParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = self.run_get_shop(params).await;
        respond("getShop", started, "Failed to fetch shop", outcome)
    }

    #[tool(name = "findShopByName", description = "Search Etsy shops by name")]
    async fn find_shop_by_name(
        &self,
        Parameters(params): Parameters<FindShopByNameParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = match self.client.find_shop_by_name(&params.shop_name).await {
            Ok(page) => Ok(json!({
                "success": true,
                "count": page.count,
                "shops": page.results,
            })),
            Err(e) => Err(e.into()),
        };
        respond("findShopByName", started, "Failed to search shops", outcome)
    }

    #[tool(
        name = "updateListing",
        description = "Update fields of an existing listing in the configured Etsy shop"
    )]
    async fn update_listing(
        &self,
        Parameters(params): Parameters<UpdateListingParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = self.run_update_listing(params).await;
        respond("updateListing", started, "Failed to update listing", outcome)
    }

    #[tool(
        name = "updateListingInventory",
        description = "Replace the inventory (products, SKUs, offerings) of a listing in the configured Etsy shop"
    )]
    async fn update_listing_inventory(
        &self,
        Parameters(params): Parameters<UpdateListingInventoryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let outcome = self.run_update_listing_inventory(params).await;
        respond(
            "updateListingInventory",
            started,
            "Failed to update listing inventory",
            outcome,
        )
    }
}

impl EtsyMcpServer {
    fn shop_id(&self) -> error::Result<&str> {
        self.shop_id.as_deref().ok_or(Error::ShopIdMissing)
    }

    async fn run_create_draft_listing(
        &self,
        params: CreateDraftListingParams,
    ) -> error::Result<Value> {
        let shop_id = self.shop_id()?;
        let draft = params.into_draft()?;
        let listing = self.client.create_draft_listing(shop_id, &draft).await?;
        info!(shop_id, listing_id = listing.listing_id, "draft listing created");
        Ok(json!({
            "success": true,
            "listing_id": listing.listing_id,
            "url": listing.url,
            "message": "Draft listing created successfully",
        }))
    }

    async fn run_upload_listing_image(
        &self,
        params: UploadListingImageParams,
    ) -> error::Result<Value> {
        let shop_id = self.shop_id()?;
        let mut image = ListingImage::from_base64(&params.image_data);
        if image.image.is_empty() {
            return Err(Error::InvalidArguments("imageData is empty".into()));
        }
        image.rank = params.rank;
        image.alt_text = params.alt_text;

        let uploaded = self
            .client
            .upload_listing_image(shop_id, params.listing_id, &image)
            .await?;
        info!(
            shop_id,
            listing_id = params.listing_id,
            listing_image_id = uploaded.listing_image_id,
            "listing image uploaded"
        );
        Ok(json!({
            "success": true,
            "listing_image_id": uploaded.listing_image_id,
            "message": "Image uploaded successfully",
        }))
    }

    async fn run_get_shop(&self, params: GetShopParams) -> error::Result<Value> {
        let shop_id = match params.shop_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.trim(),
            _ => self.shop_id()?,
        };
        let shop = self.client.get_shop(shop_id).await?;
        Ok(json!({ "success": true, "shop": shop }))
    }

    async fn run_update_listing(&self, params: UpdateListingParams) -> error::Result<Value> {
        let shop_id = self.shop_id()?;
        let changes = params.changes()?;
        let listing = self
            .client
            .update_listing(shop_id, params.listing_id, &changes)
            .await?;
        info!(
            shop_id,
            listing_id = listing.listing_id,
            fields = changes.len(),
            "listing updated"
        );
        Ok(json!({
            "success": true,
            "listing_id": listing.listing_id,
            "state": listing.state,
            "message": "Listing updated successfully",
        }))
    }

    async fn run_update_listing_inventory(
        &self,
        params: UpdateListingInventoryParams,
    ) -> error::Result<Value> {
        let shop_id = self.shop_id()?;
        if !params.inventory.is_object() {
            return Err(Error::InvalidArguments(
                "inventory must be a JSON object".into(),
            ));
        }
        let inventory = self
            .client
            .update_listing_inventory(shop_id, params.listing_id, &params.inventory)
            .await?;
        Ok(json!({
            "success": true,
            "listing_id": params.listing_id,
            "inventory": inventory,
        }))
    }
}

/// Record the call and turn the outcome into an MCP tool result.
fn respond(
    tool: &'static str,
    started: Instant,
    failure_message: &str,
    outcome: error::Result<Value>,
) -> Result<CallToolResult, ErrorData> {
    crate::metrics::record_tool_call(tool, outcome.is_ok(), started.elapsed().as_secs_f64());
    match outcome {
        Ok(body) => Ok(CallToolResult::success(vec![Content::text(body.to_string())])),
        Err(e) => {
            warn!(tool, error = %e, "tool call failed");
            let body = json!({
                "success": false,
                "error": e.to_string(),
                "message": failure_message,
            });
            Ok(CallToolResult::error(vec![Content::text(body.to_string())]))
        }
    }
}

#[tool_handler]
impl ServerHandler for EtsyMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Etsy MCP server: create and update draft listings, upload listing images, \
                 look up shops and the seller taxonomy. Authenticate at /auth first."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Streamable HTTP service for `/mcp`, stateless: every POST is handled by a
/// fresh server instance with no session tracking.
pub fn mcp_service(
    client: Arc<EtsyClient>,
    shop_id: Option<String>,
    ct: CancellationToken,
) -> StreamableHttpService<EtsyMcpServer, LocalSessionManager> {
    StreamableHttpService::new(
        move || Ok(EtsyMcpServer::new(client.clone(), shop_id.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: false,
            cancellation_token: ct,
            ..Default::default()
        },
    )
}
