//! Shared types for the Etsy MCP workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
