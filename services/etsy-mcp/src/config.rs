//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! The Etsy API keystring is loaded from the ETSY_API_KEY env var or
//! api_key_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub etsy: EtsyConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Etsy app credentials and API settings
#[derive(Debug, Deserialize)]
pub struct EtsyConfig {
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the keystring (alternative to ETSY_API_KEY)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    /// OAuth client id. Etsy uses the keystring itself when unset.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Shop used by listing tools
    #[serde(default)]
    pub shop_id: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Timeout for outbound Etsy calls, token endpoint included
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_redirect_uri() -> String {
    etsy_auth::DEFAULT_REDIRECT_URI.to_string()
}

fn default_scopes() -> String {
    etsy_auth::DEFAULT_SCOPES.to_string()
}

fn default_api_base_url() -> String {
    etsy_client::DEFAULT_API_BASE_URL.to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("tokens.json")
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    100
}

/// Read a non-empty env var. Empty values count as unset.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. ETSY_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Some(client_id) = env_value("ETSY_CLIENT_ID") {
            config.etsy.client_id = Some(client_id);
        }
        if let Some(shop_id) = env_value("ETSY_SHOP_ID") {
            config.etsy.shop_id = Some(shop_id);
        }
        if let Some(redirect_uri) = env_value("ETSY_REDIRECT_URI") {
            config.etsy.redirect_uri = redirect_uri;
        }
        if let Some(scopes) = env_value("ETSY_SCOPES") {
            config.etsy.scopes = scopes;
        }

        // Resolve API key: env var takes precedence over file
        if let Some(key) = std::env::var("ETSY_API_KEY")
            .ok()
            .and_then(|v| Secret::from_trimmed(&v))
        {
            config.etsy.api_key = Some(key);
        } else if let Some(ref key_file) = config.etsy.api_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            config.etsy.api_key = Secret::from_trimmed(&key);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.etsy.api_key.is_none() {
            return Err(common::Error::MissingSetting(
                "ETSY_API_KEY or etsy.api_key_file",
            ));
        }

        if !is_http_url(&self.etsy.redirect_uri) {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                self.etsy.redirect_uri
            )));
        }

        if !is_http_url(&self.etsy.api_base_url) {
            return Err(common::Error::Config(format!(
                "api_base_url must start with http:// or https://, got: {}",
                self.etsy.api_base_url
            )));
        }

        if self.etsy.scopes.split_whitespace().next().is_none() {
            return Err(common::Error::Config("scopes must not be empty".into()));
        }

        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// OAuth client id: the configured one, or the API keystring.
    pub fn client_id(&self) -> String {
        match (&self.etsy.client_id, &self.etsy.api_key) {
            (Some(id), _) => id.clone(),
            (None, Some(key)) => key.expose().clone(),
            (None, None) => String::new(),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("etsy-mcp.toml")
    }
}
