//! Gateway configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/firewall-gateway/config.toml";

/// Environment variable that points at an alternate config file
pub const CONFIG_PATH_ENV: &str = "FIREWALL_GATEWAY_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Where the provider's REST and GraphQL APIs live
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            graphql_url: default_graphql_url(),
        }
    }
}

impl ProviderConfig {
    /// Both endpoints under one base URL, GraphQL at `{base}/graphql`
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_base_url: base.to_string(),
            graphql_url: format!("{base}/graphql"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Name of the environment variable holding the fallback API token
    #[serde(default = "default_fallback_token_env")]
    pub fallback_token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            fallback_token_env: default_fallback_token_env(),
        }
    }
}

impl AuthConfig {
    pub fn fallback_token(&self) -> Option<String> {
        std::env::var(&self.fallback_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

// Default value functions

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}
fn default_api_base_url() -> String {
    "https://api.cloudflare.com/client/v4".into()
}
fn default_graphql_url() -> String {
    "https://api.cloudflare.com/client/v4/graphql".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_fallback_token_env() -> String {
    "CLOUDFLARE_API_TOKEN".into()
}

/// Load configuration from the path in `FIREWALL_GATEWAY_CONFIG`, or the default path
pub fn load_config() -> Result<GatewayConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = load_config_from(Path::new(&path))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Load configuration from a specific path. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<GatewayConfig> {
    if !path.exists() {
        tracing::warn!("Config file not found at {}, using defaults", path.display());
        return Ok(GatewayConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<GatewayConfig> {
    let config: GatewayConfig = toml::from_str(content).context("Invalid TOML")?;
    Ok(config)
}

impl GatewayConfig {
    /// Apply `FIREWALL_GATEWAY_*` overrides from the given lookup
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("FIREWALL_GATEWAY_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(url) = lookup("FIREWALL_GATEWAY_API_BASE_URL") {
            self.provider.api_base_url = url;
        }
        if let Some(url) = lookup("FIREWALL_GATEWAY_GRAPHQL_URL") {
            self.provider.graphql_url = url;
        }
    }
}
