use anyhow::Context;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use shopify_admin::{ShopifyConfig, DEFAULT_API_VERSION};
use std::path::Path;
use std::time::Duration;

pub const DOMAIN_VAR: &str = "SHOP_DOMAIN";
pub const TOKEN_VAR: &str = "SHOP_ACCESS_TOKEN";
pub const API_VERSION_VAR: &str = "SHOP_API_VERSION";
pub const TIMEOUT_VAR: &str = "SHOP_HTTP_TIMEOUT";
const DEFAULT_TIMEOUT: &str = "60s";

const DEFAULT_TITLE_PREFIX: &str = "SOLAR SCREEN® Decorative Films - ";

const DEFAULT_DESCRIPTION_HTML: &str = "The wish for privacy is perfectly natural... Whether at work or in the comfort of your own home, it lets you find yourself and be yourself.\n\n\
With our range of design films, new privacy options open up for those&nbsp;who need them, be it a meeting room or a bathroom.\n\n\
Our films offer different levels of opacity and different patterns, to better match privacy needs without reducing brightness.\n\n\
Inspired by the city, nature, geometric shapes or the sky, dozens of coloured or frosted patterns are available and can be fitted to the glazing of offices and shops: opalescent, gradient, white, grey or black, blackout or coloured films. The Aurora film with dichroic technology offers a subtle play of light.\n\n\
Originality guaranteed!";

const DEFAULT_COLLECTIONS: [&str; 3] = ["Homepage", "Window Films", "Decorative"];

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[display("Shop domain is not set (use --domain or SHOP_DOMAIN)")]
    MissingDomain,
    #[display("Admin API access token is not set (use --token or SHOP_ACCESS_TOKEN)")]
    MissingToken,
    #[display("Unable to parse SHOP_HTTP_TIMEOUT value {value:?}")]
    InvalidTimeout { value: String },
}

/// Business constants applied to every product of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub title_prefix: String,
    pub description_html: String,
    pub default_collections: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
            description_html: DEFAULT_DESCRIPTION_HTML.to_string(),
            default_collections: DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl CatalogSettings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read settings from {path:?}"))?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data).with_context(|| format!("Unable to parse settings {path:?}"))
    }

    pub fn product_title(&self, model: &str) -> String {
        format!("{}{model}", self.title_prefix)
    }
}

/// Connection values given on the command line. Unset values fall back to
/// the environment.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub domain: Option<String>,
    pub token: Option<String>,
    pub api_version: Option<String>,
}

/// Loads `.env` into the process environment when present.
pub fn load_env_file() -> anyhow::Result<()> {
    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env").context("Unable to load .env file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).context("Unable to open .env file"),
    }
}

fn env_value(key: &str) -> Option<String> {
    envmnt::exists(key)
        .then(|| envmnt::get_or(key, ""))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    duration_str::parse(value.trim()).map_err(|_| ConfigError::InvalidTimeout {
        value: value.to_string(),
    })
}

pub fn shopify_config(args: ConnectionArgs) -> Result<ShopifyConfig, ConfigError> {
    resolve_connection(args, env_value)
}

fn resolve_connection(
    args: ConnectionArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ShopifyConfig, ConfigError> {
    let domain = non_empty(args.domain)
        .or_else(|| lookup(DOMAIN_VAR))
        .ok_or(ConfigError::MissingDomain)?;
    let access_token = non_empty(args.token)
        .or_else(|| lookup(TOKEN_VAR))
        .ok_or(ConfigError::MissingToken)?;
    let api_version = non_empty(args.api_version)
        .or_else(|| lookup(API_VERSION_VAR))
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
    let timeout = lookup(TIMEOUT_VAR).unwrap_or_else(|| DEFAULT_TIMEOUT.to_string());
    let timeout = parse_timeout(&timeout)?;
    Ok(ShopifyConfig {
        domain,
        access_token,
        api_version,
        timeout: Some(timeout),
    })
}
