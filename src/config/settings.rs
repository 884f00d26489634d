//! Application settings loaded from `config.toml`.
//!
//! The file is optional: when it does not exist every section falls back to
//! its defaults. A file that exists but cannot be read or parsed is a
//! configuration error.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "FELLOWSHIP_CONFIG";

/// Root of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Ledger rules
    #[serde(default)]
    pub finance: FinanceConfig,
    /// Sites created at start-up when missing
    #[serde(default)]
    pub sites: Vec<SiteSeed>,
    /// Activity types created at start-up when missing
    #[serde(default)]
    pub activity_types: Vec<ActivityTypeSeed>,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the API listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Header carrying the identity-provider subject, set by the authenticating proxy
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    /// Origins allowed by CORS; empty means same-origin only
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            identity_header: default_identity_header(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_identity_header() -> String {
    "x-identity-id".to_string()
}

/// `[finance]` section
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FinanceConfig {
    /// Reject allocations larger than the source balance instead of warning
    #[serde(default)]
    pub strict_budget_enforcement: bool,
}

/// One `[[sites]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One `[[activity_types]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityTypeSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parses configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `path`, using defaults when the file is absent.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No configuration file at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }

    debug!("Loading configuration from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `$FELLOWSHIP_CONFIG` or `./config.toml`.
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            bind_address = "127.0.0.1:8080"
            identity_header = "x-forwarded-user"

            [finance]
            strict_budget_enforcement = true

            [[sites]]
            name = "North"
            description = "Northern district"

            [[sites]]
            name = "South"

            [[activity_types]]
            name = "Training"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.identity_header, "x-forwarded-user");
        assert!(config.finance.strict_budget_enforcement);
        assert_eq!(config.sites.len(), 2);
        assert_eq!(config.sites[0].description.as_deref(), Some("Northern district"));
        assert!(config.sites[1].description.is_none());
        assert_eq!(config.activity_types[0].name, "Training");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.identity_header, "x-identity-id");
        assert!(!config.finance.strict_budget_enforcement);
        assert!(config.sites.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[server\nbind_address = 1");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config("definitely/not/here/config.toml").unwrap();
        assert!(!config.finance.strict_budget_enforcement);
    }
}
