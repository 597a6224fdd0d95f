//! Service configuration.
//!
//! Loaded from a TOML file; secrets (client credentials, encryption key)
//! come from environment variables and are joined in at startup.

use serde::Deserialize;

/// Complete service configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "ledgersync.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Accounting-platform endpoints and identifiers (non-secret half of the
/// provider configuration; client credentials come from the environment).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub company_id: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_minor_version")]
    pub minor_version: u32,
}

fn default_auth_url() -> String {
    "https://appcenter.intuit.com/connect/oauth2".to_string()
}

fn default_token_url() -> String {
    "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer".to_string()
}

fn default_api_base_url() -> String {
    "https://sandbox-quickbooks.api.intuit.com".to_string()
}

fn default_scope() -> String {
    "com.intuit.quickbooks.accounting".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/callback".to_string()
}

fn default_minor_version() -> u32 {
    73
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            company_id: String::new(),
            scope: default_scope(),
            redirect_uri: default_redirect_uri(),
            minor_version: default_minor_version(),
        }
    }
}

/// Sync pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// First-sync window start when no ledger rows exist yet (YYYY-MM-DD)
    #[serde(default = "default_floor_date")]
    pub floor_date: String,
    #[serde(default = "default_accounting_method")]
    pub accounting_method: String,
}

fn default_floor_date() -> String {
    "2022-01-01".to_string()
}

fn default_accounting_method() -> String {
    "Accrual".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            floor_date: default_floor_date(),
            accounting_method: default_accounting_method(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.database.path, "ledgersync.db");
        assert_eq!(config.sync.floor_date, "2022-01-01");
        assert_eq!(config.sync.accounting_method, "Accrual");
        assert_eq!(config.provider.minor_version, 73);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let toml_str = r#"
            [provider]
            company_id = "1234567890"
            redirect_uri = "https://example.com/callback"

            [sync]
            floor_date = "2020-06-01"
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.company_id, "1234567890");
        assert_eq!(config.provider.redirect_uri, "https://example.com/callback");
        assert_eq!(config.sync.floor_date, "2020-06-01");
        // Untouched sections keep defaults
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.sync.accounting_method, "Accrual");
    }
}
