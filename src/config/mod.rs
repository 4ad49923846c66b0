pub mod database;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub use database::DatabaseConfig;

/// Supplier used when a line has no specific supplier of record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSupplier {
    pub id: i64,
    pub name: String,
}

impl Default for DefaultSupplier {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Proveedor genérico".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErpClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Retries apply to read-only calls only.
    pub max_retries: u32,
}

impl ErpClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            anyhow::bail!("ERP_ENDPOINT is required");
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            anyhow::bail!("ERP_ENDPOINT must be an http(s) URL");
        }
        if self.api_key.is_empty() {
            anyhow::bail!("ERP_API_KEY is required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub default_supplier: DefaultSupplier,
    /// A `pending` run older than this is considered crashed.
    pub pending_timeout: Duration,
    /// Planned margin sent on the package container reservation.
    pub package_margin_pct: Decimal,
    /// When false, reservations are created flat under the case and carry
    /// their own sell price.
    pub package_container: bool,
    /// ISO country code classified as domestic.
    pub home_country: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_supplier: DefaultSupplier::default(),
            pending_timeout: Duration::from_secs(300),
            package_margin_pct: Decimal::from(10),
            package_container: true,
            home_country: "ES".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub erp: ErpClientConfig,
    pub sync: SyncConfig,
    pub sync_error_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let cors_origins = var_or("CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let erp = ErpClientConfig {
            endpoint: lookup("ERP_ENDPOINT").context("ERP_ENDPOINT must be set")?,
            api_key: lookup("ERP_API_KEY").context("ERP_API_KEY must be set")?,
            timeout: Duration::from_secs(
                parse_var("ERP_TIMEOUT_SECS", &var_or("ERP_TIMEOUT_SECS", "60"))?,
            ),
            max_retries: parse_var("ERP_MAX_RETRIES", &var_or("ERP_MAX_RETRIES", "3"))?,
        };
        erp.validate()?;

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            default_supplier: DefaultSupplier {
                id: parse_var(
                    "DEFAULT_SUPPLIER_ID",
                    &var_or("DEFAULT_SUPPLIER_ID", &defaults.default_supplier.id.to_string()),
                )?,
                name: var_or("DEFAULT_SUPPLIER_NAME", &defaults.default_supplier.name),
            },
            pending_timeout: Duration::from_secs(parse_var(
                "SYNC_PENDING_TIMEOUT_SECS",
                &var_or("SYNC_PENDING_TIMEOUT_SECS", "300"),
            )?),
            package_margin_pct: parse_var("PACKAGE_MARGIN_PCT", &var_or("PACKAGE_MARGIN_PCT", "10"))?,
            package_container: parse_var(
                "PACKAGE_CONTAINER_ENABLED",
                &var_or("PACKAGE_CONTAINER_ENABLED", "true"),
            )?,
            home_country: var_or("HOME_COUNTRY", &defaults.home_country).to_uppercase(),
        };

        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            server_host: var_or("SERVER_HOST", "0.0.0.0"),
            server_port: parse_var("SERVER_PORT", &var_or("SERVER_PORT", "8080"))?,
            cors_origins,
            erp,
            sync,
            sync_error_webhook_url: lookup("SYNC_ERROR_WEBHOOK_URL").filter(|s| !s.is_empty()),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e))
}
