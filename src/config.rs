use crate::{
    codec,
    models::{default_networks, RawNetwork},
    services::{
        price::{DEFAULT_COINGECKO_URL, DEFAULT_CRYPTOCOMPARE_URL},
        quote::MAX_QUOTE_TTL_SECONDS,
        CancelPolicy, NotificationSettings, QuoteSettings, ReconcileSettings,
    },
};
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// One year.
pub const MAX_STALE_MINUTES: u64 = 525_600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Networks
    pub networks: Vec<RawNetwork>,

    // Quotes and pricing
    pub quote: QuoteSettings,
    pub quote_ttl_seconds: u64,
    pub quote_signing_secret: Option<String>,
    pub coingecko_url: String,
    pub cryptocompare_url: String,
    pub price_timeout: Duration,
    pub price_cache_ttl: Duration,
    pub rpc_timeout: Duration,

    // Reconciliation
    pub reconcile: ReconcileSettings,

    // Notifications
    pub notify: NotificationSettings,
    pub notify_webhook_url: Option<String>,

    // Redis
    pub redis_url: Option<String>,

    // Admin and rate limiting
    pub admin_token: Option<String>,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment()?;
        let quote_ttl_seconds = parse_var("QUOTE_TTL_SECONDS", 600)?;

        let config = Self {
            environment: environment.clone(),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8080)?,

            networks: Self::parse_networks()?,

            quote: QuoteSettings::new(
                &std::env::var("FIAT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
                parse_var("FEE_BUFFER_PERCENT", 0.5)?,
                quote_ttl_seconds,
            ),
            quote_ttl_seconds,
            quote_signing_secret: non_empty_var("QUOTE_SIGNING_SECRET"),
            coingecko_url: std::env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_URL.to_string()),
            cryptocompare_url: std::env::var("CRYPTOCOMPARE_API_URL")
                .unwrap_or_else(|_| DEFAULT_CRYPTOCOMPARE_URL.to_string()),
            price_timeout: Duration::from_secs(parse_var("PRICE_TIMEOUT_SECONDS", 15)?),
            price_cache_ttl: Duration::from_secs(parse_var("PRICE_CACHE_SECONDS", 60)?),
            rpc_timeout: Duration::from_secs(parse_var("RPC_TIMEOUT_SECONDS", 20)?),

            reconcile: ReconcileSettings {
                enabled: parse_bool("RECONCILE_ENABLED", true)?,
                interval_minutes: ReconcileSettings::normalize_interval(parse_var(
                    "RECONCILE_INTERVAL_MINUTES",
                    5,
                )?),
                batch_size: parse_var("RECONCILE_BATCH_SIZE", 25)?,
                stale_minutes: parse_var("STALE_MINUTES", 30)?,
                cancel_policy: match std::env::var("CANCEL_POLICY") {
                    Ok(policy) => CancelPolicy::from_str(&policy)
                        .map_err(anyhow::Error::msg)
                        .context("Invalid CANCEL_POLICY")?,
                    Err(_) => CancelPolicy::NoTxOnly,
                },
            },

            notify: NotificationSettings {
                to: std::env::var("NOTIFY_TO").unwrap_or_default(),
                on_confirmed: parse_bool("NOTIFY_ON_CONFIRMED", true)?,
                on_failed: parse_bool("NOTIFY_ON_FAILED", true)?,
            },
            notify_webhook_url: non_empty_var("NOTIFY_WEBHOOK_URL"),

            redis_url: non_empty_var("REDIS_URL"),

            admin_token: non_empty_var("ADMIN_TOKEN"),
            rate_limit_per_second: parse_var("RATE_LIMIT_PER_SECOND", 10)?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", 30)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment() -> Result<Environment> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testnet" | "test" => Ok(Environment::Testnet),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    /// `NETWORKS_FILE`, then `NETWORKS_JSON`, then the built-in list for `MERCHANT_ADDRESS`.
    fn parse_networks() -> Result<Vec<RawNetwork>> {
        if let Some(path) = non_empty_var("NETWORKS_FILE") {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read NETWORKS_FILE {}", path))?;
            return serde_json::from_str(&raw).context("Invalid network list in NETWORKS_FILE");
        }

        if let Some(raw) = non_empty_var("NETWORKS_JSON") {
            return serde_json::from_str(&raw).context("Invalid NETWORKS_JSON");
        }

        let merchant = std::env::var("MERCHANT_ADDRESS")
            .context("MERCHANT_ADDRESS required when no network list is configured")?;
        if codec::normalize_address(&merchant).is_none() {
            bail!("MERCHANT_ADDRESS must be a 20-byte 0x address");
        }
        Ok(default_networks(&merchant))
    }

    fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            bail!("At least one network must be configured");
        }
        if !self.coingecko_url.starts_with("http") {
            bail!("COINGECKO_API_URL must be HTTP(S) URL");
        }
        if !self.cryptocompare_url.starts_with("http") {
            bail!("CRYPTOCOMPARE_API_URL must be HTTP(S) URL");
        }
        if let Some(url) = &self.notify_webhook_url {
            if !url.starts_with("http") {
                bail!("NOTIFY_WEBHOOK_URL must be HTTP(S) URL");
            }
        }
        if self.reconcile.batch_size == 0 {
            bail!("RECONCILE_BATCH_SIZE must be positive");
        }
        if self.quote_ttl_seconds > MAX_QUOTE_TTL_SECONDS {
            bail!("QUOTE_TTL_SECONDS must be at most {}", MAX_QUOTE_TTL_SECONDS);
        }
        if self.reconcile.stale_minutes > MAX_STALE_MINUTES {
            bail!("STALE_MINUTES must be at most {}", MAX_STALE_MINUTES);
        }
        if self.environment == Environment::Production && self.quote_signing_secret.is_none() {
            tracing::warn!("QUOTE_SIGNING_SECRET is not set; quotes cannot outlive a restart");
        }
        if self.environment == Environment::Production && self.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN is not set; admin routes will reject every request");
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}

fn non_empty_var(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(var) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid {}", var)),
        None => Ok(default),
    }
}

fn parse_bool(var: &str, default: bool) -> Result<bool> {
    match non_empty_var(var).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("Invalid {}: expected a boolean", var),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            environment: Environment::Development,
            host: "127.0.0.1".to_string(),
            port: 8080,
            networks: default_networks("0x742d35cc6634c0532925a3b844bc9e7595f0bebb"),
            quote: QuoteSettings::new("USD", 0.5, 600),
            quote_ttl_seconds: 600,
            quote_signing_secret: Some("secret".to_string()),
            coingecko_url: DEFAULT_COINGECKO_URL.to_string(),
            cryptocompare_url: DEFAULT_CRYPTOCOMPARE_URL.to_string(),
            price_timeout: Duration::from_secs(15),
            price_cache_ttl: Duration::from_secs(60),
            rpc_timeout: Duration::from_secs(20),
            reconcile: ReconcileSettings::default(),
            notify: NotificationSettings {
                to: String::new(),
                on_confirmed: true,
                on_failed: true,
            },
            notify_webhook_url: None,
            redis_url: None,
            admin_token: None,
            rate_limit_per_second: 10,
            rate_limit_burst: 30,
        }
    }

    #[test]
    fn test_validate_bounds_durations() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.quote_ttl_seconds = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.reconcile.stale_minutes = MAX_STALE_MINUTES + 1;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.reconcile.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_helpers_use_defaults() {
        assert_eq!(parse_var::<u64>("CHAINPAY_TEST_UNSET_NUMBER", 25).unwrap(), 25);
        assert!(parse_bool("CHAINPAY_TEST_UNSET_BOOL", true).unwrap());
    }

    #[test]
    fn test_parse_helpers_read_values() {
        std::env::set_var("CHAINPAY_TEST_NUMBER", "42");
        std::env::set_var("CHAINPAY_TEST_BAD_NUMBER", "forty");
        std::env::set_var("CHAINPAY_TEST_BOOL", "No");

        assert_eq!(parse_var::<u32>("CHAINPAY_TEST_NUMBER", 1).unwrap(), 42);
        assert!(parse_var::<u32>("CHAINPAY_TEST_BAD_NUMBER", 1).is_err());
        assert!(!parse_bool("CHAINPAY_TEST_BOOL", true).unwrap());
    }
}
