use crate::{
    codec,
    error::{ChainPayError, Result},
    models::Quote,
    services::{
        cache::CacheService,
        networks::NetworkRegistry,
        price::PriceOracle,
        signing::{QuoteClaims, QuoteSigner},
    },
};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const MAX_FEE_BUFFER_PERCENT: f64 = 10.0;
pub const MIN_QUOTE_TTL_SECONDS: u64 = 60;
pub const MAX_QUOTE_TTL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub fiat_currency: String,
    pub fee_buffer_percent: f64,
    pub ttl: Duration,
}

impl QuoteSettings {
    /// Clamp the buffer into `[0, 10]` and the lifetime into `[60s, 1 day]`.
    pub fn new(fiat_currency: &str, fee_buffer_percent: f64, ttl_seconds: u64) -> Self {
        let fee_buffer_percent = if fee_buffer_percent.is_finite() {
            fee_buffer_percent.clamp(0.0, MAX_FEE_BUFFER_PERCENT)
        } else {
            0.0
        };

        Self {
            fiat_currency: fiat_currency.trim().to_ascii_uppercase(),
            fee_buffer_percent,
            ttl: Duration::from_secs(
                ttl_seconds.clamp(MIN_QUOTE_TTL_SECONDS, MAX_QUOTE_TTL_SECONDS),
            ),
        }
    }
}

/// Turns a fiat total into a time-limited native-asset quote.
pub struct QuoteBuilder {
    registry: Arc<NetworkRegistry>,
    oracle: Arc<PriceOracle>,
    cache: CacheService,
    settings: QuoteSettings,
    signer: QuoteSigner,
}

impl QuoteBuilder {
    /// `cache` should be built with `settings.ttl` as its lifetime.
    pub fn new(
        registry: Arc<NetworkRegistry>,
        oracle: Arc<PriceOracle>,
        cache: CacheService,
        settings: QuoteSettings,
        signer: QuoteSigner,
    ) -> Self {
        Self {
            registry,
            oracle,
            cache,
            settings,
            signer,
        }
    }

    /// True when `signature` was issued by this service for exactly these claims.
    pub fn verify_signature(&self, claims: &QuoteClaims<'_>, signature: &str) -> bool {
        self.signer.verify(claims, signature)
    }

    pub fn settings(&self) -> &QuoteSettings {
        &self.settings
    }

    pub async fn build(&self, chain_id: u64, fiat_total: f64) -> Result<Quote> {
        if !fiat_total.is_finite() || fiat_total <= 0.0 {
            return Err(ChainPayError::InvalidTotal);
        }

        let network = self
            .registry
            .get(chain_id)
            .ok_or(ChainPayError::UnsupportedNetwork(chain_id))?;

        let fiat = &self.settings.fiat_currency;
        let price = self
            .oracle
            .price_of(&network.price_feed_id, &network.native_symbol, fiat)
            .await
            .ok_or(ChainPayError::PricingUnavailable)?;

        let buffer = self.settings.fee_buffer_percent;
        let buffered_fiat = fiat_total * (1.0 + buffer / 100.0);
        let native_amount = buffered_fiat / price;

        let minor_units = codec::float_amount_to_minor_units(native_amount, codec::NATIVE_DECIMALS);
        let expected = codec::decimal_to_u256(&minor_units)
            .filter(|amount| !amount.is_zero())
            .ok_or(ChainPayError::InvalidAmount)?;

        let issued_at = Utc::now();
        let ttl_seconds = self.settings.ttl.as_secs();
        let mut quote = Quote {
            quote_id: Uuid::new_v4().simple().to_string(),
            chain_id,
            network_name: network.name.clone(),
            merchant_address: network.merchant_address.clone(),
            native_symbol: network.native_symbol.clone(),
            expected_amount_minor_units: expected,
            display_amount: codec::minor_units_to_display(
                &minor_units,
                codec::DISPLAY_FRACTION_DIGITS,
            ),
            fiat_currency: fiat.clone(),
            fiat_total,
            fee_buffer_percent: buffer,
            explorer_base_url: network.explorer_base_url.clone(),
            issued_at,
            expires_at: issued_at + ChronoDuration::seconds(ttl_seconds as i64),
            ttl_seconds,
            signature: String::new(),
        };
        quote.signature = self.signer.sign(&quote.claims());

        self.cache
            .set(&quote.quote_id, &quote)
            .await
            .map_err(|e| ChainPayError::CacheError(e.to_string()))?;

        tracing::info!(
            quote_id = %quote.quote_id,
            chain_id,
            fiat_total,
            price,
            amount = %quote.display_amount,
            "Quote issued"
        );

        Ok(quote)
    }

    /// A previously issued quote, while it is still cached and unexpired.
    pub async fn get(&self, quote_id: &str) -> Result<Quote> {
        let quote_id = quote_id.trim();
        if quote_id.is_empty() || !quote_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ChainPayError::QuoteNotFound);
        }

        self.cache
            .get::<Quote>(quote_id)
            .await
            .map_err(|e| ChainPayError::CacheError(e.to_string()))?
            .filter(|quote| !quote.is_expired_at(Utc::now()))
            .ok_or(ChainPayError::QuoteNotFound)
    }
}
