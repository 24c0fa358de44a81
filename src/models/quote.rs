use crate::services::signing::QuoteClaims;
use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub chain_id: u64,
    /// Fiat total owed, computed by the cart/invoice system.
    pub fiat_total: f64,
}

/// A time-limited statement of how much native asset settles a fiat total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: String,
    pub chain_id: u64,
    pub network_name: String,
    pub merchant_address: String,
    pub native_symbol: String,
    /// Serialized as `0x` hex, ready to be used as the transaction value.
    pub expected_amount_minor_units: U256,
    pub display_amount: String,
    pub fiat_currency: String,
    pub fiat_total: f64,
    pub fee_buffer_percent: f64,
    pub explorer_base_url: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    /// HMAC over [`Quote::claims`], echoed back on submission.
    pub signature: String,
}

impl Quote {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn claims(&self) -> QuoteClaims<'_> {
        QuoteClaims {
            quote_id: &self.quote_id,
            chain_id: self.chain_id,
            merchant_address: &self.merchant_address,
            expected_amount_minor_units: self.expected_amount_minor_units,
            expires_at: self.expires_at,
        }
    }
}
