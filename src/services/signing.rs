use chrono::{DateTime, Utc};
use ethers::types::U256;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// The quote fields a submission is bound to.
#[derive(Debug, Clone, Copy)]
pub struct QuoteClaims<'a> {
    pub quote_id: &'a str,
    pub chain_id: u64,
    pub merchant_address: &'a str,
    pub expected_amount_minor_units: U256,
    pub expires_at: DateTime<Utc>,
}

impl QuoteClaims<'_> {
    fn payload(&self) -> String {
        format!(
            "{}|{}|{}|0x{:x}|{}",
            self.quote_id,
            self.chain_id,
            self.merchant_address.to_ascii_lowercase(),
            self.expected_amount_minor_units,
            self.expires_at.timestamp()
        )
    }
}

/// HMAC-SHA256 signer for issued quotes.
#[derive(Clone)]
pub struct QuoteSigner {
    key: Arc<[u8]>,
}

impl QuoteSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: Arc::from(secret),
        }
    }

    /// Random per-process key. Signatures do not survive a restart.
    pub fn ephemeral() -> Self {
        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(Uuid::new_v4().as_bytes());
        key.extend_from_slice(Uuid::new_v4().as_bytes());
        Self::new(&key)
    }

    fn mac(&self, claims: &QuoteClaims<'_>) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(claims.payload().as_bytes());
        Some(mac)
    }

    /// Lower-case hex signature, empty if the key was rejected.
    pub fn sign(&self, claims: &QuoteClaims<'_>) -> String {
        self.mac(claims)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, claims: &QuoteClaims<'_>, signature: &str) -> bool {
        let signature = signature.trim();
        let signature = signature.strip_prefix("0x").unwrap_or(signature);
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        match self.mac(claims) {
            Some(mac) => mac.verify_slice(&bytes).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for QuoteSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QuoteSigner(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn claims(amount: u64) -> QuoteClaims<'static> {
        QuoteClaims {
            quote_id: "abc123",
            chain_id: 1,
            merchant_address: "0x742d35cc6634c0532925a3b844bc9e7595f0bebb",
            expected_amount_minor_units: U256::from(amount),
            expires_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = QuoteSigner::new(b"secret");
        let signature = signer.sign(&claims(1000));

        assert_eq!(signature.len(), 64);
        assert!(signer.verify(&claims(1000), &signature));
        assert!(signer.verify(&claims(1000), &format!("0x{}", signature.to_uppercase())));
    }

    #[test]
    fn test_any_changed_field_fails() {
        let signer = QuoteSigner::new(b"secret");
        let signature = signer.sign(&claims(1000));

        assert!(!signer.verify(&claims(999), &signature));

        let mut other_chain = claims(1000);
        other_chain.chain_id = 56;
        assert!(!signer.verify(&other_chain, &signature));

        let mut later = claims(1000);
        later.expires_at = later.expires_at + chrono::Duration::seconds(1);
        assert!(!signer.verify(&later, &signature));

        assert!(!signer.verify(&claims(1000), "not-hex"));
        assert!(!QuoteSigner::new(b"other").verify(&claims(1000), &signature));
    }

    #[test]
    fn test_ephemeral_keys_differ() {
        let a = QuoteSigner::ephemeral();
        let b = QuoteSigner::ephemeral();
        assert_ne!(a.sign(&claims(1)), b.sign(&claims(1)));
    }
}
