use crate::{
    codec,
    error::{ChainPayError, Result},
    models::{
        NewPayment, RecordId, RecordUpdate, SubmitPaymentRequest, SubmittedPayment, Verdict,
        VerifyRequest,
    },
    services::{
        networks::NetworkRegistry, quote::QuoteBuilder, replay::AntiReplayGuard,
        signing::QuoteClaims, store::PaymentStore, verifier::TransactionVerifier,
    },
};
use std::sync::Arc;

/// Entry points that create and verify payment records.
pub struct PaymentService {
    registry: Arc<NetworkRegistry>,
    quotes: Arc<QuoteBuilder>,
    store: Arc<dyn PaymentStore>,
    guard: AntiReplayGuard,
    verifier: Arc<TransactionVerifier>,
}

impl PaymentService {
    pub fn new(
        registry: Arc<NetworkRegistry>,
        quotes: Arc<QuoteBuilder>,
        store: Arc<dyn PaymentStore>,
        verifier: Arc<TransactionVerifier>,
    ) -> Self {
        let guard = AntiReplayGuard::new(store.clone());
        Self {
            registry,
            quotes,
            store,
            guard,
            verifier,
        }
    }

    /// Open a pending record from the checkout payload.
    ///
    /// While the quote is still cached its chain, merchant and amount are
    /// binding: a payload that asks for less than was quoted is rejected.
    /// Once it has left the cache the payload must carry the quote's signature
    /// and expiry, and the signature must cover exactly the submitted fields.
    pub async fn submit(&self, req: SubmitPaymentRequest) -> Result<SubmittedPayment> {
        let quote_id = req.quote_id.trim();
        if quote_id.is_empty() {
            return Err(ChainPayError::MissingField("quoteId"));
        }
        if !quote_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ChainPayError::InvalidInput("quoteId"));
        }

        let network = self
            .registry
            .get(req.chain_id)
            .ok_or(ChainPayError::UnsupportedNetwork(req.chain_id))?;

        let merchant = codec::normalize_address(&req.merchant_address)
            .ok_or(ChainPayError::InvalidInput("merchantAddress"))?;
        if merchant != network.merchant_address {
            return Err(ChainPayError::InvalidInput("merchantAddress"));
        }

        let expected = codec::sanitize_hex(&req.expected_amount_minor_units)
            .and_then(|hex| codec::hex_to_u256(&hex))
            .filter(|amount| !amount.is_zero())
            .ok_or(ChainPayError::InvalidAmount)?;

        match self.quotes.get(quote_id).await {
            Ok(quote) => {
                if !self.quotes.verify_signature(&quote.claims(), &quote.signature) {
                    tracing::warn!(quote_id, "Cached quote failed its signature check");
                    return Err(ChainPayError::InvalidQuoteSignature);
                }
                if quote.chain_id != req.chain_id
                    || quote.merchant_address != merchant
                    || expected < quote.expected_amount_minor_units
                {
                    tracing::warn!(
                        quote_id,
                        chain_id = req.chain_id,
                        "Submission does not match quote"
                    );
                    return Err(ChainPayError::InvalidAmount);
                }
            }
            Err(ChainPayError::QuoteNotFound) => {
                let (Some(signature), Some(expires_at)) =
                    (req.quote_signature.as_deref(), req.quote_expires_at)
                else {
                    return Err(ChainPayError::QuoteNotFound);
                };
                let claims = QuoteClaims {
                    quote_id,
                    chain_id: req.chain_id,
                    merchant_address: &merchant,
                    expected_amount_minor_units: expected,
                    expires_at,
                };
                if !self.quotes.verify_signature(&claims, signature) {
                    tracing::warn!(
                        quote_id,
                        chain_id = req.chain_id,
                        "Quote signature does not match submission"
                    );
                    return Err(ChainPayError::InvalidQuoteSignature);
                }
            }
            Err(e) => return Err(e),
        }

        let tx_hash = req.tx_hash.as_deref().map(str::trim).filter(|h| !h.is_empty());
        let tx_hash = match tx_hash {
            Some(raw) => {
                let tx_hash =
                    codec::normalize_tx_hash(raw).ok_or(ChainPayError::InvalidInput("txHash"))?;
                if self.guard.is_claimed_by_other(&tx_hash, None).await? {
                    return Err(ChainPayError::TxAlreadyClaimed);
                }
                Some(tx_hash)
            }
            None => None,
        };

        let payer_address = match req
            .payer_address
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            Some(raw) => Some(
                codec::normalize_address(raw).ok_or(ChainPayError::InvalidInput("payerAddress"))?,
            ),
            None => None,
        };

        let record = self
            .store
            .insert(NewPayment {
                quote_id: quote_id.to_string(),
                chain_id: req.chain_id,
                merchant_address: merchant,
                expected_amount_minor_units: format!("0x{:x}", expected),
                tx_hash,
                payer_address,
            })
            .await?;

        tracing::info!(
            record_id = record.record_id,
            chain_id = record.chain_id,
            has_tx = record.tx_hash.is_some(),
            "Payment record created"
        );

        Ok(SubmittedPayment {
            record_id: record.record_id,
            record_key: record.record_key,
            status: record.status,
        })
    }

    /// Buyer-side poll: attach the hash once, then verify against the chain.
    pub async fn verify(&self, req: VerifyRequest) -> Result<Verdict> {
        if req.record_id == 0 {
            return Err(ChainPayError::MissingField("recordId"));
        }
        if req.record_key.trim().is_empty() {
            return Err(ChainPayError::MissingField("recordKey"));
        }
        let tx_hash =
            codec::sanitize_hex(&req.tx_hash).ok_or(ChainPayError::MissingField("txHash"))?;
        let tx_hash =
            codec::normalize_tx_hash(&tx_hash).ok_or(ChainPayError::InvalidInput("txHash"))?;

        let record = self
            .store
            .get(req.record_id)
            .await?
            .filter(|record| record.record_key == req.record_key.trim())
            .ok_or(ChainPayError::InvalidRecord)?;

        if self.guard.is_claimed_by_other(&tx_hash, Some(record.record_id)).await? {
            return Err(ChainPayError::TxAlreadyClaimed);
        }

        let record = match record.tx_hash.as_deref() {
            Some(held) if !held.eq_ignore_ascii_case(&tx_hash) => {
                return Err(ChainPayError::DifferentTxStored);
            }
            Some(_) => record,
            None => self.store.attach_tx_hash(record.record_id, &tx_hash).await?,
        };

        self.verifier.verify(&record).await
    }

    /// Operator-triggered verification. Every failure is noted on the record.
    pub async fn manual_verify(&self, record_id: RecordId) -> Result<Verdict> {
        let record = self
            .store
            .get(record_id)
            .await?
            .ok_or(ChainPayError::RecordNotFound(record_id))?;

        let result = self.verifier.verify(&record).await;
        let note = match &result {
            Ok(Verdict::Pending) => {
                Some("Manual verification: pending (no receipt yet)".to_string())
            }
            Ok(_) => None,
            Err(e) => Some(format!("Manual verification: {}", e.public_message())),
        };

        if let Some(note) = note {
            let update = RecordUpdate {
                note: Some(note),
                ..Default::default()
            };
            if let Err(e) = self.store.apply(record_id, update).await {
                tracing::warn!(record_id, "Failed to add audit note: {}", e);
            }
        }

        tracing::info!(record_id, ok = result.is_ok(), "Manual verification");
        result
    }
}
