use crate::{
    codec,
    error::{ChainPayError, Result},
    models::{NotificationKind, OrderStatus, PaymentRecord, PaymentStatus, RecordUpdate, Verdict},
    services::{
        networks::NetworkRegistry, notify::NotificationService, replay::AntiReplayGuard,
        rpc::RpcClient, store::PaymentStore,
    },
};
use ethers::types::U256;
use std::sync::Arc;

/// Decides whether a record's on-chain transaction settles it.
///
/// `Ok(Verdict::Pending)` and the soft errors (`TransactionNotFound`,
/// `WrongRecipient`, `Underpaid`, `AmountCheckUnavailable`) leave the record
/// untouched and may be retried. `Failed` and `Confirmed` are written to the
/// store together with their one-time notification claim.
pub struct TransactionVerifier {
    registry: Arc<NetworkRegistry>,
    rpc: RpcClient,
    store: Arc<dyn PaymentStore>,
    guard: AntiReplayGuard,
    notifications: NotificationService,
}

impl TransactionVerifier {
    pub fn new(
        registry: Arc<NetworkRegistry>,
        rpc: RpcClient,
        store: Arc<dyn PaymentStore>,
        notifications: NotificationService,
    ) -> Self {
        let guard = AntiReplayGuard::new(store.clone());
        Self {
            registry,
            rpc,
            store,
            guard,
            notifications,
        }
    }

    pub async fn verify(&self, record: &PaymentRecord) -> Result<Verdict> {
        let id = record.record_id;
        let tx_hash = record
            .tx_hash
            .as_deref()
            .and_then(codec::normalize_tx_hash)
            .ok_or(ChainPayError::MissingTxHash)?;

        if self.guard.is_claimed_by_other(&tx_hash, Some(id)).await? {
            return Err(ChainPayError::TxAlreadyClaimed);
        }

        let network = self
            .registry
            .get(record.chain_id)
            .ok_or(ChainPayError::UnsupportedNetwork(record.chain_id))?;
        let endpoints = &network.rpc_endpoints;

        let Some(receipt) = self.rpc.transaction_receipt(endpoints, &tx_hash).await else {
            tracing::debug!(record_id = id, tx_hash = %tx_hash, "No receipt yet");
            return Ok(Verdict::Pending);
        };

        if !receipt.succeeded() {
            let update = RecordUpdate {
                status: Some(PaymentStatus::Failed),
                note: (record.status != PaymentStatus::Failed)
                    .then(|| format!("Tx failed: {}", tx_hash)),
                claim_notification: self.notifications.claim(NotificationKind::Failed),
                ..Default::default()
            };
            let applied = self.store.apply(id, update).await?;
            tracing::info!(
                record_id = id,
                tx_hash = %tx_hash,
                chain_id = network.chain_id,
                "Payment failed on-chain"
            );

            if applied.notify {
                self.notifications
                    .deliver(NotificationKind::Failed, &applied.record, network, &tx_hash)
                    .await;
            }
            return Ok(Verdict::Failed);
        }

        let tx = self
            .rpc
            .transaction_by_hash(endpoints, &tx_hash)
            .await
            .ok_or(ChainPayError::TransactionNotFound)?;

        let recipient = tx.to.as_deref().and_then(codec::normalize_address);
        if recipient.as_deref() != Some(network.merchant_address.as_str()) {
            tracing::info!(record_id = id, tx_hash = %tx_hash, "Wrong recipient");
            return Err(ChainPayError::WrongRecipient);
        }

        let expected = codec::hex_to_u256(&record.expected_amount_minor_units)
            .filter(|amount| !amount.is_zero())
            .ok_or(ChainPayError::AmountCheckUnavailable)?;
        let paid = tx
            .value
            .as_deref()
            .and_then(codec::hex_to_u256)
            .unwrap_or_else(U256::zero);
        if paid < expected {
            tracing::info!(record_id = id, tx_hash = %tx_hash, %paid, %expected, "Underpaid");
            return Err(ChainPayError::Underpaid);
        }

        let update = RecordUpdate {
            status: Some(PaymentStatus::Confirmed),
            order_status: Some(OrderStatus::Paid),
            tx_hash: Some(tx_hash.clone()),
            payer_address: tx.from.as_deref().and_then(codec::normalize_address),
            note: (record.status != PaymentStatus::Confirmed)
                .then(|| format!("Payment confirmed. Tx: {}", tx_hash)),
            claim_notification: self.notifications.claim(NotificationKind::Confirmed),
        };
        let applied = self.store.apply(id, update).await?;
        tracing::info!(
            record_id = id,
            tx_hash = %tx_hash,
            chain_id = network.chain_id,
            "Payment confirmed"
        );

        if applied.notify {
            self.notifications
                .deliver(NotificationKind::Confirmed, &applied.record, network, &tx_hash)
                .await;
        }
        Ok(Verdict::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{hash, Harness, MERCHANT, PAYER};

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let mut h = Harness::new().await;
        let tx = hash(1);
        h.receipt(&tx, "0x1").await;
        h.transaction(&tx, MERCHANT, "0x3e8").await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert_eq!(h.verifier.verify(&record).await.unwrap(), Verdict::Confirmed);
        let stored = h.store.get(record.record_id).await.unwrap().unwrap();
        assert_eq!(h.verifier.verify(&stored).await.unwrap(), Verdict::Confirmed);

        let stored = h.store.get(record.record_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Confirmed);
        assert_eq!(stored.order_status, OrderStatus::Paid);
        assert_eq!(stored.payer_address.as_deref(), Some(PAYER));
        assert!(stored.notified_confirmed);
        assert_eq!(stored.notes.len(), 1);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_overpayment_confirms() {
        let mut h = Harness::new().await;
        let tx = hash(2);
        h.receipt(&tx, "0x1").await;
        h.transaction(&tx, MERCHANT, "0x3e9").await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert_eq!(h.verifier.verify(&record).await.unwrap(), Verdict::Confirmed);
    }

    #[tokio::test]
    async fn test_underpaid_stays_pending() {
        let mut h = Harness::new().await;
        let tx = hash(3);
        h.receipt(&tx, "0x1").await;
        h.transaction(&tx, MERCHANT, "0x3e7").await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert!(matches!(
            h.verifier.verify(&record).await,
            Err(ChainPayError::Underpaid)
        ));
        let stored = h.store.get(record.record_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_recipient() {
        let mut h = Harness::new().await;
        let tx = hash(4);
        h.receipt(&tx, "0x1").await;
        h.transaction(&tx, PAYER, "0x3e8").await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert!(matches!(
            h.verifier.verify(&record).await,
            Err(ChainPayError::WrongRecipient)
        ));
    }

    #[tokio::test]
    async fn test_missing_expected_amount_fails_closed() {
        let mut h = Harness::new().await;
        let tx = hash(5);
        h.receipt(&tx, "0x1").await;
        h.transaction(&tx, MERCHANT, "0x3e8").await;
        let record = h.record("0x0", Some(&tx)).await;

        assert!(matches!(
            h.verifier.verify(&record).await,
            Err(ChainPayError::AmountCheckUnavailable)
        ));
        let stored = h.store.get(record.record_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_receipt_notifies_once() {
        let mut h = Harness::new().await;
        let tx = hash(6);
        h.receipt(&tx, "0x0").await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert_eq!(h.verifier.verify(&record).await.unwrap(), Verdict::Failed);
        assert_eq!(h.verifier.verify(&record).await.unwrap(), Verdict::Failed);

        let stored = h.store.get(record.record_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.order_status, OrderStatus::AwaitingPayment);
        assert!(stored.notified_failed);
        assert_eq!(h.notifier.sent().len(), 1);
        assert!(h.notifier.sent()[0].0.contains("FAILED"));
    }

    #[tokio::test]
    async fn test_no_receipt_is_pending() {
        let mut h = Harness::new().await;
        let tx = hash(7);
        h.no_receipt(&tx).await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert_eq!(h.verifier.verify(&record).await.unwrap(), Verdict::Pending);
        let stored = h.store.get(record.record_id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_missing_transaction_is_soft() {
        let mut h = Harness::new().await;
        let tx = hash(8);
        h.receipt(&tx, "0x1").await;
        let record = h.record("0x3e8", Some(&tx)).await;

        assert!(matches!(
            h.verifier.verify(&record).await,
            Err(ChainPayError::TransactionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_missing_hash_and_unknown_network() {
        let h = Harness::new().await;
        let record = h.record("0x3e8", None).await;
        assert!(matches!(
            h.verifier.verify(&record).await,
            Err(ChainPayError::MissingTxHash)
        ));

        let mut foreign = record.clone();
        foreign.tx_hash = Some(hash(9));
        foreign.chain_id = 999;
        assert!(matches!(
            h.verifier.verify(&foreign).await,
            Err(ChainPayError::UnsupportedNetwork(999))
        ));
    }

    #[tokio::test]
    async fn test_hash_held_elsewhere_is_rejected() {
        let h = Harness::new().await;
        let tx = hash(10);
        h.record("0x3e8", Some(&tx)).await;

        // A stale copy claiming the same hash, as if read before the other write landed.
        let mut other = h.record("0x3e8", None).await;
        other.tx_hash = Some(tx);
        assert!(matches!(
            h.verifier.verify(&other).await,
            Err(ChainPayError::TxAlreadyClaimed)
        ));
    }
}
