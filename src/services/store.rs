use crate::models::{NewPayment, PaymentRecord, PaymentStatus, RecordId, RecordUpdate};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("record {0} already has a different tx hash")]
    TxConflict(RecordId),

    #[error("tx hash {0} already belongs to another record")]
    DuplicateTxHash(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result of an atomic single-record update.
#[derive(Debug, Clone)]
pub struct Applied {
    pub record: PaymentRecord,
    /// True when this update set a previously clear notification flag.
    pub notify: bool,
}

/// Persistence for payment records. Every method touches at most one record.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, new: NewPayment) -> Result<PaymentRecord, StoreError>;

    async fn get(&self, id: RecordId) -> Result<Option<PaymentRecord>, StoreError>;

    /// Ids of every record holding `tx_hash` (already normalized), at any status.
    async fn find_ids_by_tx_hash(&self, tx_hash: &str) -> Result<Vec<RecordId>, StoreError>;

    /// Up to `limit` records with status `pending`, newest first.
    /// With `before`, only records whose id is below it.
    async fn list_pending(
        &self,
        before: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<PaymentRecord>, StoreError>;

    /// Attach a hash to a record that has none. Re-attaching the same hash is a no-op.
    async fn attach_tx_hash(
        &self,
        id: RecordId,
        tx_hash: &str,
    ) -> Result<PaymentRecord, StoreError>;

    async fn apply(&self, id: RecordId, update: RecordUpdate) -> Result<Applied, StoreError>;
}

/// In-process store. Enforces global tx-hash uniqueness on every write.
pub struct MemoryPaymentStore {
    records: RwLock<HashMap<RecordId, PaymentRecord>>,
    next_id: AtomicU64,
}

impl Default for MemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub async fn backdate(&self, id: RecordId, created_at: chrono::DateTime<Utc>) {
        if let Some(record) = self.records.write().await.get_mut(&id) {
            record.created_at = created_at;
        }
    }
}

fn held_by_other(
    records: &HashMap<RecordId, PaymentRecord>,
    tx_hash: &str,
    owner: Option<RecordId>,
) -> bool {
    records.values().any(|record| {
        Some(record.record_id) != owner
            && record
                .tx_hash
                .as_deref()
                .is_some_and(|held| held.eq_ignore_ascii_case(tx_hash))
    })
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, new: NewPayment) -> Result<PaymentRecord, StoreError> {
        let mut records = self.records.write().await;

        if let Some(tx_hash) = new.tx_hash.as_deref() {
            if held_by_other(&records, tx_hash, None) {
                return Err(StoreError::DuplicateTxHash(tx_hash.to_string()));
            }
        }

        let now = Utc::now();
        let record = PaymentRecord {
            record_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            record_key: Uuid::new_v4().simple().to_string(),
            quote_id: new.quote_id,
            chain_id: new.chain_id,
            merchant_address: new.merchant_address,
            expected_amount_minor_units: new.expected_amount_minor_units,
            tx_hash: new.tx_hash,
            payer_address: new.payer_address,
            status: PaymentStatus::Pending,
            order_status: Default::default(),
            created_at: now,
            updated_at: now,
            notified_confirmed: false,
            notified_failed: false,
            notes: Vec::new(),
        };

        records.insert(record.record_id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: RecordId) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_ids_by_tx_hash(&self, tx_hash: &str) -> Result<Vec<RecordId>, StoreError> {
        let records = self.records.read().await;
        let mut ids: Vec<RecordId> = records
            .values()
            .filter(|record| {
                record
                    .tx_hash
                    .as_deref()
                    .is_some_and(|held| held.eq_ignore_ascii_case(tx_hash))
            })
            .map(|record| record.record_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn list_pending(
        &self,
        before: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let records = self.records.read().await;
        let mut pending: Vec<PaymentRecord> = records
            .values()
            .filter(|record| record.status == PaymentStatus::Pending)
            .filter(|record| before.map_or(true, |cursor| record.record_id < cursor))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.record_id.cmp(&a.record_id));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn attach_tx_hash(
        &self,
        id: RecordId,
        tx_hash: &str,
    ) -> Result<PaymentRecord, StoreError> {
        let mut records = self.records.write().await;

        let existing = records.get(&id).ok_or(StoreError::NotFound(id))?;
        match existing.tx_hash.as_deref() {
            Some(held) if held.eq_ignore_ascii_case(tx_hash) => return Ok(existing.clone()),
            Some(_) => return Err(StoreError::TxConflict(id)),
            None => {}
        }

        if held_by_other(&records, tx_hash, Some(id)) {
            return Err(StoreError::DuplicateTxHash(tx_hash.to_string()));
        }

        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.tx_hash = Some(tx_hash.to_string());
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn apply(&self, id: RecordId, update: RecordUpdate) -> Result<Applied, StoreError> {
        let mut records = self.records.write().await;

        let existing = records.get(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(tx_hash) = update.tx_hash.as_deref() {
            if let Some(held) = existing.tx_hash.as_deref() {
                if !held.eq_ignore_ascii_case(tx_hash) {
                    return Err(StoreError::TxConflict(id));
                }
            }
            if held_by_other(&records, tx_hash, Some(id)) {
                return Err(StoreError::DuplicateTxHash(tx_hash.to_string()));
            }
        }

        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(order_status) = update.order_status {
            record.order_status = record.order_status.transition(order_status);
        }
        if let Some(tx_hash) = update.tx_hash {
            record.tx_hash = Some(tx_hash);
        }
        if let Some(payer) = update.payer_address {
            record.payer_address = Some(payer);
        }
        if let Some(note) = update.note {
            record.notes.push(note);
        }

        let notify = match update.claim_notification {
            Some(kind) if !record.notified(kind) => {
                record.set_notified(kind);
                true
            }
            _ => false,
        };

        record.updated_at = Utc::now();
        Ok(Applied {
            record: record.clone(),
            notify,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationKind, OrderStatus};

    const HASH_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn new_payment(tx_hash: Option<&str>) -> NewPayment {
        NewPayment {
            quote_id: "q1".to_string(),
            chain_id: 1,
            merchant_address: "0x742d35cc6634c0532925a3b844bc9e7595f0bebb".to_string(),
            expected_amount_minor_units: "0x38d7ea4c68000".to_string(),
            tx_hash: tx_hash.map(str::to_string),
            payer_address: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_keys() {
        let store = MemoryPaymentStore::new();
        let first = store.insert(new_payment(None)).await.unwrap();
        let second = store.insert(new_payment(None)).await.unwrap();

        assert_eq!(first.record_id, 1);
        assert_eq!(second.record_id, 2);
        assert_eq!(first.status, PaymentStatus::Pending);
        assert_eq!(first.order_status, OrderStatus::AwaitingPayment);
        assert_eq!(first.record_key.len(), 32);
        assert_ne!(first.record_key, second.record_key);
    }

    #[tokio::test]
    async fn test_duplicate_hash_rejected_on_write() {
        let store = MemoryPaymentStore::new();
        store.insert(new_payment(Some(HASH_A))).await.unwrap();

        let err = store.insert(new_payment(Some(HASH_A))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTxHash(_)));

        let other = store.insert(new_payment(None)).await.unwrap();
        let upper = HASH_A.to_uppercase().replace("0X", "0x");
        let err = store.attach_tx_hash(other.record_id, &upper).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTxHash(_)));
    }

    #[tokio::test]
    async fn test_attach_once() {
        let store = MemoryPaymentStore::new();
        let record = store.insert(new_payment(None)).await.unwrap();

        store.attach_tx_hash(record.record_id, HASH_A).await.unwrap();
        store.attach_tx_hash(record.record_id, HASH_A).await.unwrap();
        let err = store.attach_tx_hash(record.record_id, HASH_B).await.unwrap_err();
        assert_eq!(err, StoreError::TxConflict(record.record_id));

        assert_eq!(
            store.find_ids_by_tx_hash(HASH_A).await.unwrap(),
            vec![record.record_id]
        );
    }

    #[tokio::test]
    async fn test_notification_claimed_once() {
        let store = MemoryPaymentStore::new();
        let record = store.insert(new_payment(Some(HASH_A))).await.unwrap();

        let update = RecordUpdate {
            status: Some(PaymentStatus::Confirmed),
            order_status: Some(OrderStatus::Paid),
            claim_notification: Some(NotificationKind::Confirmed),
            ..Default::default()
        };
        let first = store.apply(record.record_id, update.clone()).await.unwrap();
        let second = store.apply(record.record_id, update).await.unwrap();

        assert!(first.notify);
        assert!(!second.notify);
        assert!(second.record.notified_confirmed);
        assert_eq!(second.record.order_status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_list_pending_newest_first() {
        let store = MemoryPaymentStore::new();
        let a = store.insert(new_payment(None)).await.unwrap();
        let b = store.insert(new_payment(None)).await.unwrap();
        let c = store.insert(new_payment(None)).await.unwrap();
        let d = store.insert(new_payment(None)).await.unwrap();
        store
            .apply(
                b.record_id,
                RecordUpdate {
                    status: Some(PaymentStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let ids = |records: Vec<PaymentRecord>| -> Vec<RecordId> {
            records.iter().map(|r| r.record_id).collect()
        };

        let pending = store.list_pending(None, 10).await.unwrap();
        assert_eq!(ids(pending), vec![d.record_id, c.record_id, a.record_id]);

        let first = store.list_pending(None, 1).await.unwrap();
        assert_eq!(ids(first), vec![d.record_id]);

        let page = store.list_pending(Some(d.record_id), 10).await.unwrap();
        assert_eq!(ids(page), vec![c.record_id, a.record_id]);
        assert!(store.list_pending(Some(a.record_id), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record() {
        let store = MemoryPaymentStore::new();
        assert!(store.get(42).await.unwrap().is_none());
        assert_eq!(
            store.apply(42, RecordUpdate::default()).await.unwrap_err(),
            StoreError::NotFound(42)
        );
    }
}
