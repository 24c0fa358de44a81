use crate::{
    codec,
    error::Result,
    models::RecordId,
    services::store::PaymentStore,
};
use std::sync::Arc;

/// Global check that one on-chain transaction settles at most one record.
#[derive(Clone)]
pub struct AntiReplayGuard {
    store: Arc<dyn PaymentStore>,
}

impl AntiReplayGuard {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    /// True when any record other than `excluding` holds `tx_hash`, whatever its status.
    ///
    /// A hash that does not normalize is never claimed; callers reject it on its own.
    pub async fn is_claimed_by_other(
        &self,
        tx_hash: &str,
        excluding: Option<RecordId>,
    ) -> Result<bool> {
        let Some(tx_hash) = codec::normalize_tx_hash(tx_hash) else {
            return Ok(false);
        };

        let holders = self.store.find_ids_by_tx_hash(&tx_hash).await?;
        let claimed = holders.iter().any(|id| Some(*id) != excluding);
        if claimed {
            tracing::warn!(
                tx_hash = %tx_hash,
                ?excluding,
                holders = ?holders,
                "Tx hash already claimed"
            );
        }
        Ok(claimed)
    }
}
