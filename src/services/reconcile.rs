use crate::{
    codec,
    error::Result,
    models::{
        OrderStatus, PaymentRecord, PaymentStatus, RecordId, RecordUpdate, RunReport, Verdict,
    },
    services::{store::PaymentStore, verifier::TransactionVerifier},
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};

pub const ALLOWED_INTERVALS: [u64; 4] = [5, 10, 15, 30];
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Cancel stale records only when no transaction was ever submitted.
    NoTxOnly,
    Always,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_tx_only" => Ok(CancelPolicy::NoTxOnly),
            "always" => Ok(CancelPolicy::Always),
            other => Err(format!("Unknown cancel policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub batch_size: usize,
    /// Zero disables stale cancellation.
    pub stale_minutes: u64,
    pub cancel_policy: CancelPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_minutes: 30,
            cancel_policy: CancelPolicy::NoTxOnly,
        }
    }
}

impl ReconcileSettings {
    /// Snap an interval onto the supported set, falling back to the default.
    pub fn normalize_interval(minutes: u64) -> u64 {
        if ALLOWED_INTERVALS.contains(&minutes) {
            minutes
        } else {
            DEFAULT_INTERVAL_MINUTES
        }
    }

    pub fn is_stale(&self, record: &PaymentRecord, now: DateTime<Utc>) -> bool {
        let threshold = i64::try_from(self.stale_minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(60);
        self.stale_minutes > 0 && (now - record.created_at).num_seconds() > threshold
    }

    fn should_cancel(&self, record: &PaymentRecord, now: DateTime<Utc>) -> bool {
        if !self.is_stale(record, now) {
            return false;
        }
        match self.cancel_policy {
            CancelPolicy::Always => true,
            CancelPolicy::NoTxOnly => !has_usable_hash(record),
        }
    }
}

fn has_usable_hash(record: &PaymentRecord) -> bool {
    record
        .tx_hash
        .as_deref()
        .and_then(codec::sanitize_hex)
        .is_some()
}

/// Metadata of the last reconciliation run, shared with the status endpoint.
#[derive(Default)]
pub struct ReconciliationState {
    last: RwLock<Option<RunReport>>,
}

impl ReconciliationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, report: RunReport) {
        *self.last.write().await = Some(report);
    }

    pub async fn last(&self) -> Option<RunReport> {
        self.last.read().await.clone()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    checked: u32,
    confirmed: u32,
    failed: u32,
    cancelled: u32,
}

/// Periodic sweep over pending records: cancel stale ones, verify the rest.
///
/// Each run takes one batch, newest first, continuing below where the previous
/// run stopped and wrapping around, so records that never settle cannot hide
/// newer ones.
pub struct Reconciler {
    store: Arc<dyn PaymentStore>,
    verifier: Arc<TransactionVerifier>,
    settings: ReconcileSettings,
    state: Arc<ReconciliationState>,
    cursor: Mutex<Option<RecordId>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        verifier: Arc<TransactionVerifier>,
        settings: ReconcileSettings,
        state: Arc<ReconciliationState>,
    ) -> Self {
        Self {
            store,
            verifier,
            settings,
            state,
            cursor: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    pub async fn run_once(&self) -> RunReport {
        self.run_once_at(Utc::now()).await
    }

    /// One run at `now`. Never fails; problems end up in the returned report.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> RunReport {
        let report = if !self.settings.enabled {
            RunReport {
                ran_at: now,
                ok: true,
                message: "Reconciliation disabled in settings.".to_string(),
                checked: 0,
                confirmed: 0,
                failed: 0,
                cancelled: 0,
            }
        } else {
            match self.sweep(now).await {
                Ok(tally) => RunReport {
                    ran_at: now,
                    ok: true,
                    message: format!(
                        "Checked {}, confirmed {}, failed {}, cancelled {}.",
                        tally.checked, tally.confirmed, tally.failed, tally.cancelled
                    ),
                    checked: tally.checked,
                    confirmed: tally.confirmed,
                    failed: tally.failed,
                    cancelled: tally.cancelled,
                },
                Err(e) => {
                    tracing::error!("Reconciliation run failed: {}", e);
                    error_report(now, &e.to_string())
                }
            }
        };

        tracing::info!(ok = report.ok, message = %report.message, "Reconciliation run finished");
        self.state.record(report.clone()).await;
        report
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<Tally> {
        let mut tally = Tally::default();
        let pending = self.next_batch().await?;

        for record in pending {
            tally.checked += 1;

            if self.settings.should_cancel(&record, now) && record.order_status.needs_payment() {
                let update = RecordUpdate {
                    status: Some(PaymentStatus::Failed),
                    order_status: Some(OrderStatus::Cancelled),
                    note: Some(format!(
                        "Auto-cancelled stale pending record ({} min).",
                        self.settings.stale_minutes
                    )),
                    ..Default::default()
                };
                self.store.apply(record.record_id, update).await?;
                tracing::info!(record_id = record.record_id, "Stale record cancelled");
                tally.cancelled += 1;
                continue;
            }

            if !has_usable_hash(&record) {
                continue;
            }

            match self.verifier.verify(&record).await {
                Ok(Verdict::Confirmed) => tally.confirmed += 1,
                Ok(Verdict::Failed) => tally.failed += 1,
                Ok(Verdict::Pending) => {}
                Err(e) => {
                    tracing::debug!(
                        record_id = record.record_id,
                        reason = e.code(),
                        "Record still pending"
                    );
                }
            }
        }

        Ok(tally)
    }

    async fn next_batch(&self) -> Result<Vec<PaymentRecord>> {
        let limit = self.settings.batch_size;
        let mut cursor = self.cursor.lock().await;

        let mut batch = self.store.list_pending(*cursor, limit).await?;
        if batch.len() < limit && cursor.is_some() {
            let seen: HashSet<RecordId> = batch.iter().map(|record| record.record_id).collect();
            let wrapped = self.store.list_pending(None, limit - batch.len()).await?;
            batch.extend(wrapped.into_iter().filter(|record| !seen.contains(&record.record_id)));
        }

        *cursor = match batch.last() {
            Some(last) if batch.len() >= limit => Some(last.record_id),
            _ => None,
        };
        Ok(batch)
    }

    /// Run on a separate task so a panic is caught and recorded like any other failure.
    pub async fn run_guarded(self: Arc<Self>) -> RunReport {
        let this = self.clone();
        match tokio::spawn(async move { this.run_once().await }).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Reconciliation run aborted: {}", e);
                let report = error_report(Utc::now(), &e.to_string());
                self.state.record(report.clone()).await;
                report
            }
        }
    }

    pub async fn run_forever(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.settings.interval_minutes * 60);
        tracing::info!(
            enabled = self.settings.enabled,
            interval_minutes = self.settings.interval_minutes,
            batch_size = self.settings.batch_size,
            stale_minutes = self.settings.stale_minutes,
            "Reconciliation loop started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(period) => {
                    self.clone().run_guarded().await;
                }
            }
        }

        tracing::info!("Reconciliation loop stopped");
    }
}

fn error_report(now: DateTime<Utc>, reason: &str) -> RunReport {
    RunReport {
        ran_at: now,
        ok: false,
        message: format!("Reconciliation error: {}", reason),
        checked: 0,
        confirmed: 0,
        failed: 0,
        cancelled: 0,
    }
}
