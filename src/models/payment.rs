use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RecordId = u64;

/// Verification status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unset,
    Pending,
    Confirmed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Failed)
    }
}

/// Status of the order the payment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    AwaitingPayment,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn needs_payment(&self) -> bool {
        matches!(self, OrderStatus::AwaitingPayment)
    }

    /// Apply a requested transition. Paying or cancelling only moves an order
    /// that is still awaiting payment; anything else is a no-op.
    pub fn transition(self, to: OrderStatus) -> OrderStatus {
        match (self, to) {
            (OrderStatus::AwaitingPayment, next) => next,
            (current, _) => current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub record_id: RecordId,
    /// Capability token handed to the buyer; required to poll verification.
    #[serde(skip_serializing, default)]
    pub record_key: String,
    pub quote_id: String,
    pub chain_id: u64,
    pub merchant_address: String,
    /// `0x` hex, as quoted at submission time.
    pub expected_amount_minor_units: String,
    pub tx_hash: Option<String>,
    pub payer_address: Option<String>,
    pub status: PaymentStatus,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notified_confirmed: bool,
    pub notified_failed: bool,
    pub notes: Vec<String>,
}

impl PaymentRecord {
    pub fn notified(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Confirmed => self.notified_confirmed,
            NotificationKind::Failed => self.notified_failed,
        }
    }

    pub fn set_notified(&mut self, kind: NotificationKind) {
        match kind {
            NotificationKind::Confirmed => self.notified_confirmed = true,
            NotificationKind::Failed => self.notified_failed = true,
        }
    }
}

/// Fields of a new record, as validated by the submission entry point.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub quote_id: String,
    pub chain_id: u64,
    pub merchant_address: String,
    pub expected_amount_minor_units: String,
    pub tx_hash: Option<String>,
    pub payer_address: Option<String>,
}

/// A single-record mutation applied atomically by the store.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub status: Option<PaymentStatus>,
    pub order_status: Option<OrderStatus>,
    pub tx_hash: Option<String>,
    pub payer_address: Option<String>,
    pub note: Option<String>,
    /// Set the matching `notified_*` flag if it was clear; the store reports
    /// whether this update was the one that set it.
    pub claim_notification: Option<NotificationKind>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    #[serde(default)]
    pub quote_id: String,
    pub chain_id: u64,
    #[serde(default)]
    pub merchant_address: String,
    #[serde(default)]
    pub expected_amount_minor_units: String,
    #[serde(default)]
    pub payer_address: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    /// `signature` and `expiresAt` of the quote, required once it has left the cache.
    #[serde(default)]
    pub quote_signature: Option<String>,
    #[serde(default)]
    pub quote_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedPayment {
    pub record_id: RecordId,
    pub record_key: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub record_id: RecordId,
    #[serde(default)]
    pub record_key: String,
    #[serde(default)]
    pub tx_hash: String,
}

/// Outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Not decidable yet (no receipt); safe to retry.
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: Verdict,
}
