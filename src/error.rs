use crate::services::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Broad classes of failure; decides retry behaviour and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input, rejected before any network call.
    UserInput,
    /// Transaction hash already claimed by another record. Never retried.
    Replay,
    /// Every upstream endpoint failed; retry later.
    UpstreamUnavailable,
    /// Verification input does not match the chain; record stays pending.
    Mismatch,
    NotFound,
    Unauthorized,
    Internal,
}

#[derive(Error, Debug)]
pub enum ChainPayError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {0}")]
    InvalidInput(&'static str),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(u64),

    #[error("Invalid total")]
    InvalidTotal,

    #[error("Quote amount is unusable")]
    InvalidAmount,

    #[error("Pricing unavailable")]
    PricingUnavailable,

    #[error("Missing tx hash")]
    MissingTxHash,

    #[error("Tx hash already used by another order")]
    TxAlreadyClaimed,

    #[error("Order already has a different tx")]
    DifferentTxStored,

    #[error("Invalid order")]
    InvalidRecord,

    #[error("Payment record {0} not found")]
    RecordNotFound(u64),

    #[error("Quote not found or expired")]
    QuoteNotFound,

    #[error("Quote signature mismatch")]
    InvalidQuoteSignature,

    #[error("Tx not found")]
    TransactionNotFound,

    #[error("Wrong recipient")]
    WrongRecipient,

    #[error("Underpaid")]
    Underpaid,

    #[error("Amount check unavailable")]
    AmountCheckUnavailable,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

pub type Result<T, E = ChainPayError> = std::result::Result<T, E>;

impl ChainPayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainPayError::MissingField(_)
            | ChainPayError::InvalidInput(_)
            | ChainPayError::UnsupportedNetwork(_)
            | ChainPayError::InvalidTotal
            | ChainPayError::InvalidAmount
            | ChainPayError::MissingTxHash
            | ChainPayError::InvalidRecord
            | ChainPayError::InvalidQuoteSignature
            | ChainPayError::RateLimitExceeded => ErrorKind::UserInput,
            ChainPayError::TxAlreadyClaimed | ChainPayError::DifferentTxStored => ErrorKind::Replay,
            ChainPayError::PricingUnavailable | ChainPayError::TransactionNotFound => {
                ErrorKind::UpstreamUnavailable
            }
            ChainPayError::WrongRecipient
            | ChainPayError::Underpaid
            | ChainPayError::AmountCheckUnavailable => ErrorKind::Mismatch,
            ChainPayError::RecordNotFound(_) | ChainPayError::QuoteNotFound => ErrorKind::NotFound,
            ChainPayError::Unauthorized => ErrorKind::Unauthorized,
            ChainPayError::Store(_)
            | ChainPayError::CacheError(_)
            | ChainPayError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Stable, sanitized reason code relayed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            ChainPayError::MissingField(_) => "missing_field",
            ChainPayError::InvalidInput(_) => "invalid_input",
            ChainPayError::UnsupportedNetwork(_) => "unsupported_network",
            ChainPayError::InvalidTotal => "invalid_total",
            ChainPayError::InvalidAmount => "invalid_amount",
            ChainPayError::PricingUnavailable => "pricing_unavailable",
            ChainPayError::MissingTxHash => "missing_tx_hash",
            ChainPayError::TxAlreadyClaimed => "tx_already_claimed",
            ChainPayError::DifferentTxStored => "different_tx_stored",
            ChainPayError::InvalidRecord => "invalid_record",
            ChainPayError::RecordNotFound(_) => "record_not_found",
            ChainPayError::QuoteNotFound => "quote_not_found",
            ChainPayError::InvalidQuoteSignature => "invalid_quote_signature",
            ChainPayError::TransactionNotFound => "tx_not_found",
            ChainPayError::WrongRecipient => "wrong_recipient",
            ChainPayError::Underpaid => "underpaid",
            ChainPayError::AmountCheckUnavailable => "amount_check_unavailable",
            ChainPayError::Unauthorized => "unauthorized",
            ChainPayError::RateLimitExceeded => "rate_limit_exceeded",
            ChainPayError::Store(_)
            | ChainPayError::CacheError(_)
            | ChainPayError::InternalError(_) => "internal_error",
        }
    }

    /// Message safe to show a payer. Internal failures never leak details.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<StoreError> for ChainPayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ChainPayError::RecordNotFound(id),
            StoreError::DuplicateTxHash(_) => ChainPayError::TxAlreadyClaimed,
            StoreError::TxConflict(_) => ChainPayError::DifferentTxStored,
            StoreError::Backend(msg) => ChainPayError::Store(msg),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,
}

impl IntoResponse for ChainPayError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        let status = match (&self, self.kind()) {
            (ChainPayError::PricingUnavailable, _) => StatusCode::BAD_GATEWAY,
            (ChainPayError::InvalidRecord, _) => StatusCode::FORBIDDEN,
            (ChainPayError::RateLimitExceeded, _) => StatusCode::TOO_MANY_REQUESTS,
            (_, ErrorKind::UserInput) | (_, ErrorKind::Mismatch) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Replay) => StatusCode::CONFLICT,
            (_, ErrorKind::UpstreamUnavailable) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Unauthorized) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error_code = self.code();
        let body = ErrorResponse {
            success: false,
            error: self.public_message(),
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id,
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, error_code = error_code, "Request failed");
        } else {
            tracing::debug!(error = %self, error_code = error_code, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}
