use crate::{
    error::ChainPayError,
    handlers::AppState,
    models::{SubmitPaymentRequest, SubmittedPayment, VerifyRequest, VerifyResponse},
};
use axum::{extract::State, Json};

pub async fn submit_payment(
    State(state): State<AppState>,
    Json(request): Json<SubmitPaymentRequest>,
) -> Result<Json<SubmittedPayment>, ChainPayError> {
    Ok(Json(state.payments.submit(request).await?))
}

/// Polled by the checkout page until the verdict is no longer `pending`.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ChainPayError> {
    let status = state.payments.verify(request).await?;
    Ok(Json(VerifyResponse { status }))
}
