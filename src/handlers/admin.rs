use crate::{
    error::ChainPayError,
    handlers::AppState,
    models::{RecordId, RunReport, VerifyResponse},
};
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn manual_verify(
    State(state): State<AppState>,
    Path(record_id): Path<RecordId>,
) -> Result<Json<VerifyResponse>, ChainPayError> {
    let status = state.payments.manual_verify(record_id).await?;
    Ok(Json(VerifyResponse { status }))
}

pub async fn run_reconcile(State(state): State<AppState>) -> Json<RunReport> {
    Json(state.reconciler.clone().run_guarded().await)
}
