use crate::{
    error::ChainPayError,
    handlers::AppState,
    models::{Quote, QuoteRequest},
};
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn create_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>, ChainPayError> {
    let quote = state.quotes.build(request.chain_id, request.fiat_total).await?;
    Ok(Json(quote))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<String>,
) -> Result<Json<Quote>, ChainPayError> {
    Ok(Json(state.quotes.get(&quote_id).await?))
}
