use crate::{
    handlers::*,
    middleware::{rate_limit, require_admin, AdminToken, ApiRateLimiter},
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// Full HTTP surface: rate-limited public API, token-guarded admin API, status probes.
pub fn build_router(
    state: AppState,
    limiter: Arc<ApiRateLimiter>,
    admin_token: AdminToken,
) -> Router {
    let api = Router::new()
        .route("/api/quote", post(create_quote))
        .route("/api/quote/:quote_id", get(get_quote))
        .route("/api/payments", post(submit_payment))
        .route("/api/verify", post(verify_payment))
        .layer(axum_middleware::from_fn_with_state(limiter, rate_limit));

    let admin = Router::new()
        .route("/admin/payments/:record_id/verify", post(manual_verify))
        .route("/admin/reconcile", post(run_reconcile))
        .layer(axum_middleware::from_fn_with_state(admin_token, require_admin));

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(system_status))
        .merge(api)
        .merge(admin)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
}
