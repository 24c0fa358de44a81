use crate::error::ChainPayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type ApiRateLimiter = DefaultDirectRateLimiter;

/// Global token bucket shared by every public route.
pub fn create_rate_limiter(per_second: u32, burst: u32) -> Arc<ApiRateLimiter> {
    let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst.max(per_second.get())).unwrap_or(per_second);
    Arc::new(RateLimiter::direct(
        Quota::per_second(per_second).allow_burst(burst),
    ))
}

pub async fn rate_limit(
    State(limiter): State<Arc<ApiRateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ChainPayError> {
    if limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return Err(ChainPayError::RateLimitExceeded);
    }
    Ok(next.run(request).await)
}
