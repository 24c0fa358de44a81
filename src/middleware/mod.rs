pub mod admin_auth;
pub mod rate_limit;

pub use admin_auth::{require_admin, AdminToken};
pub use rate_limit::{create_rate_limiter, rate_limit, ApiRateLimiter};
