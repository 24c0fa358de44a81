use crate::error::ChainPayError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Operator bearer token. `None` locks the admin routes entirely.
#[derive(Clone, Default)]
pub struct AdminToken(pub Option<Arc<str>>);

impl AdminToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()).map(Arc::from))
    }

    fn accepts(&self, presented: &str) -> bool {
        let Some(expected) = self.0.as_deref() else {
            return false;
        };
        let (a, b) = (expected.as_bytes(), presented.as_bytes());
        // Constant-time comparison.
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

pub async fn require_admin(
    State(token): State<AdminToken>,
    request: Request,
    next: Next,
) -> Result<Response, ChainPayError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(presented) if token.accepts(presented) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request");
            Err(ChainPayError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matching() {
        let token = AdminToken::new(Some("s3cret".to_string()));
        assert!(token.accepts("s3cret"));
        assert!(!token.accepts("s3cre"));
        assert!(!token.accepts("s3cret!"));
        assert!(!token.accepts(""));
    }

    #[test]
    fn test_unset_token_rejects_everything() {
        let token = AdminToken::new(None);
        assert!(!token.accepts(""));
        assert!(!AdminToken::new(Some("  ".to_string())).accepts("  "));
    }
}
