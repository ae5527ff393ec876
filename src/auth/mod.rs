/// Bearer-token guard for write routes
use crate::errors::ApiError;
use crate::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

pub async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_authorized(req.headers(), state.api_token.as_deref()) {
        tracing::warn!(method = %req.method(), uri = %req.uri(), "rejected unauthenticated write");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// With no configured token every request is rejected
fn is_authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn test_matching_bearer_token() {
        assert!(is_authorized(&headers("Bearer s3cret"), Some("s3cret")));
    }

    #[test]
    fn test_wrong_or_missing_token() {
        assert!(!is_authorized(&headers("Bearer nope"), Some("s3cret")));
        assert!(!is_authorized(&headers("s3cret"), Some("s3cret")));
        assert!(!is_authorized(&HeaderMap::new(), Some("s3cret")));
    }

    #[test]
    fn test_unconfigured_token_rejects_everything() {
        assert!(!is_authorized(&headers("Bearer anything"), None));
    }
}
