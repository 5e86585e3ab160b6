use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::error::ApiError;

/// Check `Authorization: Bearer <secret>` against the configured secret.
///
/// A missing secret is a configuration error, not an auth failure.
pub(crate) fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::NotConfigured("CRON_SECRET"))?;

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if constant_time_eq(presented.trim().as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn bearer(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn accepts_matching_secret() {
        assert!(authorize(&bearer("Bearer s3cret"), Some("s3cret")).is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_credentials() {
        assert!(matches!(
            authorize(&bearer("Bearer nope"), Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            authorize(&bearer("Basic s3cret"), Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            authorize(&HeaderMap::new(), Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        assert!(matches!(
            authorize(&bearer("Bearer x"), None),
            Err(ApiError::NotConfigured(_))
        ));
        assert!(matches!(
            authorize(&bearer("Bearer "), Some("")),
            Err(ApiError::NotConfigured(_))
        ));
    }
}
