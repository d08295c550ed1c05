//! Double-submit CSRF tokens
//!
//! Pages with a form set an `envision_csrf` cookie and embed the same value
//! in a hidden `csrf_token` field. A POST passes only when both are present
//! and equal; a cross-site page can neither read nor set the cookie.

use axum::http::{header, HeaderMap};

use crate::auth::cookie_value;
use crate::error::AppError;

pub const CSRF_COOKIE: &str = "envision_csrf";

/// Token already held by the browser, or a fresh one
pub fn token_for(headers: &HeaderMap) -> String {
    cookie_token(headers)
        .filter(|t| t.len() <= 64 && t.bytes().all(|b| b.is_ascii_alphanumeric()))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

/// `Set-Cookie` value carrying `token`
pub fn cookie_header(token: &str) -> String {
    format!("{CSRF_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/")
}

/// Check the submitted form token against the cookie
pub fn verify(headers: &HeaderMap, submitted: &str) -> Result<(), AppError> {
    let submitted = submitted.trim();
    if submitted.is_empty() {
        return Err(AppError::Csrf("The CSRF token is missing.".to_string()));
    }
    let Some(expected) = cookie_token(headers) else {
        return Err(AppError::Csrf("The CSRF session token is missing.".to_string()));
    };
    if !constant_time_eq(expected.as_bytes(), submitted.as_bytes()) {
        return Err(AppError::Csrf("The CSRF tokens do not match.".to_string()));
    }
    Ok(())
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| cookie_value(v, CSRF_COOKIE))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_cookie(cookie: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(cookie));
        headers
    }

    fn csrf_message(result: Result<(), AppError>) -> String {
        match result {
            Err(AppError::Csrf(message)) => message,
            other => panic!("expected CSRF failure, got {other:?}"),
        }
    }

    #[test]
    fn test_matching_token_passes() {
        let headers = with_cookie("theme=dark; envision_csrf=abc123");
        assert!(verify(&headers, "abc123").is_ok());
        assert_eq!(token_for(&headers), "abc123");
    }

    #[test]
    fn test_missing_and_mismatched_tokens() {
        let headers = with_cookie("envision_csrf=abc123");
        assert_eq!(csrf_message(verify(&headers, "")), "The CSRF token is missing.");
        assert_eq!(csrf_message(verify(&headers, "abc124")), "The CSRF tokens do not match.");
        assert_eq!(
            csrf_message(verify(&HeaderMap::new(), "abc123")),
            "The CSRF session token is missing."
        );
    }

    #[test]
    fn test_fresh_token_and_cookie() {
        let token = token_for(&HeaderMap::new());
        assert_eq!(token.len(), 32);
        assert!(cookie_header(&token).starts_with(&format!("envision_csrf={token};")));
    }

    #[test]
    fn test_malformed_cookie_token_is_replaced() {
        let token = token_for(&with_cookie("envision_csrf=\"x\"<y>"));
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
