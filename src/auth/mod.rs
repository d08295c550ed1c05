//! Admin authentication
//!
//! A single admin account: username from config, Argon2 password hash from
//! the environment. Successful logins get a short-lived session cookie.

pub mod password;
pub mod session;

pub use password::{hash_password, verify_password};
pub use session::{AdminSession, SessionStore};

/// Cookie carrying the admin session ID
pub const SESSION_COOKIE: &str = "envision_admin";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Non-empty value of cookie `name` in a `Cookie` header value
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Session ID from a `Cookie` header value
pub fn session_id_from_cookies(header: &str) -> Option<&str> {
    cookie_value(header, SESSION_COOKIE)
}
