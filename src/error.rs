//! Handler-facing errors
//!
//! Form endpoints answer with `{"success": false, "message": ..}` JSON and,
//! for validation failures, the per-field `errors` map.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::form::FieldErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Too many requests, please slow down.")]
    RateLimited,

    #[error("CSRF failed: {0}")]
    Csrf(String),

    #[error("reCAPTCHA verification failed. Please try again.")]
    Captcha,

    #[error("Form validation failed, please check fields and try again.")]
    Validation(FieldErrors),

    /// Repeat submission refused by the tracking policy
    #[error("{0}")]
    Duplicate(String),

    #[error("An error occurred while saving your submission.")]
    Storage(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Csrf(_)
            | AppError::Captcha
            | AppError::Validation(_)
            | AppError::Duplicate(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => json!({
                "success": false,
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => json!({
                "success": false,
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::Captcha.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Csrf("The CSRF token is missing.".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Duplicate("slow down".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Storage("disk full".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_csrf_message() {
        let message = AppError::Csrf("The CSRF tokens do not match.".to_string()).to_string();
        assert_eq!(message, "CSRF failed: The CSRF tokens do not match.");
    }

    #[test]
    fn test_storage_detail_is_not_shown() {
        let message = AppError::Storage("/data/responses.txt: permission denied".to_string()).to_string();
        assert!(!message.contains("permission"));
    }
}
