//! POST /get-involved
//!
//! Checks run cheapest first: CSRF token, per-IP limiter, CAPTCHA, field
//! validation, honeypot, then the submission tracking policy. Only a
//! submission that clears all of them is logged and confirmed by mail.

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Form, Json,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use super::{client_ip, csrf, SharedState};
use crate::error::AppError;
use crate::form::ContactForm;
use crate::mail::confirmation_mail;
use crate::tracking::unix_now;

pub const SUCCESS_MESSAGE: &str = "Form submitted successfully!";

pub async fn get_involved(
    State(state): State<SharedState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Form(form): Form<ContactForm>,
) -> Result<Json<Value>, AppError> {
    let ip = client_ip(&headers, peer.as_ref());
    info!(ip = %ip, token_present = form.has_captcha_token(), "POST /get-involved");

    if let Err(e) = csrf::verify(&headers, &form.csrf_token) {
        warn!(ip = %ip, error = %e, "Get Involved submission rejected");
        return Err(e);
    }

    if !state.form_limiter.check_and_record(&ip) {
        warn!(ip = %ip, "Get Involved rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    if !form.has_captcha_token() {
        return Err(AppError::Captcha);
    }
    match state.captcha.verify(&form.captcha_token, &ip).await {
        Ok(true) => {}
        Ok(false) => return Err(AppError::Captcha),
        Err(e) => {
            error!(ip = %ip, error = %e, "reCAPTCHA verification failed");
            return Err(AppError::Captcha);
        }
    }

    let submission = form.validate().map_err(AppError::Validation)?;

    if form.is_bot() {
        warn!(ip = %ip, "Honeypot filled, discarding submission");
        return Ok(success());
    }

    // Tracking check and response log share one blocking task
    {
        let state = state.clone();
        let submission = submission.clone();
        let ip = ip.clone();
        tokio::task::spawn_blocking(move || {
            let check = state.guard.check_duplicate_submission(
                &submission.name,
                &submission.email,
                &ip,
                unix_now(),
            );
            if check.is_duplicate {
                let message = check
                    .message
                    .unwrap_or_else(|| "Duplicate submission.".to_string());
                return Err(AppError::Duplicate(message));
            }

            state.responses.append(&submission).map_err(|e| {
                error!(
                    path = %state.responses.path().display(),
                    error = %e,
                    "Failed to write response log"
                );
                AppError::Storage(e.to_string())
            })
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    }

    if let Some(mailer) = &state.mailer {
        let mail = confirmation_mail(&state.config.mail, &submission);
        if let Err(e) = mailer.send(&mail).await {
            error!(to = %submission.email, error = %e, "Failed to send confirmation mail");
        }
    }

    info!(ip = %ip, role = %submission.role, "Get Involved submission accepted");
    Ok(success())
}

fn success() -> Json<Value> {
    Json(json!({ "success": true, "message": SUCCESS_MESSAGE }))
}
