//! Admin area: login, dashboard and JSON views of submissions and tracking

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use super::{client_ip, csrf, SharedState};
use crate::auth::{session_id_from_cookies, verify_password, AdminSession, SESSION_COOKIE};
use crate::error::AppError;
use crate::html::{escape_html, render_template};
use crate::responses::LoggedResponse;
use crate::tracking::{unix_now, TrackedIdentifier};

const LOGIN_TEMPLATE: &str = include_str!("../../templates/login.html");
const DASHBOARD_TEMPLATE: &str = include_str!("../../templates/admin.html");

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// Tracking row with a readable last-submission time
#[derive(Debug, Serialize)]
pub struct TrackingRow {
    #[serde(flatten)]
    pub tracked: TrackedIdentifier,
    pub last_submission_at: String,
}

/// GET /admin/login
pub async fn login_page(headers: HeaderMap) -> Response {
    login_response(StatusCode::OK, &headers, None)
}

/// POST /admin/login
pub async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let ip = client_ip(&headers, peer.as_ref());

    if let Err(e) = csrf::verify(&headers, &form.csrf_token) {
        warn!(ip = %ip, error = %e, "Admin login rejected");
        return login_response(StatusCode::BAD_REQUEST, &headers, Some(&e.to_string()));
    }

    if !state.login_limiter.check_and_record(&ip) {
        warn!(ip = %ip, "Admin login rate limit exceeded");
        return login_response(
            StatusCode::TOO_MANY_REQUESTS,
            &headers,
            Some("Too many login attempts. Try again in a minute."),
        );
    }

    let Some(hash) = state.config.admin.password_hash.clone() else {
        error!("Admin login attempted but no password hash is configured");
        return login_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &headers,
            Some("Admin login is not configured."),
        );
    };

    let password = form.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await;
    let password_ok = match verified {
        Ok(Ok(ok)) => ok,
        Ok(Err(e)) => {
            error!(error = %e, "Stored admin password hash is unusable");
            false
        }
        Err(e) => {
            error!(error = %e, "Password verification task failed");
            false
        }
    };

    if !password_ok || form.username != state.config.admin.username {
        warn!(ip = %ip, username = %form.username, "Failed admin login");
        return login_response(
            StatusCode::UNAUTHORIZED,
            &headers,
            Some("Invalid username or password."),
        );
    }

    let session = state.sessions.create(&form.username);
    info!(ip = %ip, username = %session.username, "Admin logged in");

    let cookie = format!(
        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Strict; Path=/admin; Max-Age={}",
        session.session_id,
        state.sessions.ttl().as_secs()
    );
    ([(header::SET_COOKIE, cookie)], Redirect::to("/admin")).into_response()
}

/// POST /admin/logout
pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Result<Response, AppError> {
    csrf::verify(&headers, &form.csrf_token)?;

    if let Some(id) = session_cookie(&headers) {
        state.sessions.remove(id);
    }
    let cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/admin; Max-Age=0");
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/admin/login")).into_response())
}

/// GET /admin
pub async fn dashboard(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Ok(session) = require_admin(&state, &headers) else {
        return Redirect::to("/admin/login").into_response();
    };

    let (responses, tracking) = match load_views(&state).await {
        Ok(views) => views,
        Err(e) => return e.into_response(),
    };

    let token = csrf::token_for(&headers);
    (
        [(header::SET_COOKIE, csrf::cookie_header(&token))],
        Html(render_dashboard(&session, &token, &responses, &tracking)),
    )
        .into_response()
}

/// GET /admin/api/tracking
pub async fn api_tracking(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TrackingRow>>, AppError> {
    require_admin(&state, &headers)?;
    let (_, tracking) = load_views(&state).await?;
    Ok(Json(tracking))
}

/// GET /admin/api/submissions
pub async fn api_submissions(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<LoggedResponse>>, AppError> {
    require_admin(&state, &headers)?;
    let (responses, _) = load_views(&state).await?;
    Ok(Json(responses))
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_id_from_cookies)
}

fn require_admin(state: &SharedState, headers: &HeaderMap) -> Result<AdminSession, AppError> {
    session_cookie(headers)
        .and_then(|id| state.sessions.validate(id))
        .ok_or(AppError::Unauthorized)
}

async fn load_views(state: &SharedState) -> Result<(Vec<LoggedResponse>, Vec<TrackingRow>), AppError> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let responses = state
            .responses
            .read_all()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        let tracking = state
            .guard
            .overview(unix_now())
            .into_iter()
            .map(|tracked| TrackingRow {
                last_submission_at: format_timestamp(tracked.entry.last_submission),
                tracked,
            })
            .collect();
        Ok::<_, AppError>((responses, tracking))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// `YYYY-MM-DD HH:MM:SS UTC` for a Unix timestamp
pub fn format_timestamp(timestamp: f64) -> String {
    chrono::DateTime::from_timestamp(timestamp.floor() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn login_response(status: StatusCode, headers: &HeaderMap, error: Option<&str>) -> Response {
    let token = csrf::token_for(headers);
    (
        status,
        [(header::SET_COOKIE, csrf::cookie_header(&token))],
        Html(render_login(error, &token)),
    )
        .into_response()
}

fn render_login(error: Option<&str>, csrf_token: &str) -> String {
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape_html(e)))
        .unwrap_or_default();
    render_template(
        LOGIN_TEMPLATE,
        &[("error", &error), ("csrf_token", &escape_html(csrf_token))],
    )
}

fn render_dashboard(
    session: &AdminSession,
    csrf_token: &str,
    responses: &[LoggedResponse],
    tracking: &[TrackingRow],
) -> String {
    let response_rows: String = responses
        .iter()
        .rev()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&r.name),
                escape_html(&r.email),
                escape_html(&r.affiliation),
                escape_html(&r.role),
                escape_html(&r.message),
            )
        })
        .collect();

    let tracking_rows: String = tracking
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&row.tracked.identifier),
                row.tracked.total_submissions,
                row.tracked.recent_submissions,
                escape_html(&row.last_submission_at),
                escape_html(&row.tracked.entry.last_ip),
                escape_html(&row.tracked.cooldown_status),
            )
        })
        .collect();

    render_template(
        DASHBOARD_TEMPLATE,
        &[
            ("username", &escape_html(&session.username)),
            ("csrf_token", &escape_html(csrf_token)),
            ("response_count", &responses.len().to_string()),
            ("response_rows", &response_rows),
            ("tracking_count", &tracking.len().to_string()),
            ("tracking_rows", &tracking_rows),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_700_000_000.75), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn test_login_error_is_escaped() {
        let html = render_login(Some("<bad>"), "tok");
        assert!(html.contains("&lt;bad&gt;"));
        assert!(html.contains(r#"name="csrf_token" value="tok""#));
        assert!(!render_login(None, "tok").contains("{{"));
    }

    #[test]
    fn test_submitted_text_is_not_expanded() {
        let now = std::time::Instant::now();
        let session = AdminSession {
            session_id: "sess_test".to_string(),
            username: "admin".to_string(),
            created_at: now,
            expires_at: now,
        };
        let responses = vec![LoggedResponse {
            name: "Ann".to_string(),
            email: "ann@x.com".to_string(),
            affiliation: "{{response_count}}".to_string(),
            role: "attendee".to_string(),
            message: "{{tracking_rows}}{{username}}".to_string(),
        }];

        let html = render_dashboard(&session, "tok", &responses, &[]);
        assert!(html.contains("<td>{{response_count}}</td>"));
        assert!(html.contains("<td>{{tracking_rows}}{{username}}</td>"));
        assert!(html.contains("Submissions (1)"));
        assert!(html.contains("Submission tracking (0)"));
        assert!(html.contains(r#"name="csrf_token" value="tok""#));
    }
}
