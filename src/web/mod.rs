//! HTTP surface: public pages, the Get Involved endpoint and the admin area

pub mod admin;
pub mod csrf;
pub mod involve;
pub mod pages;

use axum::{
    extract::ConnectInfo,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::auth::SessionStore;
use crate::captcha::CaptchaVerifier;
use crate::config::Config;
use crate::content::SiteContent;
use crate::limiter::RequestLimiter;
use crate::mail::Mailer;
use crate::responses::ResponseLog;
use crate::tracking::{SubmissionGuard, TrackingFile};

/// State shared across handlers
pub struct AppState {
    pub config: Config,
    pub guard: SubmissionGuard,
    pub responses: ResponseLog,
    pub content: SiteContent,
    pub captcha: Arc<dyn CaptchaVerifier>,
    /// None when confirmation mail is off
    pub mailer: Option<Arc<dyn Mailer>>,
    pub form_limiter: RequestLimiter,
    pub login_limiter: RequestLimiter,
    pub sessions: SessionStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: Config,
        content: SiteContent,
        captcha: Arc<dyn CaptchaVerifier>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let tracking = TrackingFile::new(config.tracking_path(), config.tracking.retention());
        let guard = SubmissionGuard::new(tracking, config.tracking.policy());
        let responses = ResponseLog::new(config.responses_path());
        let form_limiter = RequestLimiter::new(
            Duration::from_secs(config.submissions.per_ip_window_secs),
            config.submissions.per_ip_limit,
        );
        let login_limiter = RequestLimiter::per_minute(config.admin.login_limit_per_minute);
        let sessions = SessionStore::new(Duration::from_secs(config.admin.session_ttl_secs));

        Self {
            config,
            guard,
            responses,
            content,
            captcha,
            mailer,
            form_limiter,
            login_limiter,
            sessions,
        }
    }
}

/// Create the site router
pub fn create_router(state: SharedState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    let schedule_pdf = state.config.site.schedule_pdf.clone();

    Router::new()
        // Public pages
        .route("/", get(pages::index))
        .route("/health", get(pages::health))
        .route_service("/schedule", ServeFile::new(schedule_pdf))
        // Contact form
        .route("/get-involved", post(involve::get_involved))
        // Admin
        .route("/admin", get(admin::dashboard))
        .route("/admin/login", get(admin::login_page).post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/api/tracking", get(admin::api_tracking))
        .route("/admin/api/submissions", get(admin::api_submissions))
        // Static files
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(ConnectInfo(addr))) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}
