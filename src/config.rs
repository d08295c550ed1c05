//! Site configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial one still yields a working config. Secrets are normally supplied
//! through the environment and merged in by `main`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::tracking::SubmissionPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub submissions: SubmissionsConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Directory holding the tracking store and the response log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Static assets served under /static
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

/// Duplicate-suppression policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Tracking store file name, relative to `server.data_dir`
    #[serde(default = "default_tracking_file")]
    pub store_file: String,

    /// Submissions older than this are pruned on load
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Rolling window for the submission quota
    #[serde(default = "default_quota_window_days")]
    pub quota_window_days: u64,

    /// Maximum submissions per identifier inside the quota window
    #[serde(default = "default_max_submissions")]
    pub max_submissions: usize,

    /// Cooldown length once a group of submissions completes
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,

    /// Cooldown re-arms after every N submissions
    #[serde(default = "default_cooldown_every")]
    pub cooldown_every: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionsConfig {
    /// Accepted submissions log, relative to `server.data_dir`
    #[serde(default = "default_responses_file")]
    pub responses_file: String,

    /// Form posts allowed per client IP per window
    #[serde(default = "default_per_ip_limit")]
    pub per_ip_limit: u32,

    #[serde(default = "default_per_ip_window_secs")]
    pub per_ip_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default = "default_captcha_verify_url")]
    pub verify_url: String,

    #[serde(default = "default_captcha_timeout")]
    pub timeout_secs: u64,

    /// Public key embedded in the index page
    #[serde(default)]
    pub site_key: Option<String>,

    /// Server-side secret (RECAPTCHA_SECRET_KEY)
    #[serde(default, skip_serializing)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Send confirmation mails
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Transactional mail API endpoint
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,

    /// Bearer token for the mail API (MAIL_API_KEY)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_mail_from")]
    pub from: String,

    #[serde(default = "default_mail_subject")]
    pub subject: String,

    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// Argon2 PHC hash of the admin password (ADMIN_PASSWORD_HASH)
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Login attempts allowed per client IP per minute
    #[serde(default = "default_login_limit")]
    pub login_limit_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// TOML file with speakers and team; built-in content when unset
    #[serde(default)]
    pub content_file: Option<PathBuf>,

    #[serde(default = "default_schedule_pdf")]
    pub schedule_pdf: PathBuf,

    /// Show the registration banner on the index page
    #[serde(default)]
    pub registration_open: bool,
}

const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Upper bound for `tracking.retention_days` (ten years)
pub const MAX_RETENTION_DAYS: u64 = 3650;

// Defaults
fn default_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 8080)) }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_static_dir() -> PathBuf { PathBuf::from("static") }
fn default_tracking_file() -> String { "submission_tracking.json".to_string() }
fn default_retention_days() -> u64 { 30 }
fn default_quota_window_days() -> u64 { 14 }
fn default_max_submissions() -> usize { 4 }
fn default_cooldown_hours() -> u64 { 24 }
fn default_cooldown_every() -> usize { 2 }
fn default_responses_file() -> String { "responses.txt".to_string() }
fn default_per_ip_limit() -> u32 { 10 }
fn default_per_ip_window_secs() -> u64 { 60 }
fn default_captcha_verify_url() -> String {
    "https://www.google.com/recaptcha/api/siteverify".to_string()
}
fn default_captcha_timeout() -> u64 { 5 }
fn default_true() -> bool { true }
fn default_mail_api_url() -> String { "https://api.resend.com/emails".to_string() }
fn default_mail_from() -> String { "Envision <noreply@envisionprinceton.org>".to_string() }
fn default_mail_subject() -> String { "Thanks for getting involved with Envision".to_string() }
fn default_mail_timeout() -> u64 { 10 }
fn default_admin_username() -> String { "admin".to_string() }
fn default_session_ttl() -> u64 { 3600 }
fn default_login_limit() -> u32 { 5 }
fn default_schedule_pdf() -> PathBuf { PathBuf::from("static/EnvisionSchedule.pdf") }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            store_file: default_tracking_file(),
            retention_days: default_retention_days(),
            quota_window_days: default_quota_window_days(),
            max_submissions: default_max_submissions(),
            cooldown_hours: default_cooldown_hours(),
            cooldown_every: default_cooldown_every(),
        }
    }
}

impl Default for SubmissionsConfig {
    fn default() -> Self {
        Self {
            responses_file: default_responses_file(),
            per_ip_limit: default_per_ip_limit(),
            per_ip_window_secs: default_per_ip_window_secs(),
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            verify_url: default_captcha_verify_url(),
            timeout_secs: default_captcha_timeout(),
            site_key: None,
            secret_key: None,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_mail_api_url(),
            api_key: None,
            from: default_mail_from(),
            subject: default_mail_subject(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password_hash: None,
            session_ttl_secs: default_session_ttl(),
            login_limit_per_minute: default_login_limit(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_file: None,
            schedule_pdf: default_schedule_pdf(),
            registration_open: false,
        }
    }
}

impl TrackingConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(SECS_PER_DAY))
    }

    pub fn policy(&self) -> SubmissionPolicy {
        SubmissionPolicy {
            quota_window: Duration::from_secs(self.quota_window_days.saturating_mul(SECS_PER_DAY)),
            max_submissions: self.max_submissions,
            cooldown: Duration::from_secs(self.cooldown_hours.saturating_mul(SECS_PER_HOUR)),
            cooldown_every: self.cooldown_every,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load config from `path`, or defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to a TOML file (secrets are skipped)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tracking = &self.tracking;
        if tracking.max_submissions == 0 {
            return Err(ConfigError::Invalid(
                "tracking.max_submissions must be at least 1".to_string(),
            ));
        }
        if tracking.cooldown_every == 0 {
            return Err(ConfigError::Invalid(
                "tracking.cooldown_every must be at least 1".to_string(),
            ));
        }
        if tracking.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "tracking.retention_days ({}) exceeds {} days",
                tracking.retention_days, MAX_RETENTION_DAYS
            )));
        }
        if tracking.cooldown_hours > tracking.retention_days * 24 {
            return Err(ConfigError::Invalid(format!(
                "tracking.cooldown_hours ({}) exceeds tracking.retention_days ({})",
                tracking.cooldown_hours, tracking.retention_days
            )));
        }
        if tracking.quota_window_days > tracking.retention_days {
            return Err(ConfigError::Invalid(format!(
                "tracking.quota_window_days ({}) exceeds tracking.retention_days ({})",
                tracking.quota_window_days, tracking.retention_days
            )));
        }
        if self.submissions.per_ip_limit == 0 {
            return Err(ConfigError::Invalid(
                "submissions.per_ip_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tracking_path(&self) -> PathBuf {
        self.server.data_dir.join(&self.tracking.store_file)
    }

    pub fn responses_path(&self) -> PathBuf {
        self.server.data_dir.join(&self.submissions.responses_file)
    }
}
