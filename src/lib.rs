//! envision-site: the Envision conference website
//!
//! Serves the public pages and the Get Involved form. Form submissions pass
//! a per-IP limiter, reCAPTCHA, field validation and the submission tracking
//! policy (per-identifier quota and cooldown) before they are logged and
//! confirmed by mail. A small admin area shows the log and tracking state.

pub mod auth;
pub mod captcha;
pub mod config;
pub mod content;
pub mod error;
pub mod form;
pub mod html;
pub mod limiter;
pub mod mail;
pub mod responses;
pub mod tracking;
pub mod web;

pub use config::Config;
pub use error::AppError;
pub use tracking::{DuplicateCheck, SubmissionGuard, SubmissionPolicy, TrackingFile};
pub use web::{create_router, AppState, SharedState};
