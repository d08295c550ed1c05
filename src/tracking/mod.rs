//! Submission tracking - duplicate suppression for the Get Involved form
//!
//! - `store`: persisted per-identifier history with load-time pruning
//! - `policy`: quota and cooldown rules
//! - `guard`: serialized check-and-record entry point

pub mod guard;
pub mod policy;
pub mod store;

pub use guard::{DuplicateCheck, SubmissionGuard, TrackedIdentifier};
pub use policy::{CooldownStatus, Decision, DenyReason, IdentifierKind, SubmissionPolicy};
pub use store::{StoreError, SubmissionRecord, TrackingEntry, TrackingFile, TrackingStore};

/// Key form of a name or email: trimmed and lowercased
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Current time as fractional seconds since the Unix epoch
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
