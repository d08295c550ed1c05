//! Submission guard - serialized check-and-record over the tracking file
//!
//! Every check runs load → evaluate → record → save inside one mutex scope,
//! so two concurrent submissions can no longer both read the same snapshot
//! and overwrite each other's record. The lock is per process; several
//! processes sharing one tracking file would need a file lock on top.

use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

use super::normalize_identifier;
use super::policy::{Decision, IdentifierKind, SubmissionPolicy};
use super::store::{SubmissionRecord, TrackingEntry, TrackingFile};

/// Result of `check_duplicate_submission`
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    /// User-facing reason when `is_duplicate` is set
    pub message: Option<String>,
    pub decision: Decision,
}

impl DuplicateCheck {
    fn accepted() -> Self {
        Self {
            is_duplicate: false,
            message: None,
            decision: Decision::Allowed,
        }
    }
}

/// One tracked identifier as shown on the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct TrackedIdentifier {
    pub identifier: String,
    pub total_submissions: usize,
    pub recent_submissions: usize,
    pub cooldown_status: String,
    pub entry: TrackingEntry,
}

/// Duplicate-suppression entry point shared by request handlers
pub struct SubmissionGuard {
    file: TrackingFile,
    policy: SubmissionPolicy,
    lock: Mutex<()>,
}

impl SubmissionGuard {
    pub fn new(file: TrackingFile, policy: SubmissionPolicy) -> Self {
        Self {
            file,
            policy,
            lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &SubmissionPolicy {
        &self.policy
    }

    pub fn file(&self) -> &TrackingFile {
        &self.file
    }

    /// Decide whether a (name, email) submission is a repeat, recording it if not
    ///
    /// The name is checked first; a denial there short-circuits without
    /// looking at the email. Nothing is written unless both halves pass, and
    /// then both updates go out in a single save.
    pub fn check_duplicate_submission(
        &self,
        name: &str,
        email: &str,
        ip: &str,
        now: f64,
    ) -> DuplicateCheck {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let name_key = normalize_identifier(name);
        let email_key = normalize_identifier(email);
        let mut store = self.file.load_at(now);

        for identifier in [&name_key, &email_key] {
            let decision = self.policy.evaluate(&store, identifier, now);
            if !decision.is_allowed() {
                warn!(
                    identifier = %identifier,
                    ip = %ip,
                    decision = ?decision,
                    "Repeat submission refused"
                );
                return DuplicateCheck {
                    is_duplicate: true,
                    message: self.policy.denial_message(identifier, &decision),
                    decision,
                };
            }
        }

        let record = SubmissionRecord::new(now, ip, name, email);
        self.policy
            .record(&mut store, &name_key, IdentifierKind::Name, record.clone(), email);
        self.policy
            .record(&mut store, &email_key, IdentifierKind::Email, record, name);

        match self.file.save(&store) {
            Ok(()) => info!(name = %name_key, email = %email_key, ip = %ip, "Submission recorded"),
            Err(e) => error!(
                path = %self.file.path().display(),
                error = %e,
                "Failed to save submission tracking, this submission will not count"
            ),
        }

        DuplicateCheck::accepted()
    }

    /// Read-only view of the tracking store for the admin dashboard
    pub fn overview(&self, now: f64) -> Vec<TrackedIdentifier> {
        let store = {
            let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.file.load_at(now)
        };

        let mut rows: Vec<TrackedIdentifier> = store
            .iter()
            .map(|(identifier, entry)| TrackedIdentifier {
                identifier: identifier.clone(),
                total_submissions: entry.submissions.len(),
                recent_submissions: entry.within(now, self.policy.quota_window).len(),
                cooldown_status: self.policy.cooldown_status(entry, now).to_string(),
                entry: entry.clone(),
            })
            .collect();

        rows.sort_by(|a, b| b.entry.last_submission.total_cmp(&a.entry.last_submission));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::policy::DenyReason;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const HOUR: f64 = 60.0 * 60.0;
    const T: f64 = 1_750_000_000.0;

    fn guard(dir: &TempDir) -> SubmissionGuard {
        let file = TrackingFile::new(
            dir.path().join("submission_tracking.json"),
            Duration::from_secs(30 * 24 * 60 * 60),
        );
        SubmissionGuard::new(file, SubmissionPolicy::default())
    }

    #[test]
    fn test_first_submission_is_recorded_under_both_identifiers() {
        let dir = TempDir::new().unwrap();
        let guard = guard(&dir);

        let check = guard.check_duplicate_submission("  Ann Lee ", "ANN@X.com", "1.2.3.4", T);
        assert!(!check.is_duplicate);
        assert!(check.message.is_none());

        let store = guard.file().load_at(T);
        let by_name = store.get("ann lee").unwrap();
        let by_email = store.get("ann@x.com").unwrap();
        assert_eq!(by_name.email, "ANN@X.com");
        assert_eq!(by_email.name, "  Ann Lee ");
        assert_eq!(by_name.submissions[0].ip, "1.2.3.4");
    }

    #[test]
    fn test_hourly_resubmissions_hit_cooldown() {
        let dir = TempDir::new().unwrap();
        let guard = guard(&dir);

        assert!(!guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T).is_duplicate);
        assert!(!guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + HOUR).is_duplicate);

        let third = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 2.0 * HOUR);
        assert!(third.is_duplicate);
        assert!(matches!(
            third.decision,
            Decision::Denied { reason: DenyReason::CooldownActive, .. }
        ));
        assert!(third.message.unwrap().contains("every 2 submissions"));

        let fourth = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 3.0 * HOUR);
        assert!(fourth.is_duplicate);

        let later = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 24.0 * HOUR);
        assert!(!later.is_duplicate);
    }

    #[test]
    fn test_denial_on_name_leaves_email_untouched() {
        let dir = TempDir::new().unwrap();
        let guard = guard(&dir);

        guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
        guard.check_duplicate_submission("Ann Lee", "ann@y.com", "1.2.3.4", T + HOUR);

        let before = std::fs::read_to_string(guard.file().path()).unwrap();
        let check = guard.check_duplicate_submission("Ann Lee", "fresh@z.com", "1.2.3.4", T + 2.0 * HOUR);
        assert!(check.is_duplicate);

        let after = std::fs::read_to_string(guard.file().path()).unwrap();
        assert_eq!(before, after, "denials must not write");
        assert!(!guard.file().load_at(T + 2.0 * HOUR).contains("fresh@z.com"));
    }

    #[test]
    fn test_denial_on_email_leaves_name_untouched() {
        let dir = TempDir::new().unwrap();
        let guard = guard(&dir);

        guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
        guard.check_duplicate_submission("Annie", "ann@x.com", "1.2.3.4", T + HOUR);

        let check = guard.check_duplicate_submission("Someone Else", "ann@x.com", "5.6.7.8", T + 2.0 * HOUR);
        assert!(check.is_duplicate);
        assert!(!guard.file().load_at(T + 2.0 * HOUR).contains("someone else"));
    }

    #[test]
    fn test_failed_save_still_allows() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("tracking.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let guard = SubmissionGuard::new(
            TrackingFile::new(path, Duration::from_secs(30 * 24 * 60 * 60)),
            SubmissionPolicy::default(),
        );

        let check = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
        assert!(!check.is_duplicate);
    }

    #[test]
    fn test_concurrent_checks_do_not_lose_records() {
        let dir = TempDir::new().unwrap();
        let guard = Arc::new(guard(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let guard = guard.clone();
                std::thread::spawn(move || {
                    guard.check_duplicate_submission(
                        &format!("Person {i}"),
                        &format!("person{i}@x.com"),
                        "1.2.3.4",
                        T + i as f64,
                    )
                })
            })
            .collect();

        for handle in handles {
            assert!(!handle.join().unwrap().is_duplicate);
        }

        assert_eq!(guard.file().load_at(T + 10.0).len(), 16);
    }

    #[test]
    fn test_overview_reports_cooldown() {
        let dir = TempDir::new().unwrap();
        let guard = guard(&dir);

        guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
        guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + HOUR);
        guard.check_duplicate_submission("Bob", "bob@x.com", "5.6.7.8", T + HOUR);

        let rows = guard.overview(T + 2.0 * HOUR);
        assert_eq!(rows.len(), 4);

        let ann = rows.iter().find(|r| r.identifier == "ann lee").unwrap();
        assert_eq!(ann.total_submissions, 2);
        assert_eq!(ann.cooldown_status, "Active (22.0h remaining)");

        let bob = rows.iter().find(|r| r.identifier == "bob@x.com").unwrap();
        assert_eq!(bob.cooldown_status, "None");
    }
}
