//! Submission guard integration tests against a real tracking file

use std::time::Duration;

use envision_site::tracking::{Decision, DenyReason, SubmissionGuard, SubmissionPolicy, TrackingFile};
use tempfile::TempDir;

const HOUR: f64 = 60.0 * 60.0;
const DAY: f64 = 24.0 * HOUR;
const T: f64 = 1_760_000_000.0;

fn guard_at(path: &std::path::Path) -> SubmissionGuard {
    SubmissionGuard::new(
        TrackingFile::new(path, Duration::from_secs(30 * 24 * 60 * 60)),
        SubmissionPolicy::default(),
    )
}

#[test]
fn test_hourly_scenario() {
    let dir = TempDir::new().unwrap();
    let guard = guard_at(&dir.path().join("submission_tracking.json"));

    let first = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
    let second = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + HOUR);
    assert!(!first.is_duplicate);
    assert!(!second.is_duplicate);

    let third = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 2.0 * HOUR);
    match third.decision {
        Decision::Denied { reason, retry_after } => {
            assert_eq!(reason, DenyReason::CooldownActive);
            assert_eq!(retry_after, Duration::from_secs(22 * 60 * 60));
        }
        Decision::Allowed => panic!("third call inside the cooldown must be denied"),
    }
    assert!(third.message.unwrap().starts_with("Please wait 22.0 more hours"));

    let fourth = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 3.0 * HOUR);
    assert!(fourth.is_duplicate);

    let after = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 24.0 * HOUR + 1.0);
    assert!(!after.is_duplicate);
}

#[test]
fn test_quota_after_four_spaced_submissions() {
    let dir = TempDir::new().unwrap();
    let guard = guard_at(&dir.path().join("submission_tracking.json"));

    for day in [0.0, 2.0, 4.0, 6.0] {
        let check = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + day * DAY);
        assert!(!check.is_duplicate, "day {day}");
    }

    let fifth = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 8.0 * DAY);
    assert!(matches!(
        fifth.decision,
        Decision::Denied { reason: DenyReason::QuotaExceeded, .. }
    ));
    assert!(fifth.message.unwrap().contains("'ann lee'"));

    // Oldest leaves the 14-day window
    let later = guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + 14.0 * DAY + 1.0);
    assert!(!later.is_duplicate);
}

#[test]
fn test_history_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("submission_tracking.json");

    {
        let guard = guard_at(&path);
        guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
        guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T + HOUR);
    }

    let restarted = guard_at(&path);
    let check = restarted.check_duplicate_submission("ann lee", "ANN@x.com", "9.9.9.9", T + 2.0 * HOUR);
    assert!(check.is_duplicate);
}

#[test]
fn test_legacy_file_is_pruned_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("submission_tracking.json");
    let legacy = format!(
        r#"{{
  "old@x.com": {{"timestamp": {old}, "ip": "1.1.1.1", "name": "Old", "email": "old@x.com"}},
  "recent@x.com": {{"timestamp": {recent}, "ip": "2.2.2.2", "name": "Recent", "email": "recent@x.com"}}
}}"#,
        old = T - 31.0 * DAY,
        recent = T - 3.0 * DAY,
    );
    std::fs::write(&path, legacy).unwrap();

    let file = TrackingFile::new(&path, Duration::from_secs(30 * 24 * 60 * 60));
    let store = file.load_at(T);

    assert!(!store.contains("old@x.com"));
    let recent = store.get("recent@x.com").unwrap();
    assert_eq!(recent.submissions.len(), 1);
    assert_eq!(recent.last_submission, T - 3.0 * DAY);
    assert_eq!(recent.last_ip, "2.2.2.2");
    assert_eq!(recent.name, "Recent");
}

#[test]
fn test_overview_lists_latest_first() {
    let dir = TempDir::new().unwrap();
    let guard = guard_at(&dir.path().join("submission_tracking.json"));

    guard.check_duplicate_submission("Ann Lee", "ann@x.com", "1.2.3.4", T);
    guard.check_duplicate_submission("Bob Ray", "bob@x.com", "5.6.7.8", T + HOUR);

    let rows = guard.overview(T + 2.0 * HOUR);
    assert_eq!(rows.len(), 4);
    assert!(rows[..2].iter().all(|r| r.identifier.starts_with("bob")));
    assert!(rows.iter().all(|r| r.recent_submissions == 1));
}
