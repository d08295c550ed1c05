//! Submission policy - quota and cooldown rules
//!
//! Two rules are evaluated per identifier against its recent history:
//! - **Quota**: at most `max_submissions` inside the rolling `quota_window`.
//! - **Cooldown**: once a pair of submissions completes, further submissions
//!   wait `cooldown` measured from the pair anchor. A lone follow-up (odd
//!   count) never re-arms the cooldown, so a quick correction goes through.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::store::{SubmissionRecord, TrackingEntry, TrackingStore};

const SECS_PER_HOUR: f64 = 60.0 * 60.0;
const SECS_PER_DAY: f64 = 24.0 * SECS_PER_HOUR;

/// Which half of a (name, email) pair an identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Name,
    Email,
}

/// Why a submission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DenyReason {
    QuotaExceeded,
    CooldownActive,
}

/// Outcome of evaluating one identifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed,
    Denied {
        reason: DenyReason,
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Cooldown state of an entry, as shown on the admin dashboard
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CooldownStatus {
    /// No complete pair inside the quota window
    None,
    Active { remaining: Duration },
    Available,
}

impl fmt::Display for CooldownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CooldownStatus::None => write!(f, "None"),
            CooldownStatus::Active { remaining } => {
                write!(f, "Active ({:.1}h remaining)", remaining.as_secs_f64() / SECS_PER_HOUR)
            }
            CooldownStatus::Available => write!(f, "Available"),
        }
    }
}

/// Quota and cooldown parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPolicy {
    pub quota_window: Duration,
    pub max_submissions: usize,
    pub cooldown: Duration,
    /// Cooldown re-arms after every N submissions
    pub cooldown_every: usize,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            quota_window: Duration::from_secs(14 * 24 * 60 * 60),
            max_submissions: 4,
            cooldown: Duration::from_secs(24 * 60 * 60),
            cooldown_every: 2,
        }
    }
}

impl SubmissionPolicy {
    /// Evaluate `identifier` against the store at `now`
    pub fn evaluate(&self, store: &TrackingStore, identifier: &str, now: f64) -> Decision {
        match store.get(identifier) {
            Some(entry) => self.evaluate_entry(entry, now),
            None => Decision::Allowed,
        }
    }

    pub fn evaluate_entry(&self, entry: &TrackingEntry, now: f64) -> Decision {
        let recent = entry.within(now, self.quota_window);

        if recent.len() >= self.max_submissions {
            let oldest = recent
                .iter()
                .map(|s| s.timestamp)
                .fold(f64::INFINITY, f64::min);
            return Decision::Denied {
                reason: DenyReason::QuotaExceeded,
                retry_after: remaining(self.quota_window, now - oldest),
            };
        }

        if let Some(anchor) = self.cooldown_anchor(&recent) {
            let elapsed = now - anchor;
            if elapsed < self.cooldown.as_secs_f64() {
                return Decision::Denied {
                    reason: DenyReason::CooldownActive,
                    retry_after: remaining(self.cooldown, elapsed),
                };
            }
        }

        Decision::Allowed
    }

    /// Cooldown half of the policy, without touching the quota
    pub fn cooldown_status(&self, entry: &TrackingEntry, now: f64) -> CooldownStatus {
        let recent = entry.within(now, self.quota_window);
        match self.cooldown_anchor(&recent) {
            None => CooldownStatus::None,
            Some(anchor) => {
                let elapsed = now - anchor;
                if elapsed < self.cooldown.as_secs_f64() {
                    CooldownStatus::Active {
                        remaining: remaining(self.cooldown, elapsed),
                    }
                } else {
                    CooldownStatus::Available
                }
            }
        }
    }

    /// Append `record` under `identifier`, creating the entry if needed
    ///
    /// `counterpart` is the other half of the pair: the email for a name
    /// entry, the name for an email entry.
    pub fn record(
        &self,
        store: &mut TrackingStore,
        identifier: &str,
        kind: IdentifierKind,
        record: SubmissionRecord,
        counterpart: &str,
    ) {
        let entry =
            store.entry_or_insert_with(identifier, || TrackingEntry::starting_at(record.timestamp));
        match kind {
            IdentifierKind::Name => entry.email = counterpart.to_string(),
            IdentifierKind::Email => entry.name = counterpart.to_string(),
        }
        entry.push(record);
    }

    /// User-facing explanation for a denial
    pub fn denial_message(&self, identifier: &str, decision: &Decision) -> Option<String> {
        match decision {
            Decision::Allowed => None,
            Decision::Denied {
                reason: DenyReason::QuotaExceeded,
                retry_after,
            } => Some(format!(
                "Submission limit reached for '{}': a maximum of {} submissions is allowed every {} days. \
                 The limit resets in {:.1} days.",
                identifier,
                self.max_submissions,
                self.quota_window.as_secs() / 86_400,
                retry_after.as_secs_f64() / SECS_PER_DAY,
            )),
            Decision::Denied {
                reason: DenyReason::CooldownActive,
                retry_after,
            } => Some(format!(
                "Please wait {:.1} more hours before submitting again. \
                 A {}-hour cooldown applies after every {} submissions.",
                retry_after.as_secs_f64() / SECS_PER_HOUR,
                self.cooldown.as_secs() / 3_600,
                self.cooldown_every,
            )),
        }
    }

    /// Older timestamp of the most recent complete group, if any
    ///
    /// Timestamps are sorted newest first and the anchor sits at index
    /// `groups * cooldown_every - 1`.
    fn cooldown_anchor(&self, recent: &[&SubmissionRecord]) -> Option<f64> {
        if recent.len() < 2 || self.cooldown_every == 0 {
            return None;
        }

        let groups = recent.len() / self.cooldown_every;
        if groups == 0 {
            return None;
        }

        let mut timestamps: Vec<f64> = recent.iter().map(|s| s.timestamp).collect();
        timestamps.sort_by(|a, b| b.total_cmp(a));
        timestamps.get(groups * self.cooldown_every - 1).copied()
    }
}

fn remaining(window: Duration, elapsed: f64) -> Duration {
    Duration::try_from_secs_f64((window.as_secs_f64() - elapsed).max(0.0)).unwrap_or(Duration::ZERO)
}
