//! Durable submission tracking store
//!
//! The store is a single JSON object keyed by normalized identifier. Names and
//! emails share that key space, so a name spelled exactly like an email
//! address resolves to the same entry.
//!
//! Loading prunes anything older than the retention window and never fails:
//! a missing, unreadable or malformed file yields an empty store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::unix_now;

/// One accepted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl SubmissionRecord {
    pub fn new(timestamp: f64, ip: &str, name: &str, email: &str) -> Self {
        Self {
            timestamp,
            ip: ip.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    fn age(&self, now: f64) -> f64 {
        now - self.timestamp
    }
}

/// Submission history for one identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub submissions: Vec<SubmissionRecord>,
    #[serde(default)]
    pub first_submission: f64,
    #[serde(default)]
    pub last_submission: f64,
    #[serde(default)]
    pub last_ip: String,
    /// Paired name when this entry is keyed by an email
    #[serde(default)]
    pub name: String,
    /// Paired email when this entry is keyed by a name
    #[serde(default)]
    pub email: String,
}

impl TrackingEntry {
    /// Empty entry whose history starts at `first_submission`
    pub fn starting_at(first_submission: f64) -> Self {
        Self {
            submissions: Vec::new(),
            first_submission,
            last_submission: first_submission,
            last_ip: String::new(),
            name: String::new(),
            email: String::new(),
        }
    }

    /// Append a record and refresh the cached latest fields
    pub fn push(&mut self, record: SubmissionRecord) {
        self.submissions.push(record);
        self.refresh_latest();
    }

    /// Submissions younger than `window` at `now`, in stored order
    pub fn within(&self, now: f64, window: Duration) -> Vec<&SubmissionRecord> {
        let window = window.as_secs_f64();
        self.submissions
            .iter()
            .filter(|s| s.age(now) < window)
            .collect()
    }

    fn latest(&self) -> Option<&SubmissionRecord> {
        self.submissions
            .iter()
            .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
    }

    fn refresh_latest(&mut self) {
        if let Some(latest) = self.latest() {
            let (timestamp, ip) = (latest.timestamp, latest.ip.clone());
            self.last_submission = timestamp;
            self.last_ip = ip;
        }
    }

    /// Drop submissions older than `retention`; returns false once empty
    fn prune(&mut self, now: f64, retention: Duration) -> bool {
        let retention = retention.as_secs_f64();
        self.submissions.retain(|s| s.age(now) < retention);
        self.refresh_latest();
        !self.submissions.is_empty()
    }
}

/// Older single-timestamp shape, read but never written
#[derive(Debug, Clone, Deserialize)]
struct LegacyEntry {
    timestamp: f64,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

impl From<LegacyEntry> for TrackingEntry {
    fn from(legacy: LegacyEntry) -> Self {
        let record = SubmissionRecord {
            timestamp: legacy.timestamp,
            ip: legacy.ip.clone(),
            name: legacy.name.clone(),
            email: legacy.email.clone(),
        };
        Self {
            submissions: vec![record],
            first_submission: legacy.timestamp,
            last_submission: legacy.timestamp,
            last_ip: legacy.ip,
            name: legacy.name,
            email: legacy.email,
        }
    }
}

/// On-disk entry, discriminated by the presence of `submissions`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Current(TrackingEntry),
    Legacy(LegacyEntry),
}

/// In-memory tracking map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingStore {
    entries: BTreeMap<String, TrackingEntry>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&TrackingEntry> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn insert(&mut self, identifier: impl Into<String>, entry: TrackingEntry) {
        self.entries.insert(identifier.into(), entry);
    }

    /// Entry for `identifier`, created with `create` when absent
    pub fn entry_or_insert_with(
        &mut self,
        identifier: &str,
        create: impl FnOnce() -> TrackingEntry,
    ) -> &mut TrackingEntry {
        self.entries
            .entry(identifier.to_string())
            .or_insert_with(create)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TrackingEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tracking store persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// File-backed tracking store
#[derive(Debug, Clone)]
pub struct TrackingFile {
    path: PathBuf,
    retention: Duration,
}

impl TrackingFile {
    pub fn new(path: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            path: path.into(),
            retention,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Load and prune against the wall clock
    pub fn load(&self) -> TrackingStore {
        self.load_at(unix_now())
    }

    /// Load and prune against `now`
    pub fn load_at(&self, now: f64) -> TrackingStore {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No tracking file yet, starting empty");
                return TrackingStore::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read tracking file, starting empty");
                return TrackingStore::new();
            }
        };

        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Malformed tracking file, starting empty");
                return TrackingStore::new();
            }
        };

        let retention = self.retention.as_secs_f64();
        let mut store = TrackingStore::new();

        for (identifier, value) in raw {
            match serde_json::from_value::<StoredEntry>(value) {
                Ok(StoredEntry::Current(mut entry)) => {
                    if entry.prune(now, self.retention) {
                        store.insert(identifier, entry);
                    }
                }
                Ok(StoredEntry::Legacy(legacy)) => {
                    if now - legacy.timestamp < retention {
                        store.insert(identifier, legacy.into());
                    }
                }
                Err(e) => {
                    warn!(identifier = %identifier, error = %e, "Skipping malformed tracking entry");
                }
            }
        }

        store
    }

    /// Overwrite the file with `store`
    ///
    /// Writes a sibling temp file first and renames it into place, so a crash
    /// mid-write leaves the previous content intact.
    pub fn save(&self, store: &TrackingStore) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(store)?;
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), entries = store.len(), "Saved tracking file");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
