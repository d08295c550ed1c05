//! Accepted submissions log
//!
//! Plain text, one submission per line: name, email, affiliation, role and
//! message, each followed by a tab. Tabs and line breaks inside a value are
//! flattened to spaces so every line splits back into five fields.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::form::ContactSubmission;

#[derive(Debug, thiserror::Error)]
pub enum ResponseLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of the log, as shown to admins
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedResponse {
    pub name: String,
    pub email: String,
    pub affiliation: String,
    pub role: String,
    pub message: String,
}

pub struct ResponseLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResponseLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, submission: &ContactSubmission) -> Result<(), ResponseLogError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = String::new();
        for field in [
            submission.name.as_str(),
            submission.email.as_str(),
            submission.affiliation.as_str(),
            submission.role.as_str(),
            submission.message.as_str(),
        ] {
            line.push_str(&flatten(field));
            line.push('\t');
        }
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(path = %self.path.display(), "Appended response");
        Ok(())
    }

    /// All logged responses, oldest first
    pub fn read_all(&self) -> Result<Vec<LoggedResponse>, ResponseLogError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut responses = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 5 {
                warn!(line = number + 1, "Skipping short line in response log");
                continue;
            }
            responses.push(LoggedResponse {
                name: fields[0].to_string(),
                email: fields[1].to_string(),
                affiliation: fields[2].to_string(),
                role: fields[3].to_string(),
                message: fields[4].to_string(),
            });
        }
        Ok(responses)
    }
}

fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Role;
    use tempfile::TempDir;

    fn submission(name: &str, message: &str) -> ContactSubmission {
        ContactSubmission {
            name: name.to_string(),
            email: "ann@x.com".to_string(),
            affiliation: "Princeton".to_string(),
            role: Role::Volunteer,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_append_writes_tab_separated_line() {
        let dir = TempDir::new().unwrap();
        let log = ResponseLog::new(dir.path().join("data/responses.txt"));

        log.append(&submission("Ann Lee", "Hello there")).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "Ann Lee\tann@x.com\tPrinceton\tvolunteer\tHello there\t\n");
    }

    #[test]
    fn test_multiline_message_stays_on_one_line() {
        let dir = TempDir::new().unwrap();
        let log = ResponseLog::new(dir.path().join("responses.txt"));

        log.append(&submission("Ann Lee", "line one\nline\ttwo")).unwrap();
        log.append(&submission("Bob", "second")).unwrap();

        let responses = log.read_all().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].message, "line one line two");
        assert_eq!(responses[1].name, "Bob");
        assert_eq!(responses[1].role, "volunteer");
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = TempDir::new().unwrap();
        let log = ResponseLog::new(dir.path().join("responses.txt"));
        assert!(log.read_all().unwrap().is_empty());
    }
}
