//! In-memory admin sessions with expiry

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub session_id: String,
    pub username: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl AdminSession {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

pub struct SessionStore {
    sessions: DashMap<String, AdminSession>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, username: &str) -> AdminSession {
        self.cleanup();

        let now = Instant::now();
        let session = AdminSession {
            session_id: format!("sess_{}", uuid::Uuid::new_v4()),
            username: username.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .insert(session.session_id.clone(), session.clone());

        info!(username = %username, "Admin session created");
        session
    }

    /// The session, or None if unknown or expired
    pub fn validate(&self, session_id: &str) -> Option<AdminSession> {
        self.validate_at(session_id, Instant::now())
    }

    pub fn validate_at(&self, session_id: &str, now: Instant) -> Option<AdminSession> {
        let session = self.sessions.get(session_id)?.clone();
        if session.is_expired_at(now) {
            self.remove(session_id);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            debug!("Removed session: {}", session_id);
        }
    }

    /// Drop expired sessions
    pub fn cleanup(&self) {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            info!("Cleaned up {} expired sessions", removed);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_validate() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let session = store.create("admin");

        assert!(session.session_id.starts_with("sess_"));
        let found = store.validate(&session.session_id).unwrap();
        assert_eq!(found.username, "admin");

        store.remove(&session.session_id);
        assert!(store.validate(&session.session_id).is_none());
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create("admin");

        let later = session.created_at + Duration::from_secs(61);
        assert!(store.validate_at(&session.session_id, later).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.validate("sess_missing").is_none());
    }
}
