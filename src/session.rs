use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::err::AuthError;
use crate::models::UserId;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub ssid: String,
    pub belongs_to: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Live login sessions, keyed by token. Not persisted.
#[derive(Debug)]
pub struct Sessions {
    ttl: Duration,
    by_ssid: HashMap<String, Session>,
}

fn new_ssid() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(&ssid_bytes);
    let result = hasher.finalize();
    hex::encode(result)
}

impl Sessions {
    pub fn new(ttl: Duration) -> Self {
        Sessions {
            ttl,
            by_ssid: HashMap::new(),
        }
    }

    pub fn issue(&mut self, user: UserId) -> Session {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&mut self, user: UserId, now: DateTime<Utc>) -> Session {
        let session = Session {
            ssid: new_ssid(),
            belongs_to: user,
            expires_at: now + self.ttl,
        };
        self.by_ssid.insert(session.ssid.clone(), session.clone());
        log::debug!("Session issued to user {} until {}.", user, session.expires_at);
        session
    }

    /// Who owns `ssid`. An expired session is dropped on sight.
    pub fn ensure_authenticated(&mut self, ssid: &str) -> Result<UserId, AuthError> {
        self.ensure_authenticated_at(ssid, Utc::now())
    }

    pub fn ensure_authenticated_at(
        &mut self,
        ssid: &str,
        now: DateTime<Utc>,
    ) -> Result<UserId, AuthError> {
        if ssid.is_empty() {
            return Err(AuthError::InvalidSession);
        }
        let session = match self.by_ssid.get(ssid) {
            Some(session) => session,
            None => return Err(AuthError::InvalidSession),
        };
        if now > session.expires_at {
            self.by_ssid.remove(ssid);
            return Err(AuthError::SessionExpired);
        }
        Ok(session.belongs_to)
    }

    pub fn drop_session(&mut self, ssid: &str) -> bool {
        self.by_ssid.remove(ssid).is_some()
    }

    /// Logs a deleted user out everywhere.
    pub fn drop_user(&mut self, user: UserId) -> usize {
        let before = self.by_ssid.len();
        self.by_ssid.retain(|_, s| s.belongs_to != user);
        before - self.by_ssid.len()
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.by_ssid.len();
        self.by_ssid.retain(|_, s| s.expires_at >= now);
        before - self.by_ssid.len()
    }

    pub fn len(&self) -> usize {
        self.by_ssid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ssid.is_empty()
    }
}
