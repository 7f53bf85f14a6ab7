// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Admin session repository.
//!
//! Sessions are server-validated bearer tokens with a 24 hour lifetime.
//! An expired session forces re-login and is deleted on sight.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Admin session lifetime.
pub const ADMIN_SESSION_TTL_HOURS: i64 = 24;

/// Persisted admin session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredAdminSession {
    /// The opaque session token. Doubles as the record key.
    pub token: String,
    /// Account this session belongs to.
    pub admin_id: String,
    /// Username, denormalized for audit entries.
    pub username: String,
    /// When the session was issued.
    pub issued_at: DateTime<Utc>,
    /// When the session expires (issued + 24 h).
    pub expires_at: DateTime<Utc>,
}

impl StoredAdminSession {
    /// Construct a fresh session for an account.
    pub fn new(token: String, admin_id: String, username: String) -> Self {
        let now = Utc::now();
        Self {
            token,
            admin_id,
            username,
            issued_at: now,
            expires_at: now + Duration::hours(ADMIN_SESSION_TTL_HOURS),
        }
    }

    /// Whether the session is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Repository for admin sessions.
pub struct AdminSessionRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AdminSessionRepository<'a> {
    /// Create a new AdminSessionRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a session exists for a token.
    pub fn exists(&self, token: &str) -> bool {
        self.storage
            .exists(self.storage.paths().admin_session(token))
    }

    /// Get a session by token, without checking expiry.
    pub fn get_by_token(&self, token: &str) -> StorageResult<StoredAdminSession> {
        let path = self.storage.paths().admin_session(token);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound("Admin session".to_string()));
        }
        self.storage.read_json(path)
    }

    /// Persist a new session.
    pub fn create(&self, session: &StoredAdminSession) -> StorageResult<()> {
        if self.exists(&session.token) {
            return Err(StorageError::AlreadyExists("Admin session".to_string()));
        }
        self.storage
            .write_json(self.storage.paths().admin_session(&session.token), session)
    }

    /// Delete a session (logout).
    pub fn delete(&self, token: &str) -> StorageResult<()> {
        if !self.exists(token) {
            return Err(StorageError::NotFound("Admin session".to_string()));
        }
        self.storage
            .delete(self.storage.paths().admin_session(token))
    }

    /// Validate a session token at `now`.
    ///
    /// Expired sessions are deleted and reported as not found, so callers
    /// see exactly one error shape for stale and unknown tokens alike.
    pub fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<StoredAdminSession> {
        let session = self.get_by_token(token)?;
        if session.is_expired(now) {
            let _ = self.delete(token);
            return Err(StorageError::NotFound("Admin session".to_string()));
        }
        Ok(session)
    }
}
