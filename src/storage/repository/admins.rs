// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Admin account repository.
//!
//! Each admin has their own credentials (argon2id hash). Repeated failed
//! logins lock the account for a fixed window; a successful login resets
//! the counter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Consecutive failures before an account locks.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a locked account stays locked.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Persisted admin account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredAdminAccount {
    /// Unique identifier (UUID).
    pub id: String,
    /// Login name. Unique.
    pub username: String,
    /// Argon2id hash in PHC string format. Never exposed via API.
    pub password_hash: String,
    /// Whether this is the bootstrap account (may create further admins).
    pub is_primary: bool,
    /// Consecutive failed login attempts since the last success.
    pub failed_attempts: u32,
    /// Lock expiry, when the account is locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StoredAdminAccount {
    /// Construct a new account with a precomputed password hash.
    pub fn new(username: String, password_hash: String, is_primary: bool) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            password_hash,
            is_primary,
            failed_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account is locked at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// Repository for admin accounts.
pub struct AdminRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AdminRepository<'a> {
    /// Create a new AdminRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if an account exists.
    pub fn exists(&self, admin_id: &str) -> bool {
        self.storage.exists(self.storage.paths().admin(admin_id))
    }

    /// Get an account by ID.
    pub fn get(&self, admin_id: &str) -> StorageResult<StoredAdminAccount> {
        let path = self.storage.paths().admin(admin_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Admin {admin_id}")));
        }
        self.storage.read_json(path)
    }

    /// Get an account by username.
    pub fn get_by_username(&self, username: &str) -> StorageResult<StoredAdminAccount> {
        let ids = self
            .storage
            .list_files(self.storage.paths().admins_dir(), "json")?;

        for id in ids {
            if let Ok(account) = self.get(&id) {
                if account.username == username {
                    return Ok(account);
                }
            }
        }
        Err(StorageError::NotFound(format!("Admin {username}")))
    }

    /// Persist a new account.
    pub fn create(&self, account: &StoredAdminAccount) -> StorageResult<()> {
        if self.exists(&account.id) {
            return Err(StorageError::AlreadyExists(format!("Admin {}", account.id)));
        }
        if self.get_by_username(&account.username).is_ok() {
            return Err(StorageError::AlreadyExists(format!(
                "Admin {}",
                account.username
            )));
        }
        self.storage
            .write_json(self.storage.paths().admin(&account.id), account)
    }

    /// Update an existing account.
    pub fn update(&self, account: &StoredAdminAccount) -> StorageResult<()> {
        if !self.exists(&account.id) {
            return Err(StorageError::NotFound(format!("Admin {}", account.id)));
        }
        self.storage
            .write_json(self.storage.paths().admin(&account.id), account)
    }

    /// Whether any admin account exists (bootstrap check).
    pub fn any_exists(&self) -> StorageResult<bool> {
        Ok(!self
            .storage
            .list_files(self.storage.paths().admins_dir(), "json")?
            .is_empty())
    }

    /// Record a failed login attempt, locking the account when the threshold
    /// is reached. Returns the updated account.
    pub fn record_failure(
        &self,
        admin_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<StoredAdminAccount> {
        let mut account = self.get(admin_id)?;
        account.failed_attempts += 1;
        if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
            account.locked_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
            account.failed_attempts = 0;
        }
        account.updated_at = now;
        self.update(&account)?;
        Ok(account)
    }

    /// Reset the failure counter after a successful login.
    pub fn record_success(
        &self,
        admin_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<StoredAdminAccount> {
        let mut account = self.get(admin_id)?;
        account.failed_attempts = 0;
        account.locked_until = None;
        account.updated_at = now;
        self.update(&account)?;
        Ok(account)
    }
}
