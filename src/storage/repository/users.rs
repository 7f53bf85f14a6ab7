// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! User repository.
//!
//! A user record is created (or updated) as soon as a visitor submits the
//! identity form, before any payment exists. Emails are stored normalized
//! (trimmed, lowercased) and are unique across the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// User identity record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID).
    pub id: String,
    /// Full name.
    pub name: String,
    /// Normalized email (trimmed, lowercased). Unique.
    pub email: String,
    /// Phone number (trimmed, spaces stripped).
    pub phone: String,
    /// City, when the flow collects it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Whether a completed payment exists for this user.
    pub has_paid: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
    /// Last time this user passed the entry gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// Repository for user records.
pub struct UserRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a user exists.
    pub fn exists(&self, user_id: &str) -> bool {
        self.storage.exists(self.storage.paths().user(user_id))
    }

    /// Get a user by ID.
    pub fn get(&self, user_id: &str) -> StorageResult<StoredUser> {
        let path = self.storage.paths().user(user_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("User {user_id}")));
        }
        self.storage.read_json(path)
    }

    /// Get a user by normalized email.
    pub fn get_by_email(&self, email: &str) -> StorageResult<StoredUser> {
        let needle = email.trim().to_lowercase();
        let user_ids = self
            .storage
            .list_files(self.storage.paths().users_dir(), "json")?;

        for id in user_ids {
            if let Ok(user) = self.get(&id) {
                if user.email == needle {
                    return Ok(user);
                }
            }
        }

        Err(StorageError::NotFound(format!("User with email {needle}")))
    }

    /// Create a new user.
    pub fn create(&self, user: &StoredUser) -> StorageResult<()> {
        if self.exists(&user.id) {
            return Err(StorageError::AlreadyExists(format!("User {}", user.id)));
        }
        if self.get_by_email(&user.email).is_ok() {
            return Err(StorageError::AlreadyExists(format!(
                "User with email {}",
                user.email
            )));
        }
        self.storage
            .write_json(self.storage.paths().user(&user.id), user)
    }

    /// Update an existing user.
    pub fn update(&self, user: &StoredUser) -> StorageResult<()> {
        if !self.exists(&user.id) {
            return Err(StorageError::NotFound(format!("User {}", user.id)));
        }
        self.storage
            .write_json(self.storage.paths().user(&user.id), user)
    }

    /// Create or update a user from submitted identity fields.
    ///
    /// Existing records keep their `name`/`city` when the submission omits
    /// them (returning visitors only re-enter email and phone).
    pub fn upsert_identity(
        &self,
        name: Option<&str>,
        email: &str,
        phone: &str,
        city: Option<&str>,
    ) -> StorageResult<StoredUser> {
        let now = Utc::now();
        match self.get_by_email(email) {
            Ok(mut user) => {
                if let Some(name) = name {
                    user.name = name.to_string();
                }
                user.phone = phone.to_string();
                if let Some(city) = city {
                    user.city = Some(city.to_string());
                }
                user.updated_at = now;
                self.update(&user)?;
                Ok(user)
            }
            Err(StorageError::NotFound(_)) => {
                let user = StoredUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: name.unwrap_or_default().to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                    city: city.map(str::to_string),
                    has_paid: false,
                    created_at: now,
                    updated_at: now,
                    last_login: None,
                };
                self.create(&user)?;
                Ok(user)
            }
            Err(e) => Err(e),
        }
    }

    /// Mark a user as paid.
    ///
    /// No-op when no user record exists for the email (payments can be
    /// recorded for visitors who never completed the identity form).
    pub fn mark_paid(&self, email: &str) -> StorageResult<()> {
        match self.get_by_email(email) {
            Ok(mut user) => {
                user.has_paid = true;
                user.updated_at = Utc::now();
                self.update(&user)
            }
            Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Record that a user passed the entry gate.
    pub fn touch_last_login(&self, email: &str) -> StorageResult<()> {
        match self.get_by_email(email) {
            Ok(mut user) => {
                user.last_login = Some(Utc::now());
                self.update(&user)
            }
            Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List all users (admin view), newest first.
    pub fn list_all(&self) -> StorageResult<Vec<StoredUser>> {
        let user_ids = self
            .storage
            .list_files(self.storage.paths().users_dir(), "json")?;

        let mut users = Vec::new();
        for id in user_ids {
            if let Ok(user) = self.get(&id) {
                users.push(user);
            }
        }

        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}
