// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Access grant repository.
//!
//! A grant is the server-side record behind a library access token. The
//! client keeps only the opaque token; every gated request is validated
//! against this store, so a fabricated token is worthless. Grants carry a
//! schema version for future migration and do not expire.
//!
//! Grants are only ever created through [`crate::access::grant_access`],
//! which requires proof of a completed payment or a verified OTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Current grant schema version.
pub const GRANT_SCHEMA_VERSION: u32 = 1;

/// Server-side record of a minted library access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredAccessGrant {
    /// The opaque token (URL-safe base64). Doubles as the record key.
    pub token: String,
    /// Schema version for future migration.
    pub schema_version: u32,
    /// Normalized email of the entitled visitor.
    pub email: String,
    /// Phone number of the entitled visitor.
    pub phone: String,
    /// Name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// City, when the flow collects it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// When the grant was minted.
    pub issued_at: DateTime<Utc>,
}

/// Repository for access grants.
pub struct GrantRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> GrantRepository<'a> {
    /// Create a new GrantRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a grant exists for a token.
    pub fn exists(&self, token: &str) -> bool {
        self.storage.exists(self.storage.paths().grant(token))
    }

    /// Get a grant by token.
    pub fn get_by_token(&self, token: &str) -> StorageResult<StoredAccessGrant> {
        let path = self.storage.paths().grant(token);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound("Access grant".to_string()));
        }
        self.storage.read_json(path)
    }

    /// Persist a new grant.
    pub fn create(&self, grant: &StoredAccessGrant) -> StorageResult<()> {
        if self.exists(&grant.token) {
            return Err(StorageError::AlreadyExists("Access grant".to_string()));
        }
        self.storage
            .write_json(self.storage.paths().grant(&grant.token), grant)
    }

    /// Delete a grant (revocation).
    pub fn delete(&self, token: &str) -> StorageResult<()> {
        if !self.exists(token) {
            return Err(StorageError::NotFound("Access grant".to_string()));
        }
        self.storage.delete(self.storage.paths().grant(token))
    }

    /// Count all grants (admin stats).
    pub fn count(&self) -> StorageResult<usize> {
        Ok(self
            .storage
            .list_files(self.storage.paths().grants_dir(), "json")?
            .len())
    }
}
