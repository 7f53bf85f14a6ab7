// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! OTP code repository.
//!
//! A code is valid while it is unused and unexpired, and is consumed at most
//! once. Issuing a new code for an email expires all still-active codes for
//! that email, so at most one valid code exists per email at any time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Lifetime of an OTP code.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Short-lived verification code, stored server-side keyed by email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredOtpCode {
    /// Unique identifier (UUID).
    pub id: String,
    /// Normalized email this code was issued to.
    pub email: String,
    /// 6-digit numeric code.
    pub code: String,
    /// Expiry instant (issuance + 10 minutes).
    pub expires_at: DateTime<Utc>,
    /// Whether the code has been consumed.
    pub used: bool,
    /// When the code was consumed, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    /// Issuance timestamp.
    pub created_at: DateTime<Utc>,
}

impl StoredOtpCode {
    /// Construct a fresh code record expiring [`OTP_TTL_MINUTES`] from now.
    pub fn new(email: String, code: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            code,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            used: false,
            used_at: None,
            created_at: now,
        }
    }

    /// Whether the code can still be consumed at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.used && now <= self.expires_at
    }
}

/// Repository for OTP codes.
pub struct OtpRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> OtpRepository<'a> {
    /// Create a new OtpRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a code record exists.
    pub fn exists(&self, otp_id: &str) -> bool {
        self.storage.exists(self.storage.paths().otp_code(otp_id))
    }

    /// Get a code record by ID.
    pub fn get(&self, otp_id: &str) -> StorageResult<StoredOtpCode> {
        let path = self.storage.paths().otp_code(otp_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("OTP code {otp_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new code record.
    pub fn create(&self, otp: &StoredOtpCode) -> StorageResult<()> {
        if self.exists(&otp.id) {
            return Err(StorageError::AlreadyExists(format!("OTP code {}", otp.id)));
        }
        self.storage
            .write_json(self.storage.paths().otp_code(&otp.id), otp)
    }

    /// Update an existing code record.
    pub fn update(&self, otp: &StoredOtpCode) -> StorageResult<()> {
        if !self.exists(&otp.id) {
            return Err(StorageError::NotFound(format!("OTP code {}", otp.id)));
        }
        self.storage
            .write_json(self.storage.paths().otp_code(&otp.id), otp)
    }

    /// Find the active (unused, unexpired) record matching email + code.
    pub fn find_active(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredOtpCode>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().otp_dir(), "json")?;

        for id in ids {
            if let Ok(otp) = self.get(&id) {
                if otp.email == email && otp.code == code && otp.is_active(now) {
                    return Ok(Some(otp));
                }
            }
        }
        Ok(None)
    }

    /// Consume a code: mark it used with the consumption timestamp.
    ///
    /// Returns a conflict when the code was already consumed (single-use law:
    /// a used code is rejected even inside its expiry window).
    pub fn consume(&self, otp_id: &str, now: DateTime<Utc>) -> StorageResult<StoredOtpCode> {
        let mut otp = self.get(otp_id)?;
        if otp.used {
            return Err(StorageError::Conflict(format!(
                "OTP code {otp_id} already used"
            )));
        }
        otp.used = true;
        otp.used_at = Some(now);
        self.update(&otp)?;
        Ok(otp)
    }

    /// Expire every still-active code for an email.
    ///
    /// Called before issuing a replacement so a resend leaves a single valid
    /// code behind.
    pub fn invalidate_active(&self, email: &str, now: DateTime<Utc>) -> StorageResult<usize> {
        let ids = self
            .storage
            .list_files(self.storage.paths().otp_dir(), "json")?;

        let mut invalidated = 0;
        for id in ids {
            if let Ok(mut otp) = self.get(&id) {
                if otp.email == email && otp.is_active(now) {
                    otp.expires_at = now;
                    self.update(&otp)?;
                    invalidated += 1;
                }
            }
        }
        Ok(invalidated)
    }
}
