// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Path constants and utilities for the JSON store layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent data.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the JSON store.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== User Paths ==========

    /// Directory containing all user records.
    pub fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    /// Path to a specific user file.
    pub fn user(&self, user_id: &str) -> PathBuf {
        self.users_dir().join(format!("{user_id}.json"))
    }

    // ========== Payment Paths ==========

    /// Directory containing all payment records.
    pub fn payments_dir(&self) -> PathBuf {
        self.root.join("payments")
    }

    /// Path to a specific payment file.
    pub fn payment(&self, payment_id: &str) -> PathBuf {
        self.payments_dir().join(format!("{payment_id}.json"))
    }

    // ========== OTP Paths ==========

    /// Directory containing all OTP code records.
    pub fn otp_dir(&self) -> PathBuf {
        self.root.join("otp")
    }

    /// Path to a specific OTP code file.
    pub fn otp_code(&self, otp_id: &str) -> PathBuf {
        self.otp_dir().join(format!("{otp_id}.json"))
    }

    // ========== Access Grant Paths ==========

    /// Directory containing all access grants.
    pub fn grants_dir(&self) -> PathBuf {
        self.root.join("grants")
    }

    /// Path to a specific access grant file (keyed by token).
    pub fn grant(&self, token: &str) -> PathBuf {
        self.grants_dir().join(format!("{token}.json"))
    }

    // ========== Admin Paths ==========

    /// Directory containing admin accounts.
    pub fn admins_dir(&self) -> PathBuf {
        self.root.join("admins")
    }

    /// Path to a specific admin account file.
    pub fn admin(&self, admin_id: &str) -> PathBuf {
        self.admins_dir().join(format!("{admin_id}.json"))
    }

    /// Directory containing admin sessions.
    pub fn admin_sessions_dir(&self) -> PathBuf {
        self.root.join("admin_sessions")
    }

    /// Path to a specific admin session file (keyed by token).
    pub fn admin_session(&self, token: &str) -> PathBuf {
        self.admin_sessions_dir().join(format!("{token}.json"))
    }

    // ========== Catalog Paths ==========

    /// Directory containing all categories.
    pub fn categories_dir(&self) -> PathBuf {
        self.root.join("categories")
    }

    /// Path to a specific category file.
    pub fn category(&self, category_id: &str) -> PathBuf {
        self.categories_dir().join(format!("{category_id}.json"))
    }

    /// Directory containing all books.
    pub fn books_dir(&self) -> PathBuf {
        self.root.join("books")
    }

    /// Path to a specific book file.
    pub fn book(&self, book_id: &str) -> PathBuf {
        self.books_dir().join(format!("{book_id}.json"))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Path to a specific date's audit events file (JSONL).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date).join("events.jsonl")
    }
}
