// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! # Storage Module
//!
//! Persistent storage for the library service, backed by plain JSON files.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   users/{user_id}.json
//!   payments/{payment_id}.json
//!   otp/{otp_id}.json
//!   grants/{token}.json
//!   admins/{admin_id}.json
//!   admin_sessions/{token}.json
//!   categories/{category_id}.json
//!   books/{book_id}.json
//!   audit/{date}/events.jsonl
//! ```
//!
//! Writes are atomic (temp file + rename). The layout replaces the hosted
//! relational backend of the original storefront: one table per directory.

pub mod audit;
pub mod json_fs;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use json_fs::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    AdminRepository, AdminSessionRepository, BookRepository, CategoryRepository, GrantRepository,
    OtpRepository, PaymentRepository, PaymentStatus, StoredAccessGrant, StoredAdminAccount,
    StoredAdminSession, StoredBook, StoredCategory, StoredOtpCode, StoredPayment, StoredUser,
    UserRepository, ADMIN_SESSION_TTL_HOURS, GRANT_SCHEMA_VERSION, LOCKOUT_MINUTES,
    MAX_FAILED_ATTEMPTS, OTP_TTL_MINUTES,
};
