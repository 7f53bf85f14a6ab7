// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Repository layer providing typed access to the JSON store.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using the FileStorage for all file operations.

pub mod admin_sessions;
pub mod admins;
pub mod books;
pub mod categories;
pub mod grants;
pub mod otp;
pub mod payments;
pub mod users;

pub use admin_sessions::{AdminSessionRepository, StoredAdminSession, ADMIN_SESSION_TTL_HOURS};
pub use admins::{AdminRepository, StoredAdminAccount, LOCKOUT_MINUTES, MAX_FAILED_ATTEMPTS};
pub use books::{BookRepository, StoredBook};
pub use categories::{CategoryRepository, StoredCategory};
pub use grants::{GrantRepository, StoredAccessGrant, GRANT_SCHEMA_VERSION};
pub use otp::{OtpRepository, StoredOtpCode, OTP_TTL_MINUTES};
pub use payments::{PaymentRepository, PaymentStatus, StoredPayment};
pub use users::{StoredUser, UserRepository};
