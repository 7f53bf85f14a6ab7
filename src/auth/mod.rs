// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! # Authentication Module
//!
//! Two independent gates, both backed by opaque server-validated tokens:
//!
//! 1. **Library access** — a visitor who has paid (directly, or after an
//!    OTP challenge) holds an access token; [`LibraryAccess`] validates it
//!    against the grant store on every catalog request. Grants do not
//!    expire.
//! 2. **Admin console** — per-admin accounts with argon2id password hashes
//!    and failure lockout; [`AdminAuth`] validates the session token and
//!    its 24 hour lifetime.
//!
//! Neither token carries claims. The token string is the whole credential,
//! and the server-side record is the whole truth.

pub mod error;
pub mod extractor;
pub mod password;

pub use error::AuthError;
pub use extractor::{AdminAuth, LibraryAccess};
pub use password::{hash_password, verify_password};
