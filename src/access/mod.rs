// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! # Access Gate Module
//!
//! The paywall core: identity normalization, the gate state machine, and
//! token/OTP generation. See [`flow`] for the transition rules; the short
//! version is that an access token exists if and only if a completed
//! payment or a verified OTP put it there.

pub mod flow;
pub mod identity;
pub mod token;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::StoredAccessGrant;

pub use flow::{
    grant_access, issue_challenge, route_after_payment_lookup, verify_challenge, AccessProof,
    ChallengeError, GateOutcome, GrantError,
};
pub use identity::{
    checkout_phone, normalize_email, normalize_identity, normalize_phone, IdentityError,
    NormalizedIdentity,
};
pub use token::{generate_otp_code, generate_token, TokenError};

/// The typed session object the client persists after the gate opens.
///
/// This replaces the pile of loose browser-storage keys the original
/// storefront used. The schema is versioned so future fields can migrate
/// old clients; the token is the only credential, everything else is
/// display data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ClientSession {
    /// Session schema version.
    pub schema_version: u32,
    /// Opaque access token, validated server-side on every request.
    pub token: String,
    /// Normalized email.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// Name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// City, when the flow collects it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl From<&StoredAccessGrant> for ClientSession {
    fn from(grant: &StoredAccessGrant) -> Self {
        Self {
            schema_version: grant.schema_version,
            token: grant.token.clone(),
            email: grant.email.clone(),
            phone: grant.phone.clone(),
            name: grant.name.clone(),
            city: grant.city.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GRANT_SCHEMA_VERSION;
    use chrono::Utc;

    #[test]
    fn session_mirrors_grant() {
        let grant = StoredAccessGrant {
            token: "tok_x".to_string(),
            schema_version: GRANT_SCHEMA_VERSION,
            email: "a@b.com".to_string(),
            phone: "90123456".to_string(),
            name: Some("Ama".to_string()),
            city: Some("Cotonou".to_string()),
            issued_at: Utc::now(),
        };

        let session = ClientSession::from(&grant);
        assert_eq!(session.token, "tok_x");
        assert_eq!(session.schema_version, GRANT_SCHEMA_VERSION);
        assert_eq!(session.city.as_deref(), Some("Cotonou"));
    }
}
