// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Axum extractors for the two token kinds.
//!
//! Use `LibraryAccess` in handlers gated by a paid library token, and
//! `AdminAuth` in admin console handlers:
//!
//! ```rust,ignore
//! async fn list_books(LibraryAccess(grant): LibraryAccess) -> impl IntoResponse {
//!     // grant is the server-side StoredAccessGrant
//! }
//! ```
//!
//! Both tokens are opaque strings validated against server-side records;
//! there is nothing to decode client-side and nothing a client can forge.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use super::AuthError;
use crate::state::AppState;
use crate::storage::{
    AdminSessionRepository, GrantRepository, StorageError, StoredAccessGrant, StoredAdminSession,
};

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Extractor for library access grants.
///
/// The entry gate and every catalog route take this: token present and
/// backed by a grant record → request proceeds; anything else → 401.
pub struct LibraryAccess(pub StoredAccessGrant);

impl FromRequestParts<AppState> for LibraryAccess {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let repo = GrantRepository::new(&state.storage);
        let grant = repo.get_by_token(token).map_err(|e| match e {
            StorageError::NotFound(_) => AuthError::UnknownToken,
            other => AuthError::InternalError(other.to_string()),
        })?;

        Ok(LibraryAccess(grant))
    }
}

/// Extractor for authenticated admins.
///
/// Validates the admin session token and its 24 hour expiry; an expired
/// session forces re-login.
pub struct AdminAuth(pub StoredAdminSession);

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let repo = AdminSessionRepository::new(&state.storage);

        // Distinguish expiry from unknown for the client message, while the
        // repository deletes the stale record either way.
        match repo.get_by_token(token) {
            Ok(session) if session.is_expired(Utc::now()) => {
                let _ = repo.delete(token);
                Err(AuthError::SessionExpired)
            }
            Ok(session) => Ok(AdminAuth(session)),
            Err(StorageError::NotFound(_)) => Err(AuthError::UnknownToken),
            Err(other) => Err(AuthError::InternalError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::storage::{StoredAccessGrant, StoredAdminSession, GRANT_SCHEMA_VERSION};
    use axum::http::Request;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let temp = TempDir::new().expect("create temp dir");
        let state = AppState::for_tests(temp.path());
        (state, temp)
    }

    fn request_parts(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn seed_grant(state: &AppState, token: &str) {
        GrantRepository::new(&state.storage)
            .create(&StoredAccessGrant {
                token: token.to_string(),
                schema_version: GRANT_SCHEMA_VERSION,
                email: "a@b.com".to_string(),
                phone: "90123456".to_string(),
                name: None,
                city: None,
                issued_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn library_access_requires_header() {
        let (state, _temp) = test_state();
        let mut parts = request_parts(None);

        let result = LibraryAccess::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn library_access_rejects_forged_token() {
        let (state, _temp) = test_state();
        let mut parts = request_parts(Some("made-up-token"));

        let result = LibraryAccess::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::UnknownToken)));
    }

    #[tokio::test]
    async fn library_access_accepts_known_token() {
        let (state, _temp) = test_state();
        seed_grant(&state, "tok_known");
        let mut parts = request_parts(Some("tok_known"));

        let result = LibraryAccess::from_request_parts(&mut parts, &state).await;
        let LibraryAccess(grant) = result.expect("grant accepted");
        assert_eq!(grant.email, "a@b.com");
    }

    #[tokio::test]
    async fn admin_auth_rejects_expired_session() {
        let (state, _temp) = test_state();

        let mut session = StoredAdminSession::new(
            "tok_admin".to_string(),
            "admin-1".to_string(),
            "root".to_string(),
        );
        session.issued_at = Utc::now() - Duration::hours(25);
        session.expires_at = Utc::now() - Duration::hours(1);
        AdminSessionRepository::new(&state.storage)
            .create(&session)
            .unwrap();

        let mut parts = request_parts(Some("tok_admin"));
        let result = AdminAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::SessionExpired)));

        // Re-presenting the token now fails as unknown: the record is gone
        let mut parts = request_parts(Some("tok_admin"));
        let result = AdminAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::UnknownToken)));
    }

    #[tokio::test]
    async fn admin_auth_accepts_live_session() {
        let (state, _temp) = test_state();

        let session = StoredAdminSession::new(
            "tok_live".to_string(),
            "admin-1".to_string(),
            "root".to_string(),
        );
        AdminSessionRepository::new(&state.storage)
            .create(&session)
            .unwrap();

        let mut parts = request_parts(Some("tok_live"));
        let AdminAuth(session) = AdminAuth::from_request_parts(&mut parts, &state)
            .await
            .expect("session accepted");
        assert_eq!(session.username, "root");
    }
}
