// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Access gate API: identity check, OTP challenge, entry gate.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    access::{
        grant_access, issue_challenge, normalize_email, normalize_identity,
        route_after_payment_lookup, verify_challenge, AccessProof, ChallengeError, ClientSession,
        GateOutcome, NormalizedIdentity,
    },
    auth::LibraryAccess,
    error::ApiError,
    state::AppState,
    storage::{PaymentRepository, PaymentStatus, UserRepository},
};

/// Identity form submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AccessCheckRequest {
    /// Full name (required for first-time visitors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// City (required for first-time visitors when the flow collects it).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Where the gate routed the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    /// Paid and verified: the session is in the response.
    Granted,
    /// Paid, but an OTP challenge must be passed first.
    Challenge,
    /// No completed payment on record: go pay.
    PaymentRequired,
}

/// Outcome of an identity check.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessCheckResponse {
    /// Routing decision.
    pub decision: AccessDecision,
    /// Minted session (decision = granted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ClientSession>,
    /// OTP code surfaced for on-screen delivery (decision = challenge,
    /// email delivery unconfigured).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
    /// Fee in minor units (decision = payment_required).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Fee currency (decision = payment_required).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Configured provider id (decision = payment_required).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// OTP verification submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    /// Email the challenge was issued to.
    pub email: String,
    /// The 6-digit code.
    pub code: String,
}

/// OTP resend request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResendOtpRequest {
    /// Email to reissue the challenge for.
    pub email: String,
    /// Phone number used at payment time.
    pub phone: String,
}

/// Challenge response for verify/resend endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChallengeResponse {
    /// OTP code surfaced for on-screen delivery, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

fn payment_required_response(state: &AppState) -> AccessCheckResponse {
    AccessCheckResponse {
        decision: AccessDecision::PaymentRequired,
        session: None,
        debug_code: None,
        amount: Some(state.flow.price),
        currency: Some(state.flow.currency.clone()),
        provider: Some(state.flow.provider.as_str().to_string()),
    }
}

fn map_challenge_error(error: ChallengeError) -> ApiError {
    match error {
        ChallengeError::Invalid => ApiError::unauthorized("Invalid or expired code"),
        ChallengeError::Storage(e) => ApiError::internal(format!("Storage error: {e}")),
        ChallengeError::Token(e) => ApiError::internal(format!("Token generation failed: {e}")),
        ChallengeError::Delivery(e) => {
            ApiError::bad_gateway(format!("Failed to deliver the code: {e}"))
        }
    }
}

/// Rebuild a normalized identity for an email from stored records.
///
/// The OTP verify step only carries the email; name/phone/city come from
/// the user record, falling back to the completed payment that justified
/// the challenge.
fn identity_for_email(state: &AppState, email: &str) -> Option<NormalizedIdentity> {
    let users = UserRepository::new(&state.storage);
    if let Ok(user) = users.get_by_email(email) {
        return Some(NormalizedIdentity {
            name: if user.name.is_empty() {
                None
            } else {
                Some(user.name)
            },
            email: user.email,
            phone: user.phone,
            city: user.city,
        });
    }

    let payments = PaymentRepository::new(&state.storage);
    let completed = payments
        .list_all(Some(PaymentStatus::Completed))
        .ok()?
        .into_iter()
        .find(|p| p.email == email)?;

    Some(NormalizedIdentity {
        name: None,
        email: completed.email,
        phone: completed.phone,
        city: None,
    })
}

/// Identity check: the gate's routing step.
///
/// Persists the submitted identity, looks for a completed payment for the
/// (email, phone) pair, then routes to grant, challenge or payment. A
/// storage error during the lookup is treated as "no payment found" so
/// errors fail toward requiring payment, never toward granting access.
#[utoipa::path(
    post,
    path = "/v1/access/check",
    tag = "Access",
    request_body = AccessCheckRequest,
    responses(
        (status = 200, description = "Routing decision", body = AccessCheckResponse),
        (status = 400, description = "Invalid identity fields")
    )
)]
pub async fn check(
    State(state): State<AppState>,
    Json(request): Json<AccessCheckRequest>,
) -> Result<Json<AccessCheckResponse>, ApiError> {
    let email = normalize_email(&request.email).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let users = UserRepository::new(&state.storage);
    let is_new_visitor = users.get_by_email(&email).is_err();

    let identity = normalize_identity(
        request.name.as_deref(),
        &request.email,
        &request.phone,
        request.city.as_deref(),
        state.flow.phone_format,
        state.flow.requires_city,
        is_new_visitor,
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;

    // Create/update the user before the payment lookup, like the original
    // flow: identity fields survive the redirect either way.
    if let Err(e) = users.upsert_identity(
        identity.name.as_deref(),
        &identity.email,
        &identity.phone,
        identity.city.as_deref(),
    ) {
        warn!(email = %identity.email, error = %e, "failed to persist identity");
    }

    let payments = PaymentRepository::new(&state.storage);
    let payment = match payments.find_completed(&identity.email, &identity.phone) {
        Ok(payment) => payment,
        Err(e) => {
            warn!(email = %identity.email, error = %e, "payment lookup failed, requiring payment");
            None
        }
    };

    match route_after_payment_lookup(payment.as_ref(), state.flow.requires_otp) {
        GateOutcome::Grant => {
            let payment = payment.ok_or_else(|| ApiError::internal("payment vanished"))?;
            let proof = AccessProof::from_completed_payment(&payment)
                .ok_or_else(|| ApiError::internal("proof rejected completed payment"))?;
            let session = grant_access(&state.storage, &identity, proof)
                .map_err(|e| ApiError::internal(format!("Failed to mint access token: {e}")))?;
            Ok(Json(AccessCheckResponse {
                decision: AccessDecision::Granted,
                session: Some(session),
                debug_code: None,
                amount: None,
                currency: None,
                provider: None,
            }))
        }
        GateOutcome::Challenge => {
            let debug_code = issue_challenge(&state.storage, &state.otp_delivery, &identity.email)
                .await
                .map_err(map_challenge_error)?;
            Ok(Json(AccessCheckResponse {
                decision: AccessDecision::Challenge,
                session: None,
                debug_code,
                amount: None,
                currency: None,
                provider: None,
            }))
        }
        GateOutcome::PaymentRequired => Ok(Json(payment_required_response(&state))),
    }
}

/// Verify an OTP challenge and mint the session.
#[utoipa::path(
    post,
    path = "/v1/access/otp/verify",
    tag = "Access",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted, session minted", body = ClientSession),
        (status = 401, description = "Invalid or expired code"),
        (status = 422, description = "No entitlement on record for this email")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<ClientSession>, ApiError> {
    let email = normalize_email(&request.email).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let proof =
        verify_challenge(&state.storage, &email, &request.code, Utc::now()).map_err(map_challenge_error)?;

    let identity = identity_for_email(&state, &email).ok_or_else(|| {
        ApiError::unprocessable("No payment on record for this email; start over")
    })?;

    let session = grant_access(&state.storage, &identity, proof)
        .map_err(|e| ApiError::internal(format!("Failed to mint access token: {e}")))?;

    Ok(Json(session))
}

/// Reissue an OTP challenge.
///
/// Requires a completed payment for the pair, same as the check step: no
/// code is ever issued to a visitor who has not paid. Prior active codes
/// are invalidated.
#[utoipa::path(
    post,
    path = "/v1/access/otp/resend",
    tag = "Access",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Fresh code issued", body = ChallengeResponse),
        (status = 402, description = "No completed payment on record")
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<ResendOtpRequest>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let email = normalize_email(&request.email).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let phone: String = request
        .phone
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let payments = PaymentRepository::new(&state.storage);
    let payment = match payments.find_completed(&email, &phone) {
        Ok(payment) => payment,
        Err(e) => {
            warn!(%email, error = %e, "payment lookup failed during resend");
            None
        }
    };

    if payment.is_none() {
        return Err(ApiError::payment_required(
            "No completed payment on record for this email and phone",
        ));
    }

    let debug_code = issue_challenge(&state.storage, &state.otp_delivery, &email)
        .await
        .map_err(map_challenge_error)?;

    Ok(Json(ChallengeResponse { debug_code }))
}

/// Entry gate: validate a stored token.
///
/// Token present and backed by a grant → the session comes back and the
/// client may skip identity collection. Anything else is a 401 from the
/// extractor. No side effects beyond a last-login touch.
#[utoipa::path(
    get,
    path = "/v1/access/session",
    tag = "Access",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token is valid", body = ClientSession),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn session(
    LibraryAccess(grant): LibraryAccess,
    State(state): State<AppState>,
) -> Json<ClientSession> {
    let users = UserRepository::new(&state.storage);
    if let Err(e) = users.touch_last_login(&grant.email) {
        warn!(email = %grant.email, error = %e, "failed to record last login");
    }
    Json(ClientSession::from(&grant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;
    use crate::storage::{GrantRepository, OtpRepository, StoredOtpCode, StoredPayment};
    use axum::http::StatusCode;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let temp = TempDir::new().expect("create temp dir");
        let state = AppState::for_tests(temp.path());
        (state, temp)
    }

    fn otp_state() -> (AppState, TempDir) {
        let temp = TempDir::new().expect("create temp dir");
        let state = AppState::for_tests_with_flow(
            temp.path(),
            FlowConfig {
                requires_otp: true,
                ..FlowConfig::default()
            },
        );
        (state, temp)
    }

    fn seed_completed_payment(state: &AppState, email: &str, phone: &str) {
        let payments = PaymentRepository::new(&state.storage);
        let payment = StoredPayment::new_pending(
            None,
            email.to_string(),
            phone.to_string(),
            3000,
            "XOF".to_string(),
            "simulation".to_string(),
        );
        payments.create(&payment).unwrap();
        payments.complete(&payment.id, Some("TX-1")).unwrap();
    }

    fn check_request(email: &str, phone: &str) -> AccessCheckRequest {
        AccessCheckRequest {
            name: Some("Ama Doe".to_string()),
            email: email.to_string(),
            phone: phone.to_string(),
            city: None,
        }
    }

    #[tokio::test]
    async fn paid_visitor_is_granted_without_repayment() {
        let (state, _temp) = test_state();
        seed_completed_payment(&state, "a@b.com", "90123456");

        let Json(response) = check(
            State(state.clone()),
            Json(check_request("a@b.com", "90123456")),
        )
        .await
        .expect("check succeeds");

        assert_eq!(response.decision, AccessDecision::Granted);
        let session = response.session.expect("session minted");
        assert_eq!(session.email, "a@b.com");

        // The token is backed by a server-side grant
        assert!(GrantRepository::new(&state.storage).exists(&session.token));
    }

    #[tokio::test]
    async fn unpaid_visitor_is_routed_to_payment_without_a_token() {
        let (state, _temp) = test_state();

        let Json(response) = check(
            State(state.clone()),
            Json(check_request("new@b.com", "90123456")),
        )
        .await
        .expect("check succeeds");

        assert_eq!(response.decision, AccessDecision::PaymentRequired);
        assert!(response.session.is_none());
        assert_eq!(response.amount, Some(3000));
        assert_eq!(response.provider.as_deref(), Some("simulation"));

        // No grant was minted on this path
        assert_eq!(GrantRepository::new(&state.storage).count().unwrap(), 0);

        // Identity fields survived for the payment page
        let user = UserRepository::new(&state.storage)
            .get_by_email("new@b.com")
            .unwrap();
        assert_eq!(user.name, "Ama Doe");
        assert_eq!(user.phone, "90123456");
        assert!(!user.has_paid);
    }

    #[tokio::test]
    async fn matching_pair_requires_both_email_and_phone() {
        let (state, _temp) = test_state();
        seed_completed_payment(&state, "a@b.com", "90123456");

        // Same email, different phone: no entitlement
        let Json(response) = check(
            State(state.clone()),
            Json(check_request("a@b.com", "97000000")),
        )
        .await
        .unwrap();
        assert_eq!(response.decision, AccessDecision::PaymentRequired);
    }

    #[tokio::test]
    async fn invalid_phone_is_rejected_inline() {
        let (state, _temp) = test_state();

        let result = check(
            State(state.clone()),
            Json(check_request("a@b.com", "12"))
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::BAD_REQUEST),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[tokio::test]
    async fn first_time_visitor_without_name_is_rejected() {
        let (state, _temp) = test_state();

        let result = check(
            State(state.clone()),
            Json(AccessCheckRequest {
                name: None,
                email: "anon@b.com".to_string(),
                phone: "90123456".to_string(),
                city: None,
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::BAD_REQUEST),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[tokio::test]
    async fn otp_flow_challenges_then_grants() {
        let (state, _temp) = otp_state();
        seed_completed_payment(&state, "a@b.com", "90123456");

        let Json(response) = check(
            State(state.clone()),
            Json(check_request("a@b.com", "90123456")),
        )
        .await
        .unwrap();

        assert_eq!(response.decision, AccessDecision::Challenge);
        assert!(response.session.is_none());
        let code = response.debug_code.expect("on-screen delivery");

        let Json(session) = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code,
            }),
        )
        .await
        .expect("verification succeeds");

        assert_eq!(session.email, "a@b.com");
        assert_eq!(session.phone, "90123456");
        assert!(GrantRepository::new(&state.storage).exists(&session.token));
    }

    #[tokio::test]
    async fn wrong_code_gets_generic_rejection() {
        let (state, _temp) = otp_state();
        seed_completed_payment(&state, "a@b.com", "90123456");

        check(
            State(state.clone()),
            Json(check_request("a@b.com", "90123456")),
        )
        .await
        .unwrap();

        let result = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: "000000".to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => {
                assert_eq!(err.status, StatusCode::UNAUTHORIZED);
                assert_eq!(err.message, "Invalid or expired code");
            }
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn expired_code_gets_generic_rejection() {
        let (state, _temp) = otp_state();
        seed_completed_payment(&state, "a@b.com", "90123456");

        // Issue a code that expired a minute ago
        let mut otp = StoredOtpCode::new("a@b.com".to_string(), "482913".to_string());
        otp.created_at = Utc::now() - Duration::minutes(11);
        otp.expires_at = Utc::now() - Duration::minutes(1);
        OtpRepository::new(&state.storage).create(&otp).unwrap();

        let result = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: "482913".to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.message, "Invalid or expired code"),
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn resend_requires_completed_payment() {
        let (state, _temp) = otp_state();

        let result = resend_otp(
            State(state.clone()),
            Json(ResendOtpRequest {
                email: "nobody@b.com".to_string(),
                phone: "90123456".to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED),
            Ok(_) => panic!("expected payment-required error"),
        }
    }

    #[tokio::test]
    async fn resend_invalidates_previous_code() {
        let (state, _temp) = otp_state();
        seed_completed_payment(&state, "a@b.com", "90123456");

        let Json(first) = check(
            State(state.clone()),
            Json(check_request("a@b.com", "90123456")),
        )
        .await
        .unwrap();
        let first_code = first.debug_code.unwrap();

        let Json(second) = resend_otp(
            State(state.clone()),
            Json(ResendOtpRequest {
                email: "a@b.com".to_string(),
                phone: "90123456".to_string(),
            }),
        )
        .await
        .unwrap();
        let second_code = second.debug_code.unwrap();

        if first_code != second_code {
            let stale = verify_otp(
                State(state.clone()),
                Json(VerifyOtpRequest {
                    email: "a@b.com".to_string(),
                    code: first_code,
                }),
            )
            .await;
            assert!(stale.is_err());
        }

        let fresh = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: second_code,
            }),
        )
        .await;
        assert!(fresh.is_ok());
    }
}
