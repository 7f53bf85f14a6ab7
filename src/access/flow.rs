// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! The access gate state machine.
//!
//! ```text
//! Start ── identity ──> IdentityCollected
//!    IdentityCollected ── no completed payment ──> PaymentRequired
//!    IdentityCollected ── payment, otp off ─────> PaymentConfirmed
//!    IdentityCollected ── payment, otp on ──────> ChallengeIssued
//!    ChallengeIssued ──── code consumed ────────> OtpVerified
//!    PaymentConfirmed | OtpVerified ── grant ───> Granted
//! ```
//!
//! `Granted` is reachable only through [`grant_access`], which demands an
//! [`AccessProof`]. A proof can only be built from a payment record whose
//! status is completed, or from an OTP record that was actually consumed.
//! There is no catch-all transition: a failed or erroring confirmation can
//! never mint a token.

use chrono::{DateTime, Utc};
use tracing::info;

use super::identity::NormalizedIdentity;
use super::token::{generate_token, TokenError};
use super::ClientSession;
use crate::email::{DeliveryError, OtpDelivery};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, GrantRepository, OtpRepository,
    PaymentStatus, StorageError, StoredAccessGrant, StoredOtpCode, StoredPayment, UserRepository,
    GRANT_SCHEMA_VERSION,
};

/// Where the identity check routes a visitor next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Completed payment found, OTP off: mint the grant now.
    Grant,
    /// Completed payment found, OTP on: issue a challenge first.
    Challenge,
    /// No completed payment: hand off to the payment redirector.
    PaymentRequired,
}

/// Route a visitor after the completed-payment lookup.
pub fn route_after_payment_lookup(
    payment: Option<&StoredPayment>,
    requires_otp: bool,
) -> GateOutcome {
    match payment {
        Some(p) if p.status == PaymentStatus::Completed => {
            if requires_otp {
                GateOutcome::Challenge
            } else {
                GateOutcome::Grant
            }
        }
        // A non-completed record is no entitlement at all.
        _ => GateOutcome::PaymentRequired,
    }
}

/// Proof of entitlement. The only two ways into `Granted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessProof {
    /// A payment with status completed for this (email, phone) pair.
    CompletedPayment { payment_id: String },
    /// A consumed OTP challenge for this email.
    VerifiedOtp { otp_id: String },
}

impl AccessProof {
    /// Build a proof from a payment record. Refuses anything not completed.
    pub fn from_completed_payment(payment: &StoredPayment) -> Option<Self> {
        if payment.status == PaymentStatus::Completed {
            Some(AccessProof::CompletedPayment {
                payment_id: payment.id.clone(),
            })
        } else {
            None
        }
    }

    /// Build a proof from an OTP record. Refuses anything not consumed.
    pub fn from_consumed_otp(otp: &StoredOtpCode) -> Option<Self> {
        if otp.used {
            Some(AccessProof::VerifiedOtp {
                otp_id: otp.id.clone(),
            })
        } else {
            None
        }
    }

    fn describe(&self) -> (&'static str, &str) {
        match self {
            AccessProof::CompletedPayment { payment_id } => ("payment", payment_id),
            AccessProof::VerifiedOtp { otp_id } => ("otp", otp_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Mint an access grant. The single guarded transition into `Granted`.
pub fn grant_access(
    storage: &FileStorage,
    identity: &NormalizedIdentity,
    proof: AccessProof,
) -> Result<ClientSession, GrantError> {
    let token = generate_token()?;

    let grant = StoredAccessGrant {
        token,
        schema_version: GRANT_SCHEMA_VERSION,
        email: identity.email.clone(),
        phone: identity.phone.clone(),
        name: identity.name.clone(),
        city: identity.city.clone(),
        issued_at: Utc::now(),
    };
    GrantRepository::new(storage).create(&grant)?;

    let users = UserRepository::new(storage);
    users.mark_paid(&identity.email)?;
    users.touch_last_login(&identity.email)?;

    let (proof_type, proof_id) = proof.describe();
    let _ = AuditRepository::new(storage).log(
        &AuditEvent::new(AuditEventType::AccessGranted)
            .with_actor(&identity.email)
            .with_resource(proof_type, proof_id),
    );
    info!(email = %identity.email, proof = proof_type, "access granted");

    Ok(ClientSession::from(&grant))
}

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    /// One message for mismatch, reuse and expiry alike.
    #[error("Invalid or expired code")]
    Invalid,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Issue a fresh OTP challenge for an email.
///
/// Prior active codes are expired first so a resend leaves exactly one
/// valid code. Returns the code to surface in the response when delivery
/// is on-screen.
pub async fn issue_challenge(
    storage: &FileStorage,
    delivery: &OtpDelivery,
    email: &str,
) -> Result<Option<String>, ChallengeError> {
    let now = Utc::now();
    let repo = OtpRepository::new(storage);
    repo.invalidate_active(email, now)?;

    let code = super::token::generate_otp_code()?;
    let otp = StoredOtpCode::new(email.to_string(), code.clone());
    repo.create(&otp)?;

    let surfaced = delivery.send(email, &code).await?;

    let _ = AuditRepository::new(storage).log(
        &AuditEvent::new(AuditEventType::OtpIssued)
            .with_actor(email)
            .with_resource("otp", &otp.id),
    );
    info!(%email, "OTP challenge issued");

    Ok(surfaced)
}

/// Verify a submitted code and consume it.
///
/// Success yields the proof for [`grant_access`]. Mismatch, reuse and
/// expiry all collapse into [`ChallengeError::Invalid`] so callers cannot
/// distinguish the cause.
pub fn verify_challenge(
    storage: &FileStorage,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<AccessProof, ChallengeError> {
    let repo = OtpRepository::new(storage);

    let otp = match repo.find_active(email, code.trim(), now)? {
        Some(otp) => otp,
        None => {
            let _ = AuditRepository::new(storage)
                .log(&AuditEvent::new(AuditEventType::OtpRejected).with_actor(email));
            return Err(ChallengeError::Invalid);
        }
    };

    let consumed = match repo.consume(&otp.id, now) {
        Ok(consumed) => consumed,
        Err(StorageError::Conflict(_)) => return Err(ChallengeError::Invalid),
        Err(e) => return Err(e.into()),
    };

    let _ = AuditRepository::new(storage).log(
        &AuditEvent::new(AuditEventType::OtpVerified)
            .with_actor(email)
            .with_resource("otp", &consumed.id),
    );

    AccessProof::from_consumed_otp(&consumed).ok_or(ChallengeError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PaymentRepository, StoragePaths};
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStorage) {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let mut storage = FileStorage::new(paths);
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn identity() -> NormalizedIdentity {
        NormalizedIdentity {
            name: Some("Ama Doe".to_string()),
            email: "a@b.com".to_string(),
            phone: "90123456".to_string(),
            city: None,
        }
    }

    fn pending_payment() -> StoredPayment {
        StoredPayment::new_pending(
            None,
            "a@b.com".to_string(),
            "90123456".to_string(),
            3000,
            "XOF".to_string(),
            "simulation".to_string(),
        )
    }

    #[test]
    fn routing_honors_payment_and_otp_flag() {
        let (_temp, storage) = setup();
        let payments = PaymentRepository::new(&storage);

        let payment = pending_payment();
        payments.create(&payment).unwrap();

        // Pending payment is not an entitlement
        assert_eq!(
            route_after_payment_lookup(Some(&payment), false),
            GateOutcome::PaymentRequired
        );

        let completed = payments.complete(&payment.id, Some("SIM-1")).unwrap();
        assert_eq!(
            route_after_payment_lookup(Some(&completed), false),
            GateOutcome::Grant
        );
        assert_eq!(
            route_after_payment_lookup(Some(&completed), true),
            GateOutcome::Challenge
        );
        assert_eq!(
            route_after_payment_lookup(None, false),
            GateOutcome::PaymentRequired
        );
    }

    #[test]
    fn proof_refuses_non_completed_payment() {
        let payment = pending_payment();
        assert!(AccessProof::from_completed_payment(&payment).is_none());

        let mut failed = pending_payment();
        failed.status = PaymentStatus::Failed;
        assert!(AccessProof::from_completed_payment(&failed).is_none());

        let mut completed = pending_payment();
        completed.status = PaymentStatus::Completed;
        assert!(AccessProof::from_completed_payment(&completed).is_some());
    }

    #[test]
    fn proof_refuses_unconsumed_otp() {
        let otp = StoredOtpCode::new("a@b.com".to_string(), "482913".to_string());
        assert!(AccessProof::from_consumed_otp(&otp).is_none());
    }

    #[test]
    fn grant_access_mints_server_backed_token() {
        let (_temp, storage) = setup();
        let payments = PaymentRepository::new(&storage);

        let payment = pending_payment();
        payments.create(&payment).unwrap();
        let completed = payments.complete(&payment.id, None).unwrap();

        let proof = AccessProof::from_completed_payment(&completed).unwrap();
        let session = grant_access(&storage, &identity(), proof).unwrap();

        assert_eq!(session.email, "a@b.com");
        let grant = GrantRepository::new(&storage)
            .get_by_token(&session.token)
            .unwrap();
        assert_eq!(grant.phone, "90123456");
    }

    #[tokio::test]
    async fn challenge_round_trip() {
        let (_temp, storage) = setup();
        let delivery = OtpDelivery::OnScreen;

        let code = issue_challenge(&storage, &delivery, "a@b.com")
            .await
            .unwrap()
            .expect("on-screen delivery surfaces the code");

        let proof = verify_challenge(&storage, "a@b.com", &code, Utc::now()).unwrap();
        assert!(matches!(proof, AccessProof::VerifiedOtp { .. }));

        // Second submission of the same code fails: single-use law
        let again = verify_challenge(&storage, "a@b.com", &code, Utc::now());
        assert!(matches!(again, Err(ChallengeError::Invalid)));
    }

    #[tokio::test]
    async fn expired_code_is_generic_invalid() {
        let (_temp, storage) = setup();
        let delivery = OtpDelivery::OnScreen;

        let code = issue_challenge(&storage, &delivery, "a@b.com")
            .await
            .unwrap()
            .unwrap();

        let eleven_minutes_later = Utc::now() + Duration::minutes(11);
        let result = verify_challenge(&storage, "a@b.com", &code, eleven_minutes_later);
        assert!(matches!(result, Err(ChallengeError::Invalid)));
    }

    #[tokio::test]
    async fn reissue_invalidates_prior_code() {
        let (_temp, storage) = setup();
        let delivery = OtpDelivery::OnScreen;

        let first = issue_challenge(&storage, &delivery, "a@b.com")
            .await
            .unwrap()
            .unwrap();
        let second = issue_challenge(&storage, &delivery, "a@b.com")
            .await
            .unwrap()
            .unwrap();

        // The first code no longer verifies, the second does
        let later = Utc::now() + Duration::seconds(1);
        if first != second {
            assert!(matches!(
                verify_challenge(&storage, "a@b.com", &first, later),
                Err(ChallengeError::Invalid)
            ));
        }
        assert!(verify_challenge(&storage, "a@b.com", &second, later).is_ok());
    }

    #[test]
    fn wrong_code_is_generic_invalid() {
        let (_temp, storage) = setup();
        let result = verify_challenge(&storage, "a@b.com", "000000", Utc::now());
        assert!(matches!(result, Err(ChallengeError::Invalid)));
    }
}
