// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Payment API: checkout dispatch and confirmation.
//!
//! Checkout persists identity, opens a pending payment and hands off to the
//! configured provider. Confirmation polls the provider and is the only
//! place a pending payment can turn completed on its own; a grant is minted
//! strictly on the completed transition, never on failure or error.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    access::{
        checkout_phone, grant_access, normalize_email, normalize_phone, AccessProof,
        ClientSession, NormalizedIdentity,
    },
    audit_log,
    config::ProviderKind,
    error::ApiError,
    state::AppState,
    storage::{
        AuditEventType, PaymentRepository, PaymentStatus, StoredPayment, UserRepository,
    },
};
use crate::providers::{
    fedapay::{CreateTransactionRequest, FedapayClient, FedapayError},
    maketou::{CreateCartRequest, MaketouClient, MaketouError},
    ProviderStatus,
};

/// Fixed delay before the simulation provider reports success.
const SIMULATION_DELAY_MS: u64 = 2000;

/// Description line shown on hosted checkout pages.
const CHECKOUT_DESCRIPTION: &str = "Library access - one-time fee";

/// Checkout request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Payer email.
    pub email: String,
    /// Payer phone (mobile-money number).
    pub phone: String,
    /// Name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// City, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Checkout/confirmation response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentFlowResponse {
    /// Payment record id, used for confirmation.
    pub payment_id: String,
    /// Current payment status.
    pub status: PaymentStatus,
    /// Hosted checkout URL to redirect to (redirect providers, pending).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    /// Minted session (status = completed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ClientSession>,
}

fn map_fedapay_error(error: FedapayError) -> ApiError {
    match error {
        FedapayError::MissingConfig(message) => ApiError::service_unavailable(format!(
            "FedaPay is not configured: {message}"
        )),
        FedapayError::Request(message) | FedapayError::InvalidResponse(message) => {
            ApiError::bad_gateway(format!("FedaPay request failed: {message}"))
        }
    }
}

fn map_maketou_error(error: MaketouError) -> ApiError {
    match error {
        MaketouError::MissingConfig(message) => ApiError::service_unavailable(format!(
            "Maketou is not configured: {message}"
        )),
        MaketouError::Request(message) | MaketouError::InvalidResponse(message) => {
            ApiError::bad_gateway(format!("Maketou request failed: {message}"))
        }
    }
}

/// Complete a payment and mint the session in one step.
///
/// Shared by the simulation checkout and provider confirmation; the grant
/// only ever comes from the completed record produced here.
fn settle_payment(
    state: &AppState,
    payment_id: &str,
    reference: Option<&str>,
) -> Result<(StoredPayment, ClientSession), ApiError> {
    let payments = PaymentRepository::new(&state.storage);
    let completed = payments
        .complete(payment_id, reference)
        .map_err(|e| ApiError::internal(format!("Failed to record payment: {e}")))?;

    UserRepository::new(&state.storage)
        .mark_paid(&completed.email)
        .map_err(|e| ApiError::internal(format!("Failed to update user: {e}")))?;

    let identity = NormalizedIdentity {
        name: None,
        email: completed.email.clone(),
        phone: completed.phone.clone(),
        city: None,
    };
    let proof = AccessProof::from_completed_payment(&completed)
        .ok_or_else(|| ApiError::internal("proof rejected completed payment"))?;
    let session = grant_access(&state.storage, &identity, proof)
        .map_err(|e| ApiError::internal(format!("Failed to mint access token: {e}")))?;

    audit_log!(
        &state.storage,
        AuditEventType::PaymentCompleted,
        &completed.email,
        "payment",
        &completed.id
    );

    Ok((completed, session))
}

/// Start a checkout with the configured provider.
#[utoipa::path(
    post,
    path = "/v1/payments/checkout",
    tag = "Payments",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout started (or settled, in simulation)", body = PaymentFlowResponse),
        (status = 400, description = "Invalid identity fields"),
        (status = 502, description = "Aggregator error"),
        (status = 503, description = "Provider not configured")
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PaymentFlowResponse>), ApiError> {
    let email = normalize_email(&request.email).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let phone = normalize_phone(&request.phone, state.flow.phone_format)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    // Like the original flow, a payer without a stored name gets one derived
    // from the email local part.
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());

    let users = UserRepository::new(&state.storage);
    if let Err(e) = users.upsert_identity(
        Some(&name),
        &email,
        &phone,
        request.city.as_deref().map(str::trim).filter(|c| !c.is_empty()),
    ) {
        warn!(%email, error = %e, "failed to persist identity at checkout");
    }

    let provider = state.flow.provider;
    let mut payment = StoredPayment::new_pending(
        users.get_by_email(&email).ok().map(|u| u.id),
        email.clone(),
        phone.clone(),
        state.flow.price,
        state.flow.currency.clone(),
        provider.as_str().to_string(),
    );

    let payments = PaymentRepository::new(&state.storage);
    payments
        .create(&payment)
        .map_err(|e| ApiError::internal(format!("Failed to store payment: {e}")))?;

    audit_log!(
        &state.storage,
        AuditEventType::CheckoutStarted,
        &email,
        "payment",
        &payment.id
    );

    match provider {
        ProviderKind::Simulation => {
            tokio::time::sleep(std::time::Duration::from_millis(SIMULATION_DELAY_MS)).await;
            let reference = format!("SIM-{}", uuid::Uuid::new_v4());
            let (completed, session) = settle_payment(&state, &payment.id, Some(&reference))?;
            Ok((
                StatusCode::CREATED,
                Json(PaymentFlowResponse {
                    payment_id: completed.id,
                    status: completed.status,
                    checkout_url: None,
                    session: Some(session),
                }),
            ))
        }
        ProviderKind::Fedapay => {
            let client = FedapayClient::from_env().map_err(map_fedapay_error)?;
            let checkout = client
                .create_transaction(CreateTransactionRequest {
                    email: &email,
                    phone: &checkout_phone(&phone),
                    amount: state.flow.price,
                    currency: &state.flow.currency,
                    description: CHECKOUT_DESCRIPTION,
                })
                .await
                .map_err(map_fedapay_error)?;

            payment.reference = Some(checkout.reference);
            payment.checkout_url = checkout.checkout_url.clone();
            payment.updated_at = chrono::Utc::now();
            payments
                .update(&payment)
                .map_err(|e| ApiError::internal(format!("Failed to store payment: {e}")))?;

            Ok((
                StatusCode::CREATED,
                Json(PaymentFlowResponse {
                    payment_id: payment.id,
                    status: payment.status,
                    checkout_url: checkout.checkout_url,
                    session: None,
                }),
            ))
        }
        ProviderKind::Maketou => {
            let client = MaketouClient::from_env().map_err(map_maketou_error)?;
            let checkout = client
                .create_cart(CreateCartRequest {
                    email: &email,
                    phone: &checkout_phone(&phone),
                    amount: state.flow.price,
                    description: CHECKOUT_DESCRIPTION,
                })
                .await
                .map_err(map_maketou_error)?;

            payment.reference = Some(checkout.reference);
            payment.checkout_url = checkout.checkout_url.clone();
            payment.updated_at = chrono::Utc::now();
            payments
                .update(&payment)
                .map_err(|e| ApiError::internal(format!("Failed to store payment: {e}")))?;

            Ok((
                StatusCode::CREATED,
                Json(PaymentFlowResponse {
                    payment_id: payment.id,
                    status: payment.status,
                    checkout_url: checkout.checkout_url,
                    session: None,
                }),
            ))
        }
    }
}

/// Confirm a payment after the visitor returns from the hosted checkout.
///
/// Completed at the provider → the payment settles and the session is
/// minted. Failed at the provider → the payment is marked failed and no
/// token exists, simulation or not. Provider errors leave the payment
/// pending and untouched.
#[utoipa::path(
    post,
    path = "/v1/payments/{payment_id}/confirm",
    tag = "Payments",
    params(("payment_id" = String, Path, description = "Payment record id")),
    responses(
        (status = 200, description = "Current payment state", body = PaymentFlowResponse),
        (status = 402, description = "Payment failed at the provider"),
        (status = 404, description = "Unknown payment"),
        (status = 502, description = "Aggregator error")
    )
)]
pub async fn confirm(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentFlowResponse>, ApiError> {
    let payments = PaymentRepository::new(&state.storage);
    let payment = payments
        .get(&payment_id)
        .map_err(|_| ApiError::not_found("Payment not found"))?;

    match payment.status {
        PaymentStatus::Completed => {
            // Already settled: re-issue a session for the entitled payer.
            let identity = NormalizedIdentity {
                name: None,
                email: payment.email.clone(),
                phone: payment.phone.clone(),
                city: None,
            };
            let proof = AccessProof::from_completed_payment(&payment)
                .ok_or_else(|| ApiError::internal("proof rejected completed payment"))?;
            let session = grant_access(&state.storage, &identity, proof)
                .map_err(|e| ApiError::internal(format!("Failed to mint access token: {e}")))?;
            return Ok(Json(PaymentFlowResponse {
                payment_id: payment.id,
                status: payment.status,
                checkout_url: None,
                session: Some(session),
            }));
        }
        PaymentStatus::Failed => {
            return Err(ApiError::payment_required("Payment failed; please retry"));
        }
        PaymentStatus::Pending => {}
    }

    let provider: ProviderKind = payment
        .provider
        .parse()
        .map_err(|e: String| ApiError::internal(e))?;

    let provider_status = match provider {
        // A pending simulation payment settles on confirmation.
        ProviderKind::Simulation => ProviderStatus::Completed,
        ProviderKind::Fedapay => {
            let reference = payment.reference.as_deref().ok_or_else(|| {
                ApiError::conflict("Payment has no provider reference; restart checkout")
            })?;
            let client = FedapayClient::from_env().map_err(map_fedapay_error)?;
            client
                .fetch_status(reference)
                .await
                .map_err(map_fedapay_error)?
        }
        ProviderKind::Maketou => {
            let reference = payment.reference.as_deref().ok_or_else(|| {
                ApiError::conflict("Payment has no provider reference; restart checkout")
            })?;
            let client = MaketouClient::from_env().map_err(map_maketou_error)?;
            client
                .fetch_status(reference)
                .await
                .map_err(map_maketou_error)?
        }
    };

    match provider_status {
        ProviderStatus::Completed => {
            let (completed, session) = settle_payment(&state, &payment.id, None)?;
            Ok(Json(PaymentFlowResponse {
                payment_id: completed.id,
                status: completed.status,
                checkout_url: None,
                session: Some(session),
            }))
        }
        ProviderStatus::Failed => {
            let failed = payments
                .fail(&payment.id)
                .map_err(|e| ApiError::internal(format!("Failed to record payment: {e}")))?;
            audit_log!(
                &state.storage,
                AuditEventType::PaymentFailed,
                &failed.email,
                "payment",
                &failed.id
            );
            Err(ApiError::payment_required("Payment failed; please retry"))
        }
        ProviderStatus::Pending => Ok(Json(PaymentFlowResponse {
            payment_id: payment.id,
            status: PaymentStatus::Pending,
            checkout_url: payment.checkout_url,
            session: None,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GrantRepository;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let temp = TempDir::new().expect("create temp dir");
        let state = AppState::for_tests(temp.path());
        (state, temp)
    }

    fn checkout_request(email: &str, phone: &str) -> CheckoutRequest {
        CheckoutRequest {
            email: email.to_string(),
            phone: phone.to_string(),
            name: None,
            city: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_checkout_settles_and_mints() {
        let (state, _temp) = test_state();

        let (status, Json(response)) = checkout(
            State(state.clone()),
            Json(checkout_request("a@b.com", "90123456")),
        )
        .await
        .expect("checkout succeeds");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.status, PaymentStatus::Completed);
        let session = response.session.expect("session minted");
        assert!(GrantRepository::new(&state.storage).exists(&session.token));

        // Payment recorded completed with a synthesized reference
        let payment = PaymentRepository::new(&state.storage)
            .get(&response.payment_id)
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.reference.unwrap().starts_with("SIM-"));

        // User record exists, marked paid, name derived from the email
        let user = UserRepository::new(&state.storage)
            .get_by_email("a@b.com")
            .unwrap();
        assert!(user.has_paid);
        assert_eq!(user.name, "a");
    }

    #[tokio::test]
    async fn checkout_rejects_invalid_phone() {
        let (state, _temp) = test_state();

        let result = checkout(
            State(state.clone()),
            Json(checkout_request("a@b.com", "not-a-phone")),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::BAD_REQUEST),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[tokio::test]
    async fn confirm_unknown_payment_is_404() {
        let (state, _temp) = test_state();

        let result = confirm(State(state.clone()), Path("no-such-id".to_string())).await;
        match result {
            Err(err) => assert_eq!(err.status, StatusCode::NOT_FOUND),
            Ok(_) => panic!("expected not found"),
        }
    }

    #[tokio::test]
    async fn failed_payment_never_mints_a_token() {
        let (state, _temp) = test_state();
        let payments = PaymentRepository::new(&state.storage);

        let payment = StoredPayment::new_pending(
            None,
            "a@b.com".to_string(),
            "90123456".to_string(),
            3000,
            "XOF".to_string(),
            "simulation".to_string(),
        );
        payments.create(&payment).unwrap();
        payments.fail(&payment.id).unwrap();

        let result = confirm(State(state.clone()), Path(payment.id.clone())).await;
        match result {
            Err(err) => assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED),
            Ok(_) => panic!("expected payment-required error"),
        }

        // The failure path minted nothing
        assert_eq!(GrantRepository::new(&state.storage).count().unwrap(), 0);
    }

    #[tokio::test]
    async fn redirect_payment_without_reference_conflicts() {
        let (state, _temp) = test_state();
        let payments = PaymentRepository::new(&state.storage);

        // A fedapay payment that never got a provider reference
        let payment = StoredPayment::new_pending(
            None,
            "a@b.com".to_string(),
            "90123456".to_string(),
            3000,
            "XOF".to_string(),
            "fedapay".to_string(),
        );
        payments.create(&payment).unwrap();

        let result = confirm(State(state.clone()), Path(payment.id.clone())).await;
        match result {
            Err(err) => assert_eq!(err.status, StatusCode::CONFLICT),
            Ok(_) => panic!("expected conflict"),
        }

        // Payment untouched, no grant
        let reloaded = payments.get(&payment.id).unwrap();
        assert_eq!(reloaded.status, PaymentStatus::Pending);
        assert_eq!(GrantRepository::new(&state.storage).count().unwrap(), 0);
    }
}
