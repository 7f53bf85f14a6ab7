// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! FedaPay integration (tokenized redirect flow).
//!
//! Checkout creates a transaction against the FedaPay API; the response
//! carries a token under `v1.token` from which the hosted checkout URL is
//! built. Confirmation polls the transaction status.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FEDAPAY_API_BASE_URL` | API base | `https://sandbox-api.fedapay.com` |
//! | `FEDAPAY_SECRET_KEY` | Bearer key | required |
//! | `FEDAPAY_CHECKOUT_BASE_URL` | Hosted checkout base | `https://checkout.fedapay.com` |
//! | `FEDAPAY_CALLBACK_URL` | Redirect after checkout | `http://localhost:3000/payment/callback` |

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use super::{CheckoutSession, ProviderStatus};
use crate::config::{env_optional, env_or_default};

const DEFAULT_API_BASE_URL: &str = "https://sandbox-api.fedapay.com";
const DEFAULT_CHECKOUT_BASE_URL: &str = "https://checkout.fedapay.com";
const DEFAULT_CALLBACK_URL: &str = "http://localhost:3000/payment/callback";

/// Parameters for creating a FedaPay transaction.
pub struct CreateTransactionRequest<'a> {
    /// Payer email (normalized).
    pub email: &'a str,
    /// Payer phone with country prefix (e.g. `22990123456`).
    pub phone: &'a str,
    /// Amount in minor units.
    pub amount: u64,
    /// ISO currency code.
    pub currency: &'a str,
    /// Transaction description shown on the checkout page.
    pub description: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum FedapayError {
    #[error("FedaPay configuration missing: {0}")]
    MissingConfig(String),

    #[error("FedaPay request failed: {0}")]
    Request(String),

    #[error("FedaPay response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct FedapayClient {
    api_base_url: String,
    checkout_base_url: String,
    callback_url: String,
    secret_key: String,
    http: Client,
}

impl FedapayClient {
    pub fn is_configured() -> bool {
        env_optional("FEDAPAY_SECRET_KEY").is_some()
    }

    pub fn from_env() -> Result<Self, FedapayError> {
        let api_base_url = env_or_default("FEDAPAY_API_BASE_URL", DEFAULT_API_BASE_URL);
        let checkout_base_url =
            env_or_default("FEDAPAY_CHECKOUT_BASE_URL", DEFAULT_CHECKOUT_BASE_URL);
        let callback_url = env_or_default("FEDAPAY_CALLBACK_URL", DEFAULT_CALLBACK_URL);
        let secret_key = env_optional("FEDAPAY_SECRET_KEY")
            .ok_or_else(|| FedapayError::MissingConfig("FEDAPAY_SECRET_KEY".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| FedapayError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url,
            checkout_base_url,
            callback_url,
            secret_key,
            http,
        })
    }

    /// Create a transaction and derive the hosted checkout URL.
    pub async fn create_transaction(
        &self,
        request: CreateTransactionRequest<'_>,
    ) -> Result<CheckoutSession, FedapayError> {
        let payload = json!({
            "description": request.description,
            "amount": request.amount,
            "currency": { "iso": request.currency },
            "callback_url": self.callback_url,
            "customer": {
                "firstname": request.email.split('@').next().unwrap_or("user"),
                "lastname": "User",
                "email": request.email,
                "phone_number": {
                    "number": request.phone,
                    "country": "bj"
                }
            }
        });

        let response = self.post_json("/v1/transactions", &payload).await?;

        let reference = response
            .pointer("/v1/id")
            .and_then(value_as_id)
            .ok_or_else(|| {
                FedapayError::InvalidResponse("missing transaction id in response".to_string())
            })?;

        let token = response
            .pointer("/v1/token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FedapayError::InvalidResponse("missing checkout token in response".to_string())
            })?;

        info!(reference = %reference, "FedaPay transaction created");

        Ok(CheckoutSession {
            reference,
            checkout_url: Some(format!(
                "{}/{token}",
                self.checkout_base_url.trim_end_matches('/')
            )),
            status: ProviderStatus::Pending,
        })
    }

    /// Fetch the status of a transaction by reference.
    pub async fn fetch_status(&self, reference: &str) -> Result<ProviderStatus, FedapayError> {
        let response = self.get_json(&format!("/v1/transactions/{reference}")).await?;

        let status = response
            .pointer("/v1/status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FedapayError::InvalidResponse("missing transaction status in response".to_string())
            })?;

        Ok(map_transaction_status(status))
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, FedapayError> {
        let response = self
            .http
            .post(format!(
                "{}{}",
                self.api_base_url.trim_end_matches('/'),
                path
            ))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| FedapayError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FedapayError::Request(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FedapayError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }

    async fn get_json(&self, path: &str) -> Result<Value, FedapayError> {
        let response = self
            .http
            .get(format!(
                "{}{}",
                self.api_base_url.trim_end_matches('/'),
                path
            ))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|e| FedapayError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FedapayError::Request(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FedapayError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }
}

/// Map FedaPay transaction statuses onto the normalized provider status.
pub fn map_transaction_status(raw_status: &str) -> ProviderStatus {
    let status = raw_status.trim().to_ascii_lowercase();
    match status.as_str() {
        "approved" | "transferred" => ProviderStatus::Completed,
        "declined" | "canceled" | "expired" | "refunded" => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    }
}

/// Transaction ids arrive as numbers; checkout references are strings.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
