// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Maketou integration (cart checkout flow).
//!
//! Checkout creates a cart against the store API and redirects the visitor
//! to the returned checkout URL. Confirmation polls the cart status.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MAKETOU_API_BASE_URL` | API base | `https://api.maketou.net` |
//! | `MAKETOU_API_KEY` | Bearer key | required |
//! | `MAKETOU_STORE_ID` | Store identifier | required |
//! | `MAKETOU_RETURN_URL` | Redirect after checkout | `http://localhost:3000/payment/callback` |

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use super::{CheckoutSession, ProviderStatus};
use crate::config::{env_optional, env_or_default};

const DEFAULT_API_BASE_URL: &str = "https://api.maketou.net";
const DEFAULT_RETURN_URL: &str = "http://localhost:3000/payment/callback";

/// Parameters for creating a Maketou cart.
pub struct CreateCartRequest<'a> {
    /// Payer email (normalized).
    pub email: &'a str,
    /// Payer phone with country prefix.
    pub phone: &'a str,
    /// Amount in minor units.
    pub amount: u64,
    /// Line item label shown at checkout.
    pub description: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum MaketouError {
    #[error("Maketou configuration missing: {0}")]
    MissingConfig(String),

    #[error("Maketou request failed: {0}")]
    Request(String),

    #[error("Maketou response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct MaketouClient {
    api_base_url: String,
    api_key: String,
    store_id: String,
    return_url: String,
    http: Client,
}

impl MaketouClient {
    pub fn is_configured() -> bool {
        env_optional("MAKETOU_API_KEY").is_some() && env_optional("MAKETOU_STORE_ID").is_some()
    }

    pub fn from_env() -> Result<Self, MaketouError> {
        let api_base_url = env_or_default("MAKETOU_API_BASE_URL", DEFAULT_API_BASE_URL);
        let api_key = env_optional("MAKETOU_API_KEY")
            .ok_or_else(|| MaketouError::MissingConfig("MAKETOU_API_KEY".to_string()))?;
        let store_id = env_optional("MAKETOU_STORE_ID")
            .ok_or_else(|| MaketouError::MissingConfig("MAKETOU_STORE_ID".to_string()))?;
        let return_url = env_or_default("MAKETOU_RETURN_URL", DEFAULT_RETURN_URL);

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MaketouError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url,
            api_key,
            store_id,
            return_url,
            http,
        })
    }

    /// Create a cart and return the hosted checkout URL.
    pub async fn create_cart(
        &self,
        request: CreateCartRequest<'_>,
    ) -> Result<CheckoutSession, MaketouError> {
        let payload = json!({
            "store_id": self.store_id,
            "items": [{
                "name": request.description,
                "amount": request.amount,
                "quantity": 1
            }],
            "customer": {
                "email": request.email,
                "phone": request.phone
            },
            "return_url": self.return_url
        });

        let response = self.post_json("/api/v1/stores/cart", &payload).await?;

        let reference = response
            .get("id")
            .or_else(|| response.get("cart_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                MaketouError::InvalidResponse("missing cart id in response".to_string())
            })?;

        let checkout_url = response
            .get("checkout_url")
            .or_else(|| response.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if checkout_url.is_none() {
            return Err(MaketouError::InvalidResponse(
                "missing checkout url in response".to_string(),
            ));
        }

        info!(reference = %reference, "Maketou cart created");

        Ok(CheckoutSession {
            reference,
            checkout_url,
            status: ProviderStatus::Pending,
        })
    }

    /// Fetch the status of a cart by reference.
    pub async fn fetch_status(&self, reference: &str) -> Result<ProviderStatus, MaketouError> {
        let response = self
            .get_json(&format!("/api/v1/stores/cart/{reference}"))
            .await?;

        let status = response
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MaketouError::InvalidResponse("missing cart status in response".to_string())
            })?;

        Ok(map_cart_status(status))
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, MaketouError> {
        let response = self
            .http
            .post(format!(
                "{}{}",
                self.api_base_url.trim_end_matches('/'),
                path
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| MaketouError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MaketouError::Request(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MaketouError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }

    async fn get_json(&self, path: &str) -> Result<Value, MaketouError> {
        let response = self
            .http
            .get(format!(
                "{}{}",
                self.api_base_url.trim_end_matches('/'),
                path
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| MaketouError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MaketouError::Request(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MaketouError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }
}

/// Map Maketou cart statuses onto the normalized provider status.
pub fn map_cart_status(raw_status: &str) -> ProviderStatus {
    let status = raw_status.trim().to_ascii_lowercase();
    match status.as_str() {
        "completed" | "paid" => ProviderStatus::Completed,
        "failed" | "cancelled" | "expired" => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_status_mapping_is_stable() {
        assert_eq!(map_cart_status("completed"), ProviderStatus::Completed);
        assert_eq!(map_cart_status("PAID"), ProviderStatus::Completed);
        assert_eq!(map_cart_status("cancelled"), ProviderStatus::Failed);
        assert_eq!(map_cart_status("open"), ProviderStatus::Pending);
    }
}
