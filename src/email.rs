// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! OTP delivery.
//!
//! When `OTP_EMAIL_ENDPOINT` is configured, codes are sent via the external
//! transactional-email endpoint with a `{email, code}` payload. When it is
//! not, the service runs in on-screen delivery: the code comes back in the
//! API response for the client to display. On-screen delivery is a stand-in
//! for unconfigured email and provides no second factor.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::config::env_optional;

/// Environment variable for the transactional email endpoint.
pub const OTP_EMAIL_ENDPOINT_ENV: &str = "OTP_EMAIL_ENDPOINT";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("email delivery request failed: {0}")]
    Request(String),

    #[error("email delivery rejected: {0}")]
    Rejected(String),
}

/// How OTP codes reach the visitor.
#[derive(Debug, Clone)]
pub enum OtpDelivery {
    /// POST `{email, code}` to the external transactional send endpoint.
    Endpoint(String),
    /// Return the code in the API response for on-screen display.
    OnScreen,
}

impl OtpDelivery {
    /// Select the delivery mode from the environment.
    pub fn from_env() -> Self {
        match env_optional(OTP_EMAIL_ENDPOINT_ENV) {
            Some(endpoint) => OtpDelivery::Endpoint(endpoint),
            None => OtpDelivery::OnScreen,
        }
    }

    /// Deliver a code to the visitor.
    ///
    /// Returns `Some(code)` when the caller must surface the code in the
    /// API response (on-screen delivery), `None` when it went out of band.
    pub async fn send(&self, email: &str, code: &str) -> Result<Option<String>, DeliveryError> {
        match self {
            OtpDelivery::OnScreen => {
                info!(%email, "on-screen OTP delivery, code returned to client");
                Ok(Some(code.to_string()))
            }
            OtpDelivery::Endpoint(endpoint) => {
                let client = Client::builder()
                    .timeout(Duration::from_secs(15))
                    .build()
                    .map_err(|e| DeliveryError::Request(format!("failed to build HTTP client: {e}")))?;

                let response = client
                    .post(endpoint)
                    .json(&json!({ "email": email, "code": code }))
                    .send()
                    .await
                    .map_err(|e| DeliveryError::Request(e.to_string()))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(DeliveryError::Rejected(format!("{status}: {body}")));
                }

                info!(%email, "OTP code sent via email endpoint");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn on_screen_delivery_returns_code() {
        let delivery = OtpDelivery::OnScreen;
        let surfaced = delivery.send("a@b.com", "482913").await.unwrap();
        assert_eq!(surfaced.as_deref(), Some("482913"));
    }

    #[tokio::test]
    async fn endpoint_delivery_fails_on_unreachable_host() {
        let delivery = OtpDelivery::Endpoint("http://127.0.0.1:1/send".to_string());
        let result = delivery.send("a@b.com", "482913").await;
        assert!(matches!(result, Err(DeliveryError::Request(_))));
    }
}
