// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! # Runtime Configuration
//!
//! This module defines environment variable names, defaults, and the access
//! flow configuration loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the JSON store | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `PAYMENT_PROVIDER` | `simulation`, `fedapay` or `maketou` | `simulation` |
//! | `REQUIRES_OTP` | OTP challenge before granting returning payers | `false` |
//! | `REQUIRES_CITY` | City required on first identity submission | `false` |
//! | `PHONE_FORMAT` | `local8`, `bj` or `international` | `bj` |
//! | `LIBRARY_ACCESS_PRICE` | One-time fee in minor units | `3000` |
//! | `LIBRARY_ACCESS_CURRENCY` | ISO currency code | `XOF` |
//! | `OTP_EMAIL_ENDPOINT` | Transactional email endpoint for OTP delivery | unset (on-screen delivery) |
//! | `SEED_ADMIN_USERNAME` | Bootstrap admin username | unset |
//! | `SEED_ADMIN_PASSWORD` | Bootstrap admin password | unset |
//!
//! FedaPay and Maketou aggregator variables are documented in
//! [`crate::providers`].
//!
//! The `{PAYMENT_PROVIDER, REQUIRES_OTP, REQUIRES_CITY}` triple is the
//! declarative flow object that replaces the page-variant sprawl of the
//! original storefront: one configurable flow instead of five drafts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable selecting the payment provider.
pub const PAYMENT_PROVIDER_ENV: &str = "PAYMENT_PROVIDER";

/// Environment variable enabling the OTP challenge.
pub const REQUIRES_OTP_ENV: &str = "REQUIRES_OTP";

/// Environment variable requiring city on first identity submission.
pub const REQUIRES_CITY_ENV: &str = "REQUIRES_CITY";

/// Environment variable selecting the phone validation pattern.
pub const PHONE_FORMAT_ENV: &str = "PHONE_FORMAT";

/// Environment variable for the one-time access price (minor units).
pub const ACCESS_PRICE_ENV: &str = "LIBRARY_ACCESS_PRICE";

/// Environment variable for the access price currency.
pub const ACCESS_CURRENCY_ENV: &str = "LIBRARY_ACCESS_CURRENCY";

/// Default one-time access fee (minor units).
pub const DEFAULT_ACCESS_PRICE: u64 = 3000;

/// Default currency for the access fee.
pub const DEFAULT_ACCESS_CURRENCY: &str = "XOF";

/// Payment provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// No external aggregator; transactions are synthesized after a delay.
    Simulation,
    /// FedaPay tokenized redirect flow.
    Fedapay,
    /// Maketou cart checkout flow.
    Maketou,
}

impl ProviderKind {
    /// Stable identifier used in payment records and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Simulation => "simulation",
            ProviderKind::Fedapay => "fedapay",
            ProviderKind::Maketou => "maketou",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulation" => Ok(ProviderKind::Simulation),
            "fedapay" => Ok(ProviderKind::Fedapay),
            "maketou" => Ok(ProviderKind::Maketou),
            other => Err(format!("unknown payment provider `{other}`")),
        }
    }
}

/// Phone validation pattern.
///
/// The original storefront shipped several patterns of varying strictness;
/// the deployed one is selected here instead of per page variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhoneFormat {
    /// Exactly 8 local digits.
    Local8,
    /// Benin numbering: 8 local digits, optionally prefixed with `229`.
    Bj,
    /// Generic international: 10 to 15 digits, optional leading `+`.
    International,
}

impl FromStr for PhoneFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local8" => Ok(PhoneFormat::Local8),
            "bj" => Ok(PhoneFormat::Bj),
            "international" => Ok(PhoneFormat::International),
            other => Err(format!("unknown phone format `{other}`")),
        }
    }
}

/// Declarative access flow configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Which payment provider checkout dispatches to.
    pub provider: ProviderKind,
    /// Whether returning payers must pass an OTP challenge.
    pub requires_otp: bool,
    /// Whether first-time visitors must supply a city.
    pub requires_city: bool,
    /// Phone validation pattern.
    pub phone_format: PhoneFormat,
    /// One-time access fee in minor units.
    pub price: u64,
    /// ISO currency code for the fee.
    pub currency: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Simulation,
            requires_otp: false,
            requires_city: false,
            phone_format: PhoneFormat::Bj,
            price: DEFAULT_ACCESS_PRICE,
            currency: DEFAULT_ACCESS_CURRENCY.to_string(),
        }
    }
}

impl FlowConfig {
    /// Load the flow configuration from the environment.
    ///
    /// Unknown values fall back to the defaults with a warning rather than
    /// aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = env_parsed(PAYMENT_PROVIDER_ENV, defaults.provider);
        let phone_format = env_parsed(PHONE_FORMAT_ENV, defaults.phone_format);
        let requires_otp = env_flag(REQUIRES_OTP_ENV, defaults.requires_otp);
        let requires_city = env_flag(REQUIRES_CITY_ENV, defaults.requires_city);

        let price = match std::env::var(ACCESS_PRICE_ENV) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid {ACCESS_PRICE_ENV}, using default");
                defaults.price
            }),
            Err(_) => defaults.price,
        };

        let currency = env_or_default(ACCESS_CURRENCY_ENV, &defaults.currency).to_ascii_uppercase();

        Self {
            provider,
            requires_otp,
            requires_city,
            phone_format,
            price,
            currency,
        }
    }
}

fn env_parsed<T: FromStr + Copy>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%name, error = %e, "invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read a boolean flag from the environment (`true`/`1`/`yes` are truthy).
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        Err(_) => default,
    }
}

/// Read an environment variable, treating empty values as unset.
pub fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

/// Read an environment variable with a default for unset/empty values.
pub fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses() {
        assert_eq!(
            "simulation".parse::<ProviderKind>().unwrap(),
            ProviderKind::Simulation
        );
        assert_eq!(
            " FedaPay ".parse::<ProviderKind>().unwrap(),
            ProviderKind::Fedapay
        );
        assert_eq!(
            "maketou".parse::<ProviderKind>().unwrap(),
            ProviderKind::Maketou
        );
        assert!("stripe".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn phone_format_parses() {
        assert_eq!("bj".parse::<PhoneFormat>().unwrap(), PhoneFormat::Bj);
        assert_eq!(
            "LOCAL8".parse::<PhoneFormat>().unwrap(),
            PhoneFormat::Local8
        );
        assert!("mars".parse::<PhoneFormat>().is_err());
    }

    #[test]
    fn default_flow_is_simulation() {
        let flow = FlowConfig::default();
        assert_eq!(flow.provider, ProviderKind::Simulation);
        assert!(!flow.requires_otp);
        assert!(!flow.requires_city);
        assert_eq!(flow.price, DEFAULT_ACCESS_PRICE);
        assert_eq!(flow.currency, "XOF");
    }

    #[test]
    fn provider_as_str_round_trips() {
        for kind in [
            ProviderKind::Simulation,
            ProviderKind::Fedapay,
            ProviderKind::Maketou,
        ] {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }
}
