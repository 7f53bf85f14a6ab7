// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Identity normalization and validation.
//!
//! Emails are trimmed and lowercased; phones are trimmed with spaces
//! stripped and checked against the configured national pattern. All
//! lookups downstream (payments, OTP codes, grants) key on the normalized
//! values produced here.

use crate::config::PhoneFormat;

/// Validation failure for a submitted identity field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("A valid email address is required")]
    InvalidEmail,

    #[error("Phone number must be 8 digits (e.g. 90123456)")]
    InvalidLocalPhone,

    #[error("Phone number must be 8 digits or 229-prefixed (e.g. 22990123456)")]
    InvalidBjPhone,

    #[error("Phone number must be 10 to 15 digits")]
    InvalidInternationalPhone,

    #[error("Name is required for first-time visitors")]
    MissingName,

    #[error("City is required for first-time visitors")]
    MissingCity,
}

/// Normalize an email: trim, lowercase, require an `@` with text around it.
pub fn normalize_email(raw: &str) -> Result<String, IdentityError> {
    let email = raw.trim().to_lowercase();
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() {
        return Err(IdentityError::InvalidEmail);
    }
    Ok(email)
}

/// Normalize a phone number: trim, strip spaces, validate per format.
pub fn normalize_phone(raw: &str, format: PhoneFormat) -> Result<String, IdentityError> {
    let phone: String = raw.trim().chars().filter(|c| !c.is_whitespace()).collect();

    match format {
        PhoneFormat::Local8 => {
            if phone.len() == 8 && phone.chars().all(|c| c.is_ascii_digit()) {
                Ok(phone)
            } else {
                Err(IdentityError::InvalidLocalPhone)
            }
        }
        PhoneFormat::Bj => {
            let valid = match phone.len() {
                8 => phone.chars().all(|c| c.is_ascii_digit()),
                11 => phone.starts_with("229") && phone.chars().all(|c| c.is_ascii_digit()),
                _ => false,
            };
            if valid {
                Ok(phone)
            } else {
                Err(IdentityError::InvalidBjPhone)
            }
        }
        PhoneFormat::International => {
            let digits = phone.strip_prefix('+').unwrap_or(&phone);
            if (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
                Ok(phone)
            } else {
                Err(IdentityError::InvalidInternationalPhone)
            }
        }
    }
}

/// Prefix a normalized Benin number with the country code for aggregators.
pub fn checkout_phone(phone: &str) -> String {
    let bare = phone.strip_prefix('+').unwrap_or(phone);
    if bare.len() == 8 {
        format!("229{bare}")
    } else {
        bare.to_string()
    }
}

/// Normalized identity fields from a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    pub name: Option<String>,
    pub email: String,
    pub phone: String,
    pub city: Option<String>,
}

/// Normalize and validate a full identity submission.
///
/// `is_new_visitor` decides whether name (and city, when the flow collects
/// it) are mandatory; returning visitors only re-enter email and phone.
pub fn normalize_identity(
    name: Option<&str>,
    email: &str,
    phone: &str,
    city: Option<&str>,
    format: PhoneFormat,
    requires_city: bool,
    is_new_visitor: bool,
) -> Result<NormalizedIdentity, IdentityError> {
    let email = normalize_email(email)?;
    let phone = normalize_phone(phone, format)?;

    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let city = city.map(str::trim).filter(|c| !c.is_empty());

    if is_new_visitor {
        if name.is_none() {
            return Err(IdentityError::MissingName);
        }
        if requires_city && city.is_none() {
            return Err(IdentityError::MissingCity);
        }
    }

    Ok(NormalizedIdentity {
        name: name.map(str::to_string),
        email,
        phone,
        city: city.map(str::to_string),
    })
}
