// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Token and OTP code generation.
//!
//! Tokens are 24 random bytes, URL-safe base64 without padding, so they are
//! safe both as bearer credentials and as store file names. OTP codes are
//! uniform 6-digit integers drawn by rejection sampling.

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};

/// Bytes of entropy behind each opaque token.
const TOKEN_BYTES: usize = 24;

/// Lowest 6-digit code.
const OTP_MIN: u32 = 100_000;

/// Number of possible codes.
const OTP_RANGE: u32 = 900_000;

/// Failure to draw randomness from the system.
#[derive(Debug, thiserror::Error)]
#[error("system randomness unavailable")]
pub struct TokenError;

/// Generate an opaque access/session token.
pub fn generate_token() -> Result<String, TokenError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes).map_err(|_| TokenError)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Generate a uniform 6-digit OTP code in `[100000, 999999]`.
pub fn generate_otp_code() -> Result<String, TokenError> {
    let rng = SystemRandom::new();

    // Rejection sampling keeps the distribution uniform over the range.
    let limit = u32::MAX - (u32::MAX % OTP_RANGE);
    loop {
        let mut bytes = [0u8; 4];
        rng.fill(&mut bytes).map_err(|_| TokenError)?;
        let draw = u32::from_be_bytes(bytes);
        if draw < limit {
            return Ok((OTP_MIN + draw % OTP_RANGE).to_string());
        }
    }
}
