// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Payment aggregator clients.
//!
//! Two external checkout integrations are supported, selected by
//! `PAYMENT_PROVIDER`:
//!
//! - [`fedapay`] — tokenized redirect flow: create a transaction, receive a
//!   token, send the visitor to the hosted checkout page.
//! - [`maketou`] — cart flow: create a cart, redirect to the returned
//!   checkout URL, poll the cart status afterwards.
//!
//! The `simulation` provider needs no client; the checkout handler
//! synthesizes a completed transaction after a fixed delay.

pub mod fedapay;
pub mod maketou;

/// Aggregator-side execution status, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Pending,
    Completed,
    Failed,
}

/// Result of starting a hosted checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Provider-side transaction/cart reference.
    pub reference: String,
    /// Hosted checkout URL the visitor is redirected to.
    pub checkout_url: Option<String>,
    /// Status as of creation (normally pending).
    pub status: ProviderStatus,
}
