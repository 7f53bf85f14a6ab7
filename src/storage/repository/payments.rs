// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Payment repository.
//!
//! A payment record is created `pending` when a checkout starts and moves to
//! `completed` or `failed` exactly once. Completed and failed payments are
//! terminal; there is no way back to pending or across.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout started, outcome unknown.
    Pending,
    /// Aggregator (or simulation) confirmed the transaction.
    Completed,
    /// Aggregator reported failure or the review rejected it.
    Failed,
}

/// Persisted payment record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredPayment {
    /// Unique payment identifier (UUID).
    pub id: String,
    /// User record tied to this payment, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Normalized payer email.
    pub email: String,
    /// Payer phone number.
    pub phone: String,
    /// Amount in minor units.
    pub amount: u64,
    /// ISO currency code.
    pub currency: String,
    /// Provider identifier (`simulation`, `fedapay`, `maketou`).
    pub provider: String,
    /// External transaction reference, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Hosted checkout URL, for redirect providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    /// Current status.
    pub status: PaymentStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StoredPayment {
    /// Construct a new pending payment.
    pub fn new_pending(
        user_id: Option<String>,
        email: String,
        phone: String,
        amount: u64,
        currency: String,
        provider: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            email,
            phone,
            amount,
            currency,
            provider,
            reference: None,
            checkout_url: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for payment records.
pub struct PaymentRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new PaymentRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a payment exists.
    pub fn exists(&self, payment_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().payment(payment_id))
    }

    /// Get a payment by ID.
    pub fn get(&self, payment_id: &str) -> StorageResult<StoredPayment> {
        let path = self.storage.paths().payment(payment_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Payment {payment_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new payment.
    pub fn create(&self, payment: &StoredPayment) -> StorageResult<()> {
        if self.exists(&payment.id) {
            return Err(StorageError::AlreadyExists(format!(
                "Payment {}",
                payment.id
            )));
        }
        self.storage
            .write_json(self.storage.paths().payment(&payment.id), payment)
    }

    /// Update an existing payment.
    pub fn update(&self, payment: &StoredPayment) -> StorageResult<()> {
        if !self.exists(&payment.id) {
            return Err(StorageError::NotFound(format!("Payment {}", payment.id)));
        }
        self.storage
            .write_json(self.storage.paths().payment(&payment.id), payment)
    }

    /// Transition a payment `pending -> completed`.
    ///
    /// Any other starting state is a conflict. The external reference is
    /// recorded when the aggregator supplied one.
    pub fn complete(
        &self,
        payment_id: &str,
        reference: Option<&str>,
    ) -> StorageResult<StoredPayment> {
        let mut payment = self.get(payment_id)?;
        if payment.status != PaymentStatus::Pending {
            return Err(StorageError::Conflict(format!(
                "Payment {payment_id} is already terminal"
            )));
        }
        payment.status = PaymentStatus::Completed;
        if let Some(reference) = reference {
            payment.reference = Some(reference.to_string());
        }
        payment.updated_at = Utc::now();
        self.update(&payment)?;
        Ok(payment)
    }

    /// Transition a payment `pending -> failed`.
    pub fn fail(&self, payment_id: &str) -> StorageResult<StoredPayment> {
        let mut payment = self.get(payment_id)?;
        if payment.status != PaymentStatus::Pending {
            return Err(StorageError::Conflict(format!(
                "Payment {payment_id} is already terminal"
            )));
        }
        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        self.update(&payment)?;
        Ok(payment)
    }

    /// Find a completed payment for the (email, phone) pair.
    ///
    /// Email comparison is case-insensitive; phone must match exactly after
    /// normalization.
    pub fn find_completed(&self, email: &str, phone: &str) -> StorageResult<Option<StoredPayment>> {
        let needle = email.trim().to_lowercase();
        let ids = self
            .storage
            .list_files(self.storage.paths().payments_dir(), "json")?;

        for id in ids {
            if let Ok(payment) = self.get(&id) {
                if payment.status == PaymentStatus::Completed
                    && payment.email == needle
                    && payment.phone == phone
                {
                    return Ok(Some(payment));
                }
            }
        }
        Ok(None)
    }

    /// List all payments, newest first, optionally filtered by status.
    pub fn list_all(&self, status: Option<PaymentStatus>) -> StorageResult<Vec<StoredPayment>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().payments_dir(), "json")?;

        let mut payments = Vec::new();
        for id in ids {
            if let Ok(payment) = self.get(&id) {
                if status.is_none_or(|s| payment.status == s) {
                    payments.push(payment);
                }
            }
        }

        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}
