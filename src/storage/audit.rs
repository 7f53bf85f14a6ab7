// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Audit logging for access, payment and admin operations.
//!
//! Grants, OTP challenges, checkout attempts and every admin action are
//! appended to daily JSONL files under the audit directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Access events
    AccessGranted,
    OtpIssued,
    OtpVerified,
    OtpRejected,

    // Payment events
    CheckoutStarted,
    PaymentCompleted,
    PaymentFailed,
    PaymentReviewed,

    // Admin auth events
    AdminLogin,
    AdminLoginFailed,
    AdminLockout,
    AdminLogout,
    AdminPasswordChanged,
    AdminCreated,

    // Catalog events
    CategoryCreated,
    CategoryUpdated,
    CategoryDeleted,
    BookCreated,
    BookUpdated,
    BookDeleted,
    BookDownloaded,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Actor that triggered the event (visitor email or admin username).
    pub actor: Option<String>,
    /// Resource affected (payment_id, book_id, etc.).
    pub resource_id: Option<String>,
    /// Resource type (payment, book, etc.).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Log an audit event.
    ///
    /// Events are appended to a daily log file in JSONL format.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let mut content = self.storage.read_raw(&path).unwrap_or_default();

        let event_json = serde_json::to_string(event).map_err(StorageError::Json)?;

        if !content.is_empty() && !content.ends_with(b"\n") {
            content.push(b'\n');
        }
        content.extend_from_slice(event_json.as_bytes());
        content.push(b'\n');

        self.storage.write_raw(&path, &content)
    }

    /// Read audit events for a specific date (YYYY-MM-DD).
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = match self.storage.read_raw(&path) {
            Ok(content) => content,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let content_str = String::from_utf8(content)
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;

        let mut events = Vec::new();
        for line in content_str.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(line)?;
            events.push(event);
        }
        Ok(events)
    }
}

/// Helper macro for logging audit events.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $actor:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type).with_actor($actor);
        let _ = repo.log(&event);
    }};
    ($storage:expr, $event_type:expr, $actor:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_actor($actor)
            .with_resource($resource_type, $resource_id);
        let _ = repo.log(&event);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStorage) {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let mut storage = FileStorage::new(paths);
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::AccessGranted)
            .with_actor("a@b.com")
            .with_resource("grant", "tok_abc");

        assert_eq!(event.event_type, AuditEventType::AccessGranted);
        assert_eq!(event.actor, Some("a@b.com".to_string()));
        assert_eq!(event.resource_type, Some("grant".to_string()));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::AdminLoginFailed)
            .with_actor("admin")
            .failed("bad password");

        assert!(!event.success);
        assert_eq!(event.error, Some("bad password".to_string()));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(
            &AuditEvent::new(AuditEventType::OtpIssued)
                .with_actor("a@b.com")
                .with_resource("otp", "otp-1"),
        )
        .unwrap();

        repo.log(
            &AuditEvent::new(AuditEventType::OtpVerified)
                .with_actor("a@b.com")
                .with_resource("otp", "otp-1"),
        )
        .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = repo.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::OtpIssued);
        assert_eq!(events[1].event_type, AuditEventType::OtpVerified);
    }

    #[test]
    fn read_events_for_empty_date_is_empty() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        let events = repo.read_events("1999-01-01").unwrap();
        assert!(events.is_empty());
    }
}
