// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

use crate::config::FlowConfig;
use crate::email::OtpDelivery;
use crate::storage::FileStorage;

/// Shared application state.
///
/// Cheap to clone: the storage handle is a path bundle, and the flow
/// configuration is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Initialized JSON store.
    pub storage: FileStorage,
    /// Declarative access flow configuration.
    pub flow: FlowConfig,
    /// OTP delivery mode.
    pub otp_delivery: OtpDelivery,
}

impl AppState {
    /// Assemble state from its parts. Storage must already be initialized.
    pub fn new(storage: FileStorage, flow: FlowConfig, otp_delivery: OtpDelivery) -> Self {
        Self {
            storage,
            flow,
            otp_delivery,
        }
    }

    /// Test state rooted at a caller-owned directory, with the default
    /// simulation flow and on-screen OTP delivery.
    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        let paths = crate::storage::StoragePaths::new(root);
        let mut storage = FileStorage::new(paths);
        storage.initialize().expect("initialize test storage");
        Self::new(storage, FlowConfig::default(), OtpDelivery::OnScreen)
    }

    /// Test state with a custom flow configuration.
    #[cfg(test)]
    pub fn for_tests_with_flow(root: &std::path::Path, flow: FlowConfig) -> Self {
        let mut state = Self::for_tests(root);
        state.flow = flow;
        state
    }
}
