// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

use std::{env, net::SocketAddr};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use digilib_server::api::admin::seed_admin_account;
use digilib_server::api::router;
use digilib_server::config::{self, FlowConfig};
use digilib_server::email::OtpDelivery;
use digilib_server::state::AppState;
use digilib_server::storage::{FileStorage, StoragePaths};

#[tokio::main]
async fn main() {
    init_tracing();

    // Initialize the JSON store (panics on failure - storage is mandatory)
    let data_dir = config::env_or_default(config::DATA_DIR_ENV, storage_default());
    let mut storage = FileStorage::new(StoragePaths::new(&data_dir));
    storage
        .initialize()
        .expect("Failed to initialize storage directories");
    info!(%data_dir, "storage initialized");

    // Bootstrap the primary admin account from the environment
    match (
        config::env_optional("SEED_ADMIN_USERNAME"),
        config::env_optional("SEED_ADMIN_PASSWORD"),
    ) {
        (Some(username), Some(password)) => {
            match seed_admin_account(&storage, &username, &password) {
                Ok(true) => info!(%username, "seeded primary admin account"),
                Ok(false) => info!("admin account already present, seed skipped"),
                Err(e) => warn!(error = %e.message, "failed to seed admin account"),
            }
        }
        _ => info!("no admin seed configured"),
    }

    let flow = FlowConfig::from_env();
    info!(
        provider = flow.provider.as_str(),
        requires_otp = flow.requires_otp,
        requires_city = flow.requires_city,
        price = flow.price,
        currency = %flow.currency,
        "access flow configured"
    );

    let state = AppState::new(storage, flow, OtpDelivery::from_env());
    let app = router(state);

    // Parse bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    info!("DigiLib server listening on http://{addr} (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

fn storage_default() -> &'static str {
    digilib_server::storage::paths::DATA_ROOT
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let format = config::env_or_default("LOG_FORMAT", "pretty");
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received, draining connections");
}
