// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{access::ClientSession, state::AppState, storage};

pub mod access;
pub mod admin;
pub mod catalog;
pub mod health;
pub mod payments;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        // Access gate
        .route("/access/check", post(access::check))
        .route("/access/otp/verify", post(access::verify_otp))
        .route("/access/otp/resend", post(access::resend_otp))
        .route("/access/session", get(access::session))
        // Payments
        .route("/payments/checkout", post(payments::checkout))
        .route("/payments/{payment_id}/confirm", post(payments::confirm))
        // Catalog (library browser)
        .route("/catalog/categories", get(catalog::list_categories))
        .route("/catalog/books", get(catalog::list_books))
        .route("/catalog/books/{book_id}", get(catalog::get_book))
        .route(
            "/catalog/books/{book_id}/download",
            post(catalog::download_book),
        )
        // Admin console
        .route("/admin/login", post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/password", post(admin::change_password))
        .route("/admin/admins", post(admin::create_admin))
        .route(
            "/admin/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route(
            "/admin/categories/{category_id}",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route(
            "/admin/books",
            get(admin::list_books).post(admin::create_book),
        )
        .route(
            "/admin/books/{book_id}",
            put(admin::update_book).delete(admin::delete_book),
        )
        .route("/admin/payments", get(admin::list_payments))
        .route(
            "/admin/payments/{payment_id}/status",
            put(admin::review_payment),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/audit", get(admin::audit))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        access::check,
        access::verify_otp,
        access::resend_otp,
        access::session,
        payments::checkout,
        payments::confirm,
        catalog::list_categories,
        catalog::list_books,
        catalog::get_book,
        catalog::download_book,
        admin::login,
        admin::logout,
        admin::change_password,
        admin::create_admin,
        admin::list_categories,
        admin::create_category,
        admin::update_category,
        admin::delete_category,
        admin::list_books,
        admin::create_book,
        admin::update_book,
        admin::delete_book,
        admin::list_payments,
        admin::review_payment,
        admin::list_users,
        admin::stats,
        admin::audit
    ),
    components(
        schemas(
            ClientSession,
            health::ReadyResponse,
            health::HealthChecks,
            access::AccessCheckRequest,
            access::AccessCheckResponse,
            access::AccessDecision,
            access::VerifyOtpRequest,
            access::ResendOtpRequest,
            access::ChallengeResponse,
            payments::CheckoutRequest,
            payments::PaymentFlowResponse,
            catalog::BookResponse,
            catalog::BookListResponse,
            catalog::CategoryListResponse,
            catalog::DownloadResponse,
            admin::AdminLoginRequest,
            admin::AdminLoginResponse,
            admin::ChangePasswordRequest,
            admin::CreateAdminRequest,
            admin::CategoryPayload,
            admin::BookPayload,
            admin::ReviewPaymentRequest,
            admin::AdminPaymentListResponse,
            admin::AdminUserListResponse,
            admin::SystemStatsResponse,
            admin::AuditLogResponse,
            storage::PaymentStatus,
            storage::StoredPayment,
            storage::StoredUser,
            storage::StoredBook,
            storage::StoredCategory,
            storage::AuditEvent,
            storage::AuditEventType
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and storage probes"),
        (name = "Access", description = "Paywall gate: identity check, OTP, entry gate"),
        (name = "Payments", description = "Checkout and confirmation"),
        (name = "Catalog", description = "Gated library browsing"),
        (name = "Admin", description = "Admin console")
    )
)]
struct ApiDoc;
