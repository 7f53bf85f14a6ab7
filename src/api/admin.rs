// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Admin console API.
//!
//! Per-admin credentials with argon2id hashes and failure lockout, catalog
//! CRUD, payment review, and audit queries. Login failures answer with one
//! generic message whether the username or the password was wrong; locked
//! accounts answer 423 without revealing whether the password matched.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::{
    access::generate_token,
    audit_log,
    auth::{hash_password, verify_password, AdminAuth},
    error::ApiError,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, AdminRepository, AdminSessionRepository,
        BookRepository, CategoryRepository, GrantRepository, PaymentRepository, PaymentStatus,
        StorageError, StoredAdminAccount, StoredAdminSession, StoredBook, StoredCategory,
        StoredPayment, StoredUser, UserRepository,
    },
};

const GENERIC_LOGIN_ERROR: &str = "Invalid username or password";

const DEFAULT_CATEGORY_COLOR: &str = "#667eea";
const DEFAULT_CATEGORY_ICON: &str = "Book";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Admin login request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Admin login response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminLoginResponse {
    /// Session bearer token.
    pub token: String,
    /// Session expiry (RFC 3339).
    pub expires_at: String,
}

/// Password change request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// Current password, re-verified before the change.
    pub current_password: String,
    /// Replacement password.
    pub new_password: String,
}

/// Request to create another admin account (primary admin only).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAdminRequest {
    /// Login name for the new account.
    pub username: String,
    /// Initial password.
    pub password: String,
}

/// Category create/update payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryPayload {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Accent color (hex); defaulted when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Icon name; defaulted when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Book create/update payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookPayload {
    /// Title.
    pub title: String,
    /// Author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Cover image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Drive share link to the book file. Required.
    pub drive_link: String,
    /// Bare drive file id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_file_id: Option<String>,
}

/// Payment review payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewPaymentRequest {
    /// Target status: `completed` or `failed`.
    pub status: PaymentStatus,
}

/// Query params for the admin payment list.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AdminPaymentListQuery {
    /// Optional status filter.
    pub status: Option<PaymentStatus>,
}

/// Admin payment list response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminPaymentListResponse {
    /// Payments, newest first.
    pub payments: Vec<StoredPayment>,
    /// Total count.
    pub total: usize,
}

/// Admin user list response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminUserListResponse {
    /// Users, newest first.
    pub users: Vec<StoredUser>,
    /// Total count.
    pub total: usize,
}

/// System statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatsResponse {
    /// Total users on record.
    pub total_users: usize,
    /// Users with a completed payment.
    pub paid_users: usize,
    /// Total books in the catalog.
    pub total_books: usize,
    /// Total categories.
    pub total_categories: usize,
    /// Total payment records.
    pub total_payments: usize,
    /// Completed payment records.
    pub completed_payments: usize,
    /// Minted access grants.
    pub total_grants: usize,
    /// Current timestamp.
    pub timestamp: String,
}

/// Query params for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Date to read (YYYY-MM-DD). Defaults to today.
    pub date: Option<String>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events for the requested date.
    pub events: Vec<AuditEvent>,
    /// Total count.
    pub total: usize,
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Create the primary admin account when none exists yet.
///
/// Returns true when an account was created. Called from startup with the
/// `SEED_ADMIN_USERNAME`/`SEED_ADMIN_PASSWORD` pair.
pub fn seed_admin_account(
    storage: &crate::storage::FileStorage,
    username: &str,
    password: &str,
) -> Result<bool, ApiError> {
    let repo = AdminRepository::new(storage);
    if repo
        .any_exists()
        .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?
    {
        return Ok(false);
    }

    let hash = hash_password(password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;
    let account = StoredAdminAccount::new(username.to_string(), hash, true);
    repo.create(&account)
        .map_err(|e| ApiError::internal(format!("Failed to create admin: {e}")))?;
    Ok(true)
}

// ============================================================================
// Auth Handlers
// ============================================================================

/// Admin login.
#[utoipa::path(
    post,
    path = "/v1/admin/login",
    tag = "Admin",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Session issued", body = AdminLoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 423, description = "Account locked")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, ApiError> {
    let now = Utc::now();
    let admins = AdminRepository::new(&state.storage);

    let account = match admins.get_by_username(request.username.trim()) {
        Ok(account) => account,
        Err(StorageError::NotFound(_)) => {
            audit_log!(
                &state.storage,
                AuditEventType::AdminLoginFailed,
                request.username.trim()
            );
            return Err(ApiError::unauthorized(GENERIC_LOGIN_ERROR));
        }
        Err(e) => return Err(ApiError::internal(format!("Storage error: {e}"))),
    };

    if account.is_locked(now) {
        return Err(ApiError::locked(
            "Account temporarily locked after repeated failures; try again later",
        ));
    }

    let valid = verify_password(&request.password, &account.password_hash)
        .map_err(|e| ApiError::internal(format!("Password verification failed: {e}")))?;

    if !valid {
        let updated = admins
            .record_failure(&account.id, now)
            .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;
        if updated.is_locked(now) {
            audit_log!(
                &state.storage,
                AuditEventType::AdminLockout,
                &account.username
            );
        } else {
            audit_log!(
                &state.storage,
                AuditEventType::AdminLoginFailed,
                &account.username
            );
        }
        return Err(ApiError::unauthorized(GENERIC_LOGIN_ERROR));
    }

    admins
        .record_success(&account.id, now)
        .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;

    let token =
        generate_token().map_err(|e| ApiError::internal(format!("Token generation failed: {e}")))?;
    let session = StoredAdminSession::new(token, account.id.clone(), account.username.clone());
    AdminSessionRepository::new(&state.storage)
        .create(&session)
        .map_err(|e| ApiError::internal(format!("Failed to store session: {e}")))?;

    audit_log!(&state.storage, AuditEventType::AdminLogin, &account.username);

    Ok(Json(AdminLoginResponse {
        token: session.token,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

/// Admin logout: delete the session record.
#[utoipa::path(
    post,
    path = "/v1/admin/logout",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Session deleted"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
) -> Result<(), ApiError> {
    AdminSessionRepository::new(&state.storage)
        .delete(&session.token)
        .map_err(|e| ApiError::internal(format!("Failed to delete session: {e}")))?;
    audit_log!(&state.storage, AuditEventType::AdminLogout, &session.username);
    Ok(())
}

/// Change the authenticated admin's password.
#[utoipa::path(
    post,
    path = "/v1/admin/password",
    tag = "Admin",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<(), ApiError> {
    let admins = AdminRepository::new(&state.storage);
    let mut account = admins
        .get(&session.admin_id)
        .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;

    let valid = verify_password(&request.current_password, &account.password_hash)
        .map_err(|e| ApiError::internal(format!("Password verification failed: {e}")))?;
    if !valid {
        return Err(ApiError::unauthorized("Current password is wrong"));
    }

    if request.new_password.trim().len() < 8 {
        return Err(ApiError::bad_request(
            "New password must be at least 8 characters",
        ));
    }

    account.password_hash = hash_password(&request.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;
    account.updated_at = Utc::now();
    admins
        .update(&account)
        .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;

    audit_log!(
        &state.storage,
        AuditEventType::AdminPasswordChanged,
        &session.username
    );
    Ok(())
}

/// Create another admin account. Primary admin only.
#[utoipa::path(
    post,
    path = "/v1/admin/admins",
    tag = "Admin",
    request_body = CreateAdminRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Account created"),
        (status = 403, description = "Not the primary admin"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_admin(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<CreateAdminRequest>,
) -> Result<StatusCode, ApiError> {
    let admins = AdminRepository::new(&state.storage);
    let caller = admins
        .get(&session.admin_id)
        .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;
    if !caller.is_primary {
        return Err(ApiError::forbidden(
            "Only the primary admin can create accounts",
        ));
    }

    let username = request.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }
    if request.password.trim().len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;
    let account = StoredAdminAccount::new(username.to_string(), hash, false);
    admins.create(&account).map_err(|e| match e {
        StorageError::AlreadyExists(_) => ApiError::conflict("Username is already taken"),
        other => ApiError::internal(format!("Failed to create admin: {other}")),
    })?;

    audit_log!(
        &state.storage,
        AuditEventType::AdminCreated,
        &session.username,
        "admin",
        &account.id
    );
    Ok(StatusCode::CREATED)
}

// ============================================================================
// Catalog CRUD
// ============================================================================

/// Create a category.
#[utoipa::path(
    post,
    path = "/v1/admin/categories",
    tag = "Admin",
    request_body = CategoryPayload,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Category created", body = StoredCategory),
        (status = 409, description = "Name taken")
    )
)]
pub async fn create_category(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Json(payload): Json<CategoryPayload>,
) -> Result<(StatusCode, Json<StoredCategory>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Category name is required"));
    }

    let category = StoredCategory {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: payload.description,
        color: payload
            .color
            .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
        icon: payload
            .icon
            .unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
        created_at: Utc::now(),
    };

    CategoryRepository::new(&state.storage)
        .create(&category)
        .map_err(|e| match e {
            StorageError::AlreadyExists(_) => {
                ApiError::conflict("A category with this name already exists")
            }
            other => ApiError::internal(format!("Failed to create category: {other}")),
        })?;

    audit_log!(
        &state.storage,
        AuditEventType::CategoryCreated,
        &session.username,
        "category",
        &category.id
    );
    Ok((StatusCode::CREATED, Json(category)))
}

/// Update a category.
#[utoipa::path(
    put,
    path = "/v1/admin/categories/{category_id}",
    tag = "Admin",
    params(("category_id" = String, Path, description = "Category id")),
    request_body = CategoryPayload,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category updated", body = StoredCategory),
        (status = 404, description = "Category not found")
    )
)]
pub async fn update_category(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Json(payload): Json<CategoryPayload>,
) -> Result<Json<StoredCategory>, ApiError> {
    let repo = CategoryRepository::new(&state.storage);
    let mut category = repo
        .get(&category_id)
        .map_err(|_| ApiError::not_found("Category not found"))?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Category name is required"));
    }

    category.name = name.to_string();
    category.description = payload.description;
    if let Some(color) = payload.color {
        category.color = color;
    }
    if let Some(icon) = payload.icon {
        category.icon = icon;
    }

    repo.update(&category)
        .map_err(|e| ApiError::internal(format!("Failed to update category: {e}")))?;

    audit_log!(
        &state.storage,
        AuditEventType::CategoryUpdated,
        &session.username,
        "category",
        &category.id
    );
    Ok(Json(category))
}

/// Delete a category. Books keep their (now dangling) assignment cleared.
#[utoipa::path(
    delete,
    path = "/v1/admin/categories/{category_id}",
    tag = "Admin",
    params(("category_id" = String, Path, description = "Category id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete_category(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<(), ApiError> {
    CategoryRepository::new(&state.storage)
        .delete(&category_id)
        .map_err(|_| ApiError::not_found("Category not found"))?;

    // Clear the assignment on books that pointed at it
    let books = BookRepository::new(&state.storage);
    if let Ok(assigned) = books.list_all(Some(&category_id)) {
        for mut book in assigned {
            book.category_id = None;
            book.updated_at = Utc::now();
            if let Err(e) = books.update(&book) {
                warn!(book_id = %book.id, error = %e, "failed to clear category assignment");
            }
        }
    }

    audit_log!(
        &state.storage,
        AuditEventType::CategoryDeleted,
        &session.username,
        "category",
        &category_id
    );
    Ok(())
}

/// Create a book.
#[utoipa::path(
    post,
    path = "/v1/admin/books",
    tag = "Admin",
    request_body = BookPayload,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Book created", body = StoredBook),
        (status = 400, description = "Missing title or drive link")
    )
)]
pub async fn create_book(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Json(payload): Json<BookPayload>,
) -> Result<(StatusCode, Json<StoredBook>), ApiError> {
    let title = payload.title.trim();
    let drive_link = payload.drive_link.trim();
    if title.is_empty() || drive_link.is_empty() {
        return Err(ApiError::bad_request("Title and drive link are required"));
    }

    let now = Utc::now();
    let book = StoredBook {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        author: payload.author,
        description: payload.description.unwrap_or_default(),
        category_id: payload.category_id,
        cover_url: payload.cover_url.unwrap_or_default(),
        drive_link: drive_link.to_string(),
        drive_file_id: payload.drive_file_id,
        downloads: 0,
        created_at: now,
        updated_at: now,
    };

    BookRepository::new(&state.storage)
        .create(&book)
        .map_err(|e| ApiError::internal(format!("Failed to create book: {e}")))?;

    audit_log!(
        &state.storage,
        AuditEventType::BookCreated,
        &session.username,
        "book",
        &book.id
    );
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book.
#[utoipa::path(
    put,
    path = "/v1/admin/books/{book_id}",
    tag = "Admin",
    params(("book_id" = String, Path, description = "Book id")),
    request_body = BookPayload,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Book updated", body = StoredBook),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Json(payload): Json<BookPayload>,
) -> Result<Json<StoredBook>, ApiError> {
    let repo = BookRepository::new(&state.storage);
    let mut book = repo
        .get(&book_id)
        .map_err(|_| ApiError::not_found("Book not found"))?;

    let title = payload.title.trim();
    let drive_link = payload.drive_link.trim();
    if title.is_empty() || drive_link.is_empty() {
        return Err(ApiError::bad_request("Title and drive link are required"));
    }

    book.title = title.to_string();
    book.author = payload.author;
    if let Some(description) = payload.description {
        book.description = description;
    }
    book.category_id = payload.category_id;
    if let Some(cover_url) = payload.cover_url {
        book.cover_url = cover_url;
    }
    book.drive_link = drive_link.to_string();
    book.drive_file_id = payload.drive_file_id;
    book.updated_at = Utc::now();

    repo.update(&book)
        .map_err(|e| ApiError::internal(format!("Failed to update book: {e}")))?;

    audit_log!(
        &state.storage,
        AuditEventType::BookUpdated,
        &session.username,
        "book",
        &book.id
    );
    Ok(Json(book))
}

/// Delete a book.
#[utoipa::path(
    delete,
    path = "/v1/admin/books/{book_id}",
    tag = "Admin",
    params(("book_id" = String, Path, description = "Book id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<(), ApiError> {
    BookRepository::new(&state.storage)
        .delete(&book_id)
        .map_err(|_| ApiError::not_found("Book not found"))?;

    audit_log!(
        &state.storage,
        AuditEventType::BookDeleted,
        &session.username,
        "book",
        &book_id
    );
    Ok(())
}

/// List categories (admin view).
#[utoipa::path(
    get,
    path = "/v1/admin/categories",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories", body = [StoredCategory]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_categories(
    AdminAuth(_session): AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredCategory>>, ApiError> {
    let categories = CategoryRepository::new(&state.storage)
        .list_all()
        .map_err(|e| ApiError::internal(format!("Failed to list categories: {e}")))?;
    Ok(Json(categories))
}

/// List books (admin view), newest first.
#[utoipa::path(
    get,
    path = "/v1/admin/books",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Books", body = [StoredBook]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_books(
    AdminAuth(_session): AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredBook>>, ApiError> {
    let books = BookRepository::new(&state.storage)
        .list_all(None)
        .map_err(|e| ApiError::internal(format!("Failed to list books: {e}")))?;
    Ok(Json(books))
}

// ============================================================================
// Review & Reporting
// ============================================================================

/// List payments for review.
#[utoipa::path(
    get,
    path = "/v1/admin/payments",
    tag = "Admin",
    params(AdminPaymentListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments", body = AdminPaymentListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_payments(
    AdminAuth(_session): AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<AdminPaymentListQuery>,
) -> Result<Json<AdminPaymentListResponse>, ApiError> {
    let payments = PaymentRepository::new(&state.storage)
        .list_all(query.status)
        .map_err(|e| ApiError::internal(format!("Failed to list payments: {e}")))?;
    let total = payments.len();
    Ok(Json(AdminPaymentListResponse { payments, total }))
}

/// Review a pending payment: mark it completed or failed.
///
/// Completing also flips the payer's `has_paid`. The visitor picks the
/// entitlement up on their next identity check; no token is minted here.
#[utoipa::path(
    put,
    path = "/v1/admin/payments/{payment_id}/status",
    tag = "Admin",
    params(("payment_id" = String, Path, description = "Payment id")),
    request_body = ReviewPaymentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payment updated", body = StoredPayment),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Payment already terminal")
    )
)]
pub async fn review_payment(
    AdminAuth(session): AdminAuth,
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(request): Json<ReviewPaymentRequest>,
) -> Result<Json<StoredPayment>, ApiError> {
    let payments = PaymentRepository::new(&state.storage);
    if !payments.exists(&payment_id) {
        return Err(ApiError::not_found("Payment not found"));
    }

    let updated = match request.status {
        PaymentStatus::Completed => {
            let completed = payments.complete(&payment_id, None).map_err(|e| match e {
                StorageError::Conflict(msg) => ApiError::conflict(msg),
                other => ApiError::internal(format!("Failed to update payment: {other}")),
            })?;
            UserRepository::new(&state.storage)
                .mark_paid(&completed.email)
                .map_err(|e| ApiError::internal(format!("Failed to update user: {e}")))?;
            completed
        }
        PaymentStatus::Failed => payments.fail(&payment_id).map_err(|e| match e {
            StorageError::Conflict(msg) => ApiError::conflict(msg),
            other => ApiError::internal(format!("Failed to update payment: {other}")),
        })?,
        PaymentStatus::Pending => {
            return Err(ApiError::bad_request(
                "A payment cannot be moved back to pending",
            ));
        }
    };

    audit_log!(
        &state.storage,
        AuditEventType::PaymentReviewed,
        &session.username,
        "payment",
        &updated.id
    );
    Ok(Json(updated))
}

/// List users.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users", body = AdminUserListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_users(
    AdminAuth(_session): AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<AdminUserListResponse>, ApiError> {
    let users = UserRepository::new(&state.storage)
        .list_all()
        .map_err(|e| ApiError::internal(format!("Failed to list users: {e}")))?;
    let total = users.len();
    Ok(Json(AdminUserListResponse { users, total }))
}

/// System statistics.
#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Statistics", body = SystemStatsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn stats(
    AdminAuth(_session): AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<SystemStatsResponse>, ApiError> {
    let map_err = |e: StorageError| ApiError::internal(format!("Storage error: {e}"));

    let users = UserRepository::new(&state.storage).list_all().map_err(map_err)?;
    let payments = PaymentRepository::new(&state.storage)
        .list_all(None)
        .map_err(map_err)?;
    let completed_payments = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .count();

    Ok(Json(SystemStatsResponse {
        total_users: users.len(),
        paid_users: users.iter().filter(|u| u.has_paid).count(),
        total_books: BookRepository::new(&state.storage).count().map_err(map_err)?,
        total_categories: CategoryRepository::new(&state.storage)
            .list_all()
            .map_err(map_err)?
            .len(),
        total_payments: payments.len(),
        completed_payments,
        total_grants: GrantRepository::new(&state.storage).count().map_err(map_err)?,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Read the audit log for a date.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn audit(
    AdminAuth(_session): AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let date = query
        .date
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    let events = AuditRepository::new(&state.storage)
        .read_events(&date)
        .map_err(|e| ApiError::internal(format!("Failed to read audit log: {e}")))?;
    let total = events.len();
    Ok(Json(AuditLogResponse { events, total }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MAX_FAILED_ATTEMPTS;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let temp = TempDir::new().expect("create temp dir");
        let state = AppState::for_tests(temp.path());
        seed_admin_account(&state.storage, "root", "correct-horse").unwrap();
        (state, temp)
    }

    async fn login_session(state: &AppState) -> AdminAuth {
        let Json(response) = login(
            State(state.clone()),
            Json(AdminLoginRequest {
                username: "root".to_string(),
                password: "correct-horse".to_string(),
            }),
        )
        .await
        .expect("login succeeds");

        let session = AdminSessionRepository::new(&state.storage)
            .get_by_token(&response.token)
            .unwrap();
        AdminAuth(session)
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let (state, _temp) = test_state();
        // Second seed does nothing: an account already exists
        let created = seed_admin_account(&state.storage, "other", "whatever-pass").unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn login_issues_a_session() {
        let (state, _temp) = test_state();
        let AdminAuth(session) = login_session(&state).await;
        assert_eq!(session.username, "root");
        assert!(session.expires_at > session.issued_at);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_get_one_message() {
        let (state, _temp) = test_state();

        let wrong_password = login(
            State(state.clone()),
            Json(AdminLoginRequest {
                username: "root".to_string(),
                password: "nope".to_string(),
            }),
        )
        .await;
        let unknown_user = login(
            State(state.clone()),
            Json(AdminLoginRequest {
                username: "ghost".to_string(),
                password: "nope".to_string(),
            }),
        )
        .await;

        match (wrong_password, unknown_user) {
            (Err(a), Err(b)) => {
                assert_eq!(a.status, StatusCode::UNAUTHORIZED);
                assert_eq!(a.message, b.message);
            }
            _ => panic!("expected both to fail"),
        }
    }

    #[tokio::test]
    async fn repeated_failures_lock_the_account() {
        let (state, _temp) = test_state();

        for _ in 0..MAX_FAILED_ATTEMPTS {
            let _ = login(
                State(state.clone()),
                Json(AdminLoginRequest {
                    username: "root".to_string(),
                    password: "nope".to_string(),
                }),
            )
            .await;
        }

        // Even the correct password is refused while locked
        let result = login(
            State(state.clone()),
            Json(AdminLoginRequest {
                username: "root".to_string(),
                password: "correct-horse".to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::LOCKED),
            Ok(_) => panic!("expected lockout"),
        }
    }

    #[tokio::test]
    async fn logout_deletes_the_session() {
        let (state, _temp) = test_state();
        let auth = login_session(&state).await;
        let token = auth.0.token.clone();

        logout(auth, State(state.clone())).await.unwrap();
        assert!(!AdminSessionRepository::new(&state.storage).exists(&token));
    }

    #[tokio::test]
    async fn change_password_requires_current() {
        let (state, _temp) = test_state();
        let auth = login_session(&state).await;

        let result = change_password(
            auth,
            State(state.clone()),
            Json(ChangePasswordRequest {
                current_password: "wrong".to_string(),
                new_password: "new-password-1".to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::UNAUTHORIZED),
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn category_and_book_crud_round_trip() {
        let (state, _temp) = test_state();

        let auth = login_session(&state).await;
        let (status, Json(category)) = create_category(
            auth,
            State(state.clone()),
            Json(CategoryPayload {
                name: "Novels".to_string(),
                description: None,
                color: None,
                icon: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);

        let auth = login_session(&state).await;
        let (_, Json(book)) = create_book(
            auth,
            State(state.clone()),
            Json(BookPayload {
                title: "Book A".to_string(),
                author: None,
                description: Some("desc".to_string()),
                category_id: Some(category.id.clone()),
                cover_url: None,
                drive_link: "https://drive.google.com/file/d/abc/view".to_string(),
                drive_file_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(book.category_id.as_deref(), Some(category.id.as_str()));

        // Deleting the category clears the book's assignment
        let auth = login_session(&state).await;
        delete_category(auth, State(state.clone()), Path(category.id.clone()))
            .await
            .unwrap();
        let reloaded = BookRepository::new(&state.storage).get(&book.id).unwrap();
        assert!(reloaded.category_id.is_none());
    }

    #[tokio::test]
    async fn review_completes_pending_payment_only() {
        let (state, _temp) = test_state();
        let payments = PaymentRepository::new(&state.storage);

        let payment = StoredPayment::new_pending(
            None,
            "a@b.com".to_string(),
            "90123456".to_string(),
            3000,
            "XOF".to_string(),
            "fedapay".to_string(),
        );
        payments.create(&payment).unwrap();

        let auth = login_session(&state).await;
        let Json(reviewed) = review_payment(
            auth,
            State(state.clone()),
            Path(payment.id.clone()),
            Json(ReviewPaymentRequest {
                status: PaymentStatus::Completed,
            }),
        )
        .await
        .unwrap();
        assert_eq!(reviewed.status, PaymentStatus::Completed);

        // Second review conflicts: the payment is terminal
        let auth = login_session(&state).await;
        let result = review_payment(
            auth,
            State(state.clone()),
            Path(payment.id.clone()),
            Json(ReviewPaymentRequest {
                status: PaymentStatus::Failed,
            }),
        )
        .await;
        match result {
            Err(err) => assert_eq!(err.status, StatusCode::CONFLICT),
            Ok(_) => panic!("expected conflict"),
        }
    }

    #[tokio::test]
    async fn stats_count_records() {
        let (state, _temp) = test_state();

        let auth = login_session(&state).await;
        let Json(response) = stats(auth, State(state.clone())).await.unwrap();
        assert_eq!(response.total_users, 0);
        assert_eq!(response.total_books, 0);
        // Login above wrote audit events; the log is readable
        let auth = login_session(&state).await;
        let Json(audit_response) = audit(
            auth,
            State(state.clone()),
            Query(AuditQueryParams { date: None }),
        )
        .await
        .unwrap();
        assert!(audit_response.total > 0);
    }

    #[tokio::test]
    async fn only_primary_admin_creates_accounts() {
        let (state, _temp) = test_state();

        let auth = login_session(&state).await;
        let status = create_admin(
            auth,
            State(state.clone()),
            Json(CreateAdminRequest {
                username: "second".to_string(),
                password: "second-pass".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        // The secondary admin cannot create accounts
        let Json(login_response) = login(
            State(state.clone()),
            Json(AdminLoginRequest {
                username: "second".to_string(),
                password: "second-pass".to_string(),
            }),
        )
        .await
        .unwrap();
        let session = AdminSessionRepository::new(&state.storage)
            .get_by_token(&login_response.token)
            .unwrap();

        let result = create_admin(
            AdminAuth(session),
            State(state.clone()),
            Json(CreateAdminRequest {
                username: "third".to_string(),
                password: "third-pass".to_string(),
            }),
        )
        .await;
        match result {
            Err(err) => assert_eq!(err.status, StatusCode::FORBIDDEN),
            Ok(_) => panic!("expected forbidden"),
        }
    }
}
