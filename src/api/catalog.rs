// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Catalog API: categories, books, downloads.
//!
//! Every route is gated by a library access token. Book files and covers
//! live on a third-party drive service; the detail response carries derived
//! thumbnail and direct-download URLs so the client never parses share
//! links itself.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::LibraryAccess,
    error::ApiError,
    state::AppState,
    storage::{AuditEventType, BookRepository, CategoryRepository, StoredBook, StoredCategory},
};

/// Width of derived cover thumbnails.
const THUMBNAIL_WIDTH: u32 = 400;

/// Book list/detail item with derived URLs.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookResponse {
    /// The stored book record.
    #[serde(flatten)]
    pub book: StoredBook,
    /// Cover thumbnail URL (drive links rewritten to the thumbnail API).
    pub thumbnail_url: String,
    /// Direct download URL for the book file.
    pub download_url: String,
}

/// Response for category listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryListResponse {
    /// Categories ordered by name.
    pub categories: Vec<StoredCategory>,
    /// Total count.
    pub total: usize,
}

/// Response for book listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookListResponse {
    /// Books, newest first.
    pub books: Vec<BookResponse>,
    /// Total count.
    pub total: usize,
}

/// Response for a download request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DownloadResponse {
    /// Direct download URL.
    pub download_url: String,
    /// Updated download counter.
    pub downloads: u64,
}

/// Query params for listing books.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct BookListQuery {
    /// Optional category filter.
    pub category_id: Option<String>,
}

/// Extract a drive file id from a share link.
///
/// Handles the `/d/<id>/` and `id=<id>` forms.
pub fn extract_drive_file_id(url: &str) -> Option<&str> {
    if let Some(rest) = url.split("/d/").nth(1) {
        let id = rest.split(['/', '?']).next().unwrap_or(rest);
        if !id.is_empty() {
            return Some(id);
        }
    }
    if let Some(rest) = url.split("id=").nth(1) {
        let id = rest.split('&').next().unwrap_or(rest);
        if !id.is_empty() {
            return Some(id);
        }
    }
    None
}

/// Derive a thumbnail URL for a cover.
///
/// Drive share links are rewritten to the thumbnail API; anything else
/// passes through untouched.
pub fn thumbnail_url(cover_url: &str) -> String {
    if cover_url.contains("drive.google.com") {
        if let Some(id) = extract_drive_file_id(cover_url) {
            return format!(
                "https://drive.google.com/thumbnail?id={id}&sz=w{THUMBNAIL_WIDTH}"
            );
        }
    }
    cover_url.to_string()
}

/// Derive a direct download URL for a book file.
///
/// Prefers the stored bare file id, then parses the share link; falls back
/// to the raw link when neither yields an id.
pub fn download_url(drive_link: &str, drive_file_id: Option<&str>) -> String {
    let id = drive_file_id
        .filter(|id| !id.is_empty())
        .or_else(|| extract_drive_file_id(drive_link));

    match id {
        Some(id) => format!("https://drive.google.com/uc?export=download&id={id}"),
        None => drive_link.to_string(),
    }
}

fn to_response(book: StoredBook) -> BookResponse {
    let thumbnail_url = thumbnail_url(&book.cover_url);
    let download_url = download_url(&book.drive_link, book.drive_file_id.as_deref());
    BookResponse {
        book,
        thumbnail_url,
        download_url,
    }
}

/// List categories.
#[utoipa::path(
    get,
    path = "/v1/catalog/categories",
    tag = "Catalog",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories", body = CategoryListResponse),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn list_categories(
    LibraryAccess(_grant): LibraryAccess,
    State(state): State<AppState>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = CategoryRepository::new(&state.storage)
        .list_all()
        .map_err(|e| ApiError::internal(format!("Failed to list categories: {e}")))?;
    let total = categories.len();
    Ok(Json(CategoryListResponse { categories, total }))
}

/// List books, newest first, optionally filtered by category.
#[utoipa::path(
    get,
    path = "/v1/catalog/books",
    tag = "Catalog",
    params(BookListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Books", body = BookListResponse),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn list_books(
    LibraryAccess(_grant): LibraryAccess,
    State(state): State<AppState>,
    Query(query): Query<BookListQuery>,
) -> Result<Json<BookListResponse>, ApiError> {
    let books = BookRepository::new(&state.storage)
        .list_all(query.category_id.as_deref())
        .map_err(|e| ApiError::internal(format!("Failed to list books: {e}")))?;

    let books: Vec<BookResponse> = books.into_iter().map(to_response).collect();
    let total = books.len();
    Ok(Json(BookListResponse { books, total }))
}

/// Book detail.
#[utoipa::path(
    get,
    path = "/v1/catalog/books/{book_id}",
    tag = "Catalog",
    params(("book_id" = String, Path, description = "Book id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Book detail", body = BookResponse),
        (status = 401, description = "Missing or unknown token"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    LibraryAccess(_grant): LibraryAccess,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = BookRepository::new(&state.storage)
        .get(&book_id)
        .map_err(|_| ApiError::not_found("Book not found"))?;
    Ok(Json(to_response(book)))
}

/// Record a download and return the direct link.
#[utoipa::path(
    post,
    path = "/v1/catalog/books/{book_id}/download",
    tag = "Catalog",
    params(("book_id" = String, Path, description = "Book id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Download link", body = DownloadResponse),
        (status = 401, description = "Missing or unknown token"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn download_book(
    LibraryAccess(grant): LibraryAccess,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let repo = BookRepository::new(&state.storage);
    let book = repo
        .increment_downloads(&book_id)
        .map_err(|_| ApiError::not_found("Book not found"))?;

    audit_log!(
        &state.storage,
        AuditEventType::BookDownloaded,
        &grant.email,
        "book",
        &book.id
    );

    Ok(Json(DownloadResponse {
        download_url: download_url(&book.drive_link, book.drive_file_id.as_deref()),
        downloads: book.downloads,
    }))
}
