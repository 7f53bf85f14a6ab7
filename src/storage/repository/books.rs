// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Book repository.
//!
//! Book files live on an external drive service; records here hold the
//! share link (and optionally the bare file id) plus catalog metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Catalog book entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredBook {
    /// Unique identifier (UUID).
    pub id: String,
    /// Title.
    pub title: String,
    /// Author, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Description shown on the detail page.
    pub description: String,
    /// Category, when assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Cover image URL (often a drive share link).
    pub cover_url: String,
    /// Drive share link to the book file.
    pub drive_link: String,
    /// Bare drive file id, when known (skips link parsing on download).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_file_id: Option<String>,
    /// Download counter.
    pub downloads: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Repository for book records.
pub struct BookRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> BookRepository<'a> {
    /// Create a new BookRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a book exists.
    pub fn exists(&self, book_id: &str) -> bool {
        self.storage.exists(self.storage.paths().book(book_id))
    }

    /// Get a book by ID.
    pub fn get(&self, book_id: &str) -> StorageResult<StoredBook> {
        let path = self.storage.paths().book(book_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Book {book_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new book.
    pub fn create(&self, book: &StoredBook) -> StorageResult<()> {
        if self.exists(&book.id) {
            return Err(StorageError::AlreadyExists(format!("Book {}", book.id)));
        }
        self.storage
            .write_json(self.storage.paths().book(&book.id), book)
    }

    /// Update an existing book.
    pub fn update(&self, book: &StoredBook) -> StorageResult<()> {
        if !self.exists(&book.id) {
            return Err(StorageError::NotFound(format!("Book {}", book.id)));
        }
        self.storage
            .write_json(self.storage.paths().book(&book.id), book)
    }

    /// Delete a book.
    pub fn delete(&self, book_id: &str) -> StorageResult<()> {
        if !self.exists(book_id) {
            return Err(StorageError::NotFound(format!("Book {book_id}")));
        }
        self.storage.delete(self.storage.paths().book(book_id))
    }

    /// Increment the download counter. Returns the updated record.
    pub fn increment_downloads(&self, book_id: &str) -> StorageResult<StoredBook> {
        let mut book = self.get(book_id)?;
        book.downloads += 1;
        book.updated_at = Utc::now();
        self.update(&book)?;
        Ok(book)
    }

    /// List all books, newest first, optionally filtered by category.
    pub fn list_all(&self, category_id: Option<&str>) -> StorageResult<Vec<StoredBook>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().books_dir(), "json")?;

        let mut books = Vec::new();
        for id in ids {
            if let Ok(book) = self.get(&id) {
                if category_id.is_none_or(|c| book.category_id.as_deref() == Some(c)) {
                    books.push(book);
                }
            }
        }

        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    /// Count all books (admin stats).
    pub fn count(&self) -> StorageResult<usize> {
        Ok(self
            .storage
            .list_files(self.storage.paths().books_dir(), "json")?
            .len())
    }
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

    fn test_book(title: &str, category_id: Option<&str>) -> StoredBook {
        let now = Utc::now();
        StoredBook {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            author: None,
            description: "desc".to_string(),
            category_id: category_id.map(str::to_string),
            cover_url: "https://drive.google.com/file/d/abc/view".to_string(),
            drive_link: "https://drive.google.com/file/d/abc/view".to_string(),
            drive_file_id: None,
            downloads: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_get() {
        let (_temp, storage) = setup();
        let repo = BookRepository::new(&storage);

        let book = test_book("Book A", None);
        repo.create(&book).unwrap();
        assert_eq!(repo.get(&book.id).unwrap().title, "Book A");
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn increment_downloads_counts_up() {
        let (_temp, storage) = setup();
        let repo = BookRepository::new(&storage);

        let book = test_book("Book A", None);
        repo.create(&book).unwrap();

        repo.increment_downloads(&book.id).unwrap();
        let updated = repo.increment_downloads(&book.id).unwrap();
        assert_eq!(updated.downloads, 2);
    }

    #[test]
    fn list_filters_by_category() {
        let (_temp, storage) = setup();
        let repo = BookRepository::new(&storage);

        repo.create(&test_book("In cat", Some("cat-1"))).unwrap();
        repo.create(&test_book("No cat", None)).unwrap();

        let filtered = repo.list_all(Some("cat-1")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "In cat");

        let all = repo.list_all(None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
