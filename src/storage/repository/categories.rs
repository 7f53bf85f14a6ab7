// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DigiLib

//! Category repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// Catalog category.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredCategory {
    /// Unique identifier (UUID).
    pub id: String,
    /// Display name. Unique.
    pub name: String,
    /// Optional description shown on the library page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Accent color (hex).
    pub color: String,
    /// Icon name rendered by the client.
    pub icon: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Repository for categories.
pub struct CategoryRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new CategoryRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a category exists.
    pub fn exists(&self, category_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().category(category_id))
    }

    /// Get a category by ID.
    pub fn get(&self, category_id: &str) -> StorageResult<StoredCategory> {
        let path = self.storage.paths().category(category_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Category {category_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new category. Duplicate names are rejected.
    pub fn create(&self, category: &StoredCategory) -> StorageResult<()> {
        if self.exists(&category.id) {
            return Err(StorageError::AlreadyExists(format!(
                "Category {}",
                category.id
            )));
        }
        for existing in self.list_all()? {
            if existing.name == category.name {
                return Err(StorageError::AlreadyExists(format!(
                    "Category named {}",
                    category.name
                )));
            }
        }
        self.storage
            .write_json(self.storage.paths().category(&category.id), category)
    }

    /// Update an existing category.
    pub fn update(&self, category: &StoredCategory) -> StorageResult<()> {
        if !self.exists(&category.id) {
            return Err(StorageError::NotFound(format!("Category {}", category.id)));
        }
        self.storage
            .write_json(self.storage.paths().category(&category.id), category)
    }

    /// Delete a category.
    pub fn delete(&self, category_id: &str) -> StorageResult<()> {
        if !self.exists(category_id) {
            return Err(StorageError::NotFound(format!("Category {category_id}")));
        }
        self.storage
            .delete(self.storage.paths().category(category_id))
    }

    /// List all categories ordered by name.
    pub fn list_all(&self) -> StorageResult<Vec<StoredCategory>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().categories_dir(), "json")?;

        let mut categories = Vec::new();
        for id in ids {
            if let Ok(category) = self.get(&id) {
                categories.push(category);
            }
        }

        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
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

    fn test_category(name: &str) -> StoredCategory {
        StoredCategory {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            color: "#667eea".to_string(),
            icon: "Book".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_get_delete() {
        let (_temp, storage) = setup();
        let repo = CategoryRepository::new(&storage);

        let category = test_category("Novels");
        repo.create(&category).unwrap();
        assert_eq!(repo.get(&category.id).unwrap().name, "Novels");

        repo.delete(&category.id).unwrap();
        assert!(matches!(
            repo.get(&category.id),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let (_temp, storage) = setup();
        let repo = CategoryRepository::new(&storage);

        repo.create(&test_category("History")).unwrap();
        let result = repo.create(&test_category("History"));
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[test]
    fn list_is_ordered_by_name() {
        let (_temp, storage) = setup();
        let repo = CategoryRepository::new(&storage);

        repo.create(&test_category("Zoology")).unwrap();
        repo.create(&test_category("Art")).unwrap();
        repo.create(&test_category("Math")).unwrap();

        let names: Vec<String> = repo.list_all().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Art", "Math", "Zoology"]);
    }
}
