//! # Catalog Service
//!
//! Genres, publishers, book types and conditions. All four are name-only
//! lookup tables, so one set of generic operations serves them.
//!
//! ## Rules
//! - Names are trimmed and compared case-insensitively
//! - Adding a name that exists fails with `Duplicate`
//! - Renaming to the same name fails with `Unchanged`
//! - Renaming a name that does not exist fails with `NotFound`
//! - Changing only the letter case of a name is a valid rename

use tracing::info;

use bookstore_core::validation::validate_reference_name;
use bookstore_core::{BookType, Condition, Filter, Genre, Publisher, ReferenceData, ValidationError};
use bookstore_db::Repository;

use crate::error::{AdminError, AdminResult};
use crate::state::Repositories;

pub struct CatalogService {
    repos: Repositories,
}

impl CatalogService {
    pub fn new(repos: Repositories) -> Self {
        CatalogService { repos }
    }

    // =========================================================================
    // Genres
    // =========================================================================

    pub async fn add_genre(&self, name: &str) -> AdminResult<Genre> {
        add(self.repos.genres.as_ref(), name).await
    }

    pub async fn rename_genre(&self, actual: &str, name: &str) -> AdminResult<Genre> {
        rename(self.repos.genres.as_ref(), actual, name).await
    }

    pub async fn list_genres(&self) -> AdminResult<Vec<Genre>> {
        Ok(self.repos.genres.list(Filter::All).await?)
    }

    // =========================================================================
    // Publishers
    // =========================================================================

    pub async fn add_publisher(&self, name: &str) -> AdminResult<Publisher> {
        add(self.repos.publishers.as_ref(), name).await
    }

    pub async fn rename_publisher(&self, actual: &str, name: &str) -> AdminResult<Publisher> {
        rename(self.repos.publishers.as_ref(), actual, name).await
    }

    pub async fn list_publishers(&self) -> AdminResult<Vec<Publisher>> {
        Ok(self.repos.publishers.list(Filter::All).await?)
    }

    // =========================================================================
    // Book types
    // =========================================================================

    pub async fn add_book_type(&self, name: &str) -> AdminResult<BookType> {
        add(self.repos.book_types.as_ref(), name).await
    }

    pub async fn rename_book_type(&self, actual: &str, name: &str) -> AdminResult<BookType> {
        rename(self.repos.book_types.as_ref(), actual, name).await
    }

    pub async fn list_book_types(&self) -> AdminResult<Vec<BookType>> {
        Ok(self.repos.book_types.list(Filter::All).await?)
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    pub async fn add_condition(&self, name: &str) -> AdminResult<Condition> {
        add(self.repos.conditions.as_ref(), name).await
    }

    pub async fn rename_condition(&self, actual: &str, name: &str) -> AdminResult<Condition> {
        rename(self.repos.conditions.as_ref(), actual, name).await
    }

    pub async fn list_conditions(&self) -> AdminResult<Vec<Condition>> {
        Ok(self.repos.conditions.list(Filter::All).await?)
    }
}

// =============================================================================
// Generic operations
// =============================================================================

/// The record whose name equals `name` ignoring ASCII case.
async fn find_by_name<E: ReferenceData>(
    repo: &dyn Repository<E>,
    name: &str,
) -> AdminResult<Option<E>> {
    let candidates = repo.list(Filter::contains("name", name)).await?;
    Ok(candidates
        .into_iter()
        .find(|r| r.name().eq_ignore_ascii_case(name)))
}

async fn add<E: ReferenceData>(repo: &dyn Repository<E>, name: &str) -> AdminResult<E> {
    let name = name.trim();
    validate_reference_name(E::LABEL, name)?;

    if find_by_name(repo, name).await?.is_some() {
        return Err(duplicate::<E>(name));
    }

    let record = E::new(name);
    repo.add(record.clone()).await?;
    repo.save().await?;

    info!(entity = E::NAME, id = %record.id(), name = %name, "Reference record added");
    Ok(record)
}

async fn rename<E: ReferenceData>(
    repo: &dyn Repository<E>,
    actual: &str,
    name: &str,
) -> AdminResult<E> {
    let actual = actual.trim();
    let name = name.trim();
    validate_reference_name(E::LABEL, name)?;

    if actual == name {
        return Err(ValidationError::Unchanged {
            field: E::LABEL.to_string(),
            value: name.to_string(),
        }
        .into());
    }

    let mut record = find_by_name(repo, actual)
        .await?
        .ok_or_else(|| AdminError::not_found(E::NAME, actual))?;

    if let Some(other) = find_by_name(repo, name).await? {
        if other.id() != record.id() {
            return Err(duplicate::<E>(name));
        }
    }

    record.set_name(name.to_string());
    repo.update(record.clone()).await?;
    repo.save().await?;

    info!(entity = E::NAME, id = %record.id(), from = %actual, to = %name, "Reference record renamed");
    Ok(record)
}

fn duplicate<E: ReferenceData>(name: &str) -> AdminError {
    ValidationError::Duplicate {
        field: E::LABEL.to_string(),
        value: name.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use bookstore_db::{DeletePolicy, MemoryStore};

    fn service() -> CatalogService {
        let store = MemoryStore::new(DeletePolicy::Soft);
        CatalogService::new(Repositories::in_memory(&store))
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let svc = service();
        svc.add_genre("Fantasy").await.unwrap();
        svc.add_genre("  Poetry ").await.unwrap();

        let names: Vec<_> = svc
            .list_genres()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["Fantasy", "Poetry"]);
    }

    #[tokio::test]
    async fn test_add_duplicate_ignores_case() {
        let svc = service();
        svc.add_publisher("Penguin").await.unwrap();

        let err = svc.add_publisher("PENGUIN").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "publisher 'PENGUIN' already exists");
        assert_eq!(svc.list_publishers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_blank_name() {
        let svc = service();
        let err = svc.add_condition("   ").await.unwrap_err();
        assert_eq!(err.message, "condition is required");
    }

    #[tokio::test]
    async fn test_substring_is_not_a_duplicate() {
        let svc = service();
        svc.add_book_type("Paperback").await.unwrap();
        svc.add_book_type("Paper").await.unwrap();
        assert_eq!(svc.list_book_types().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rename() {
        let svc = service();
        let genre = svc.add_genre("Sci-Fi").await.unwrap();

        let renamed = svc.rename_genre("sci-fi", "Science Fiction").await.unwrap();
        assert_eq!(renamed.id, genre.id);

        let genres = svc.list_genres().await.unwrap();
        assert_eq!(genres.len(), 1);
        assert_eq!(genres[0].name, "Science Fiction");
    }

    #[tokio::test]
    async fn test_rename_unchanged() {
        let svc = service();
        svc.add_genre("Mystery").await.unwrap();

        let err = svc.rename_genre("Mystery", " Mystery ").await.unwrap_err();
        assert_eq!(err.message, "genre 'Mystery' is unchanged");
    }

    #[tokio::test]
    async fn test_rename_case_only_is_allowed() {
        let svc = service();
        svc.add_condition("like new").await.unwrap();

        svc.rename_condition("like new", "Like New").await.unwrap();
        assert_eq!(svc.list_conditions().await.unwrap()[0].name, "Like New");
    }

    #[tokio::test]
    async fn test_rename_missing_is_not_found() {
        let svc = service();
        let err = svc.rename_publisher("Tor", "Orbit").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_is_duplicate() {
        let svc = service();
        svc.add_publisher("Tor").await.unwrap();
        svc.add_publisher("Orbit").await.unwrap();

        let err = svc.rename_publisher("Tor", "orbit").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("already exists"));
    }
}
