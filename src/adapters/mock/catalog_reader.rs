use crate::domain::value_objects::BookId;
use crate::ports::catalog_reader::{Book, CatalogReader as CatalogReaderTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Mock implementation of CatalogReader
///
/// Supports stateful testing by storing books in memory.
/// Books can be registered and removed to simulate catalog changes.
pub struct CatalogReader {
    books: Mutex<HashMap<BookId, Book>>,
}

impl CatalogReader {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
        }
    }

    /// Build a catalog preloaded with the given books
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        let catalog = Self::new();
        for book in books {
            catalog.add_book(book);
        }
        catalog
    }

    /// Build a catalog from a JSON array of books
    ///
    /// Used to seed the in-memory backend from a fixture file.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let books: Vec<Book> = serde_json::from_str(json)?;
        Ok(Self::with_books(books))
    }

    /// Register a book for testing purposes
    pub fn add_book(&self, book: Book) {
        self.books
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(book.book_id.clone(), book);
    }

    /// Remove a book to simulate a catalog entry disappearing
    pub fn remove_book(&self, book_id: &BookId) {
        self.books
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(book_id);
    }
}

impl Default for CatalogReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogReaderTrait for CatalogReader {
    /// Look up a registered book
    async fn get_book(&self, book_id: &BookId) -> Result<Option<Book>> {
        Ok(self
            .books
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(book_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_json_seeds_catalog() {
        let catalog = CatalogReader::from_json(
            r#"[
                {"book_id": "dune", "title": "Dune", "author": "Frank Herbert", "rating": 4.5},
                {"book_id": "emma", "title": "Emma", "author": "Jane Austen", "summary": "Matchmaking"}
            ]"#,
        )
        .unwrap();

        let dune = catalog
            .get_book(&BookId::new("dune").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dune.title, "Dune");
        assert_eq!(dune.summary, "");
        assert_eq!(dune.image_url, None);

        let books = catalog
            .get_books(&[BookId::new("emma").unwrap(), BookId::new("none").unwrap()])
            .await
            .unwrap();
        assert_eq!(books.len(), 1);
    }

    #[test]
    fn test_from_json_rejects_invalid_ids() {
        let result = CatalogReader::from_json(r#"[{"book_id": "", "title": "T", "author": "A"}]"#);
        assert!(result.is_err());
    }
}
