//! Catalog service for book management

use crate::{
    error::AppResult,
    models::book::{Book, BookPage, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with pagination
    pub async fn list(&self, query: &BookQuery) -> AppResult<BookPage> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

        let (items, total) = self.repository.books.list(query).await?;

        Ok(BookPage {
            items,
            page,
            per_page,
            total,
        })
    }

    /// Get a single book
    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.require_by_id(id).await
    }

    /// Admin: add a book to the catalog
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = self.repository.books.create(book).await?;
        tracing::info!(book_id = created.id, title = %created.title, "book created");
        Ok(created)
    }

    /// Admin: update book metadata and copy counts
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        self.repository.books.update(id, update).await
    }

    /// Admin: remove a book; refused while copies are out
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }
}
