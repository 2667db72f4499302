//! Persistence port for the bookstore domain.
//!
//! The domain only needs a handful of reads and writes (exists-by-name lookups,
//! get-or-create, bulk filtered updates, row creation). Adapters live in
//! `knigi-infra`.

use std::sync::Arc;

use thiserror::Error;

use knigi_core::{DomainError, StoreId};

use crate::model::{Book, Inventory, InventoryLine, Isbn, Publisher, Store};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A record would violate a domain rule, or a lookup came back empty.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The storage backend failed (connection, query, lock poisoning, ...).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn storage(err: impl core::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Read/write operations the shipment and sale procedures rely on.
///
/// Books are looked up by name across the whole catalog. When several books
/// share a name, the oldest one wins. Methods take `&self`; implementations
/// handle their own interior mutability.
pub trait InventoryRepository: Send + Sync {
    /// Register a new store. Store names are unique.
    fn create_store(&self, name: &str) -> RepositoryResult<Store>;
    fn find_store_by_name(&self, name: &str) -> RepositoryResult<Option<Store>>;
    fn list_stores(&self) -> RepositoryResult<Vec<Store>>;

    /// All inventory rows of `store` whose book is named `title`.
    fn find_inventory(&self, store: StoreId, title: &str) -> RepositoryResult<Vec<Inventory>>;
    /// Every inventory row of `store`, oldest first.
    fn list_inventory(&self, store: StoreId) -> RepositoryResult<Vec<InventoryLine>>;

    fn find_book_by_name(&self, name: &str) -> RepositoryResult<Option<Book>>;
    fn get_or_create_publisher(&self, name: &str) -> RepositoryResult<Publisher>;
    fn create_book(&self, name: &str, publisher: &Publisher) -> RepositoryResult<Book>;
    fn create_inventory(
        &self,
        store: StoreId,
        book: &Book,
        stock: u32,
    ) -> RepositoryResult<Inventory>;

    /// Add `delta` to the stock of every row matching (store, title).
    /// Returns the number of rows updated. If any row would pass `u32::MAX`,
    /// no row changes and an invariant violation is returned.
    fn bulk_increment_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize>;

    /// Subtract `delta` from every row matching (store, title) whose stock
    /// covers it. Rows with less stock are left untouched, so stock never goes
    /// negative. Returns the number of rows updated.
    fn bulk_decrement_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize>;

    /// Assign an ISBN to the book named `title`.
    fn set_isbn(&self, title: &str, isbn: Isbn) -> RepositoryResult<Book>;
}

impl<R> InventoryRepository for Arc<R>
where
    R: InventoryRepository + ?Sized,
{
    fn create_store(&self, name: &str) -> RepositoryResult<Store> {
        (**self).create_store(name)
    }

    fn find_store_by_name(&self, name: &str) -> RepositoryResult<Option<Store>> {
        (**self).find_store_by_name(name)
    }

    fn list_stores(&self) -> RepositoryResult<Vec<Store>> {
        (**self).list_stores()
    }

    fn find_inventory(&self, store: StoreId, title: &str) -> RepositoryResult<Vec<Inventory>> {
        (**self).find_inventory(store, title)
    }

    fn list_inventory(&self, store: StoreId) -> RepositoryResult<Vec<InventoryLine>> {
        (**self).list_inventory(store)
    }

    fn find_book_by_name(&self, name: &str) -> RepositoryResult<Option<Book>> {
        (**self).find_book_by_name(name)
    }

    fn get_or_create_publisher(&self, name: &str) -> RepositoryResult<Publisher> {
        (**self).get_or_create_publisher(name)
    }

    fn create_book(&self, name: &str, publisher: &Publisher) -> RepositoryResult<Book> {
        (**self).create_book(name, publisher)
    }

    fn create_inventory(
        &self,
        store: StoreId,
        book: &Book,
        stock: u32,
    ) -> RepositoryResult<Inventory> {
        (**self).create_inventory(store, book, stock)
    }

    fn bulk_increment_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize> {
        (**self).bulk_increment_stock(store, title, delta)
    }

    fn bulk_decrement_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize> {
        (**self).bulk_decrement_stock(store, title, delta)
    }

    fn set_isbn(&self, title: &str, isbn: Isbn) -> RepositoryResult<Book> {
        (**self).set_isbn(title, isbn)
    }
}
