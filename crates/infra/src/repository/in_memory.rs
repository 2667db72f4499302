use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use knigi_core::{BookId, DomainError, Entity, InventoryId, PublisherId, StoreId};
use knigi_inventory::{
    Book, Inventory, InventoryLine, InventoryRepository, Isbn, Publisher, RepositoryError,
    RepositoryResult, Store,
};

/// Tables keyed by UUIDv7 ids, so iteration order is creation order.
#[derive(Debug, Default)]
struct Tables {
    publishers: BTreeMap<PublisherId, Publisher>,
    books: BTreeMap<BookId, Book>,
    stores: BTreeMap<StoreId, Store>,
    inventory: BTreeMap<InventoryId, Inventory>,
}

impl Tables {
    fn book_ids_named(&self, title: &str) -> Vec<BookId> {
        self.books
            .values()
            .filter(|b| b.name() == title)
            .map(Book::id_typed)
            .collect()
    }

    fn rows_for<'a>(
        &'a mut self,
        store: StoreId,
        title: &str,
    ) -> impl Iterator<Item = &'a mut Inventory> + 'a {
        let books = self.book_ids_named(title);
        self.inventory
            .values_mut()
            .filter(move |row| row.store_id == store && books.contains(&row.book_id))
    }
}

fn insert<E>(table: &mut BTreeMap<E::Id, E>, record: E) -> E
where
    E: Entity + Clone,
    E::Id: Ord,
{
    table.insert(record.id().clone(), record.clone());
    record
}

/// In-memory repository for tests/dev.
///
/// The lock makes it shareable across threads; it does not make a
/// read-then-write sequence atomic.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    inner: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| RepositoryError::storage("in-memory repository lock poisoned"))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| RepositoryError::storage("in-memory repository lock poisoned"))
    }
}

impl InventoryRepository for InMemoryRepository {
    fn create_store(&self, name: &str) -> RepositoryResult<Store> {
        let store = Store::new(StoreId::new(), name)?;
        let mut tables = self.write()?;
        if tables.stores.values().any(|s| s.name() == name) {
            return Err(DomainError::conflict(format!("store '{name}' already exists")).into());
        }
        Ok(insert(&mut tables.stores, store))
    }

    fn find_store_by_name(&self, name: &str) -> RepositoryResult<Option<Store>> {
        let tables = self.read()?;
        Ok(tables.stores.values().find(|s| s.name() == name).cloned())
    }

    fn list_stores(&self) -> RepositoryResult<Vec<Store>> {
        let tables = self.read()?;
        Ok(tables.stores.values().cloned().collect())
    }

    fn find_inventory(&self, store: StoreId, title: &str) -> RepositoryResult<Vec<Inventory>> {
        let tables = self.read()?;
        let books = tables.book_ids_named(title);
        Ok(tables
            .inventory
            .values()
            .filter(|row| row.store_id == store && books.contains(&row.book_id))
            .cloned()
            .collect())
    }

    fn list_inventory(&self, store: StoreId) -> RepositoryResult<Vec<InventoryLine>> {
        let tables = self.read()?;
        let Some(store_name) = tables.stores.get(&store).map(|s| s.name().to_string()) else {
            return Ok(vec![]);
        };

        Ok(tables
            .inventory
            .values()
            .filter(|row| row.store_id == store)
            .map(|row| InventoryLine {
                inventory_id: row.id,
                store: store_name.clone(),
                title: tables
                    .books
                    .get(&row.book_id)
                    .map(|b| b.name().to_string())
                    .unwrap_or_default(),
                stock: row.stock,
                sold: row.sold,
            })
            .collect())
    }

    fn find_book_by_name(&self, name: &str) -> RepositoryResult<Option<Book>> {
        let tables = self.read()?;
        Ok(tables.books.values().find(|b| b.name() == name).cloned())
    }

    fn get_or_create_publisher(&self, name: &str) -> RepositoryResult<Publisher> {
        let mut tables = self.write()?;
        if let Some(existing) = tables.publishers.values().find(|p| p.name() == name) {
            return Ok(existing.clone());
        }
        let publisher = Publisher::new(PublisherId::new(), name)?;
        Ok(insert(&mut tables.publishers, publisher))
    }

    fn create_book(&self, name: &str, publisher: &Publisher) -> RepositoryResult<Book> {
        let book = Book::new(BookId::new(), name, publisher.id_typed())?;
        let mut tables = self.write()?;
        if !tables.publishers.contains_key(&publisher.id_typed()) {
            let missing = DomainError::not_found(format!("publisher {}", publisher.id_typed()));
            return Err(missing.into());
        }
        Ok(insert(&mut tables.books, book))
    }

    fn create_inventory(
        &self,
        store: StoreId,
        book: &Book,
        stock: u32,
    ) -> RepositoryResult<Inventory> {
        let mut tables = self.write()?;
        if !tables.stores.contains_key(&store) {
            return Err(DomainError::not_found(format!("store {store}")).into());
        }
        if !tables.books.contains_key(&book.id_typed()) {
            return Err(DomainError::not_found(format!("book {}", book.id_typed())).into());
        }
        let row = Inventory::new(InventoryId::new(), book.id_typed(), store, stock);
        Ok(insert(&mut tables.inventory, row))
    }

    fn bulk_increment_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize> {
        let mut tables = self.write()?;
        let rows: Vec<&mut Inventory> = tables.rows_for(store, title).collect();
        if rows.iter().any(|row| row.stock.checked_add(delta).is_none()) {
            return Err(DomainError::invariant(format!("stock of '{title}' would overflow")).into());
        }
        let updated = rows.len();
        for row in rows {
            row.stock += delta;
        }
        Ok(updated)
    }

    fn bulk_decrement_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize> {
        let mut tables = self.write()?;
        let mut updated = 0;
        for row in tables.rows_for(store, title) {
            if let Some(stock) = row.stock.checked_sub(delta) {
                row.stock = stock;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn set_isbn(&self, title: &str, isbn: Isbn) -> RepositoryResult<Book> {
        let mut tables = self.write()?;
        let book = tables
            .books
            .values_mut()
            .find(|b| b.name() == title)
            .ok_or_else(|| DomainError::not_found(format!("book '{title}'")))?;
        *book = book.clone().with_isbn(Some(isbn));
        Ok(book.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (InMemoryRepository, Store, Book) {
        let repo = InMemoryRepository::new();
        let store = repo.create_store("Dom knigi").unwrap();
        let publisher = repo.get_or_create_publisher("Molodaya gvardia").unwrap();
        let book = repo.create_book("Pnin", &publisher).unwrap();
        (repo, store, book)
    }

    #[test]
    fn get_or_create_publisher_reuses_existing_name() {
        let repo = InMemoryRepository::new();
        let first = repo.get_or_create_publisher("Ardis").unwrap();
        let second = repo.get_or_create_publisher("Ardis").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_store_name_conflicts() {
        let repo = InMemoryRepository::new();
        repo.create_store("Dom knigi").unwrap();
        let err = repo.create_store("Dom knigi").unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn find_book_by_name_prefers_oldest_duplicate() {
        let (repo, _store, first) = seeded();
        let publisher = repo.get_or_create_publisher("Ardis").unwrap();
        repo.create_book("Pnin", &publisher).unwrap();

        let found = repo.find_book_by_name("Pnin").unwrap().unwrap();
        assert_eq!(found.id_typed(), first.id_typed());
    }

    #[test]
    fn bulk_increment_updates_every_matching_row() {
        let (repo, store, book) = seeded();
        repo.create_inventory(store.id_typed(), &book, 1).unwrap();
        repo.create_inventory(store.id_typed(), &book, 2).unwrap();

        let updated = repo.bulk_increment_stock(store.id_typed(), "Pnin", 5).unwrap();
        assert_eq!(updated, 2);

        let stock: Vec<u32> = repo
            .find_inventory(store.id_typed(), "Pnin")
            .unwrap()
            .iter()
            .map(|r| r.stock)
            .collect();
        assert_eq!(stock, [6, 7]);
    }

    #[test]
    fn overflowing_increment_changes_no_row() {
        let (repo, store, book) = seeded();
        repo.create_inventory(store.id_typed(), &book, 1).unwrap();
        repo.create_inventory(store.id_typed(), &book, u32::MAX).unwrap();

        let err = repo.bulk_increment_stock(store.id_typed(), "Pnin", 1).unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::InvariantViolation(_))));

        let stock: Vec<u32> = repo
            .find_inventory(store.id_typed(), "Pnin")
            .unwrap()
            .iter()
            .map(|r| r.stock)
            .collect();
        assert_eq!(stock, [1, u32::MAX]);
    }

    #[test]
    fn bulk_decrement_skips_rows_without_enough_stock() {
        let (repo, store, book) = seeded();
        repo.create_inventory(store.id_typed(), &book, 2).unwrap();

        assert_eq!(repo.bulk_decrement_stock(store.id_typed(), "Pnin", 3).unwrap(), 0);
        assert_eq!(repo.bulk_decrement_stock(store.id_typed(), "Pnin", 2).unwrap(), 1);

        let rows = repo.find_inventory(store.id_typed(), "Pnin").unwrap();
        assert_eq!(rows[0].stock, 0);
    }

    #[test]
    fn inventory_is_scoped_to_its_store() {
        let (repo, store, book) = seeded();
        let other = repo.create_store("Biblio-Globus").unwrap();
        repo.create_inventory(store.id_typed(), &book, 4).unwrap();

        assert!(repo.find_inventory(other.id_typed(), "Pnin").unwrap().is_empty());
        assert_eq!(repo.bulk_increment_stock(other.id_typed(), "Pnin", 1).unwrap(), 0);
        assert!(repo.list_inventory(other.id_typed()).unwrap().is_empty());
    }

    #[test]
    fn list_inventory_joins_store_and_book_names() {
        let (repo, store, book) = seeded();
        repo.create_inventory(store.id_typed(), &book, 4).unwrap();

        let lines = repo.list_inventory(store.id_typed()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].store, "Dom knigi");
        assert_eq!(lines[0].title, "Pnin");
        assert_eq!(lines[0].stock, 4);
        assert_eq!(lines[0].sold, 0);
    }

    #[test]
    fn create_inventory_requires_known_store() {
        let (repo, _store, book) = seeded();
        let err = repo.create_inventory(StoreId::new(), &book, 1).unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn set_isbn_updates_the_catalog() {
        let (repo, _store, _book) = seeded();
        let updated = repo.set_isbn("Pnin", Isbn::parse("0679723404").unwrap()).unwrap();
        assert_eq!(updated.isbn().map(Isbn::as_str), Some("0679723404"));

        let reloaded = repo.find_book_by_name("Pnin").unwrap().unwrap();
        assert_eq!(reloaded, updated);
    }

    #[test]
    fn set_isbn_on_unknown_title_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.set_isbn("Ada", Isbn::parse("1").unwrap()).unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::NotFound(_))));
    }
}
