//! SQLite-backed repository.
//!
//! The domain port is synchronous, so the repository owns a current-thread
//! tokio runtime and blocks on every query. Do not call it from inside another
//! tokio runtime.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::runtime::Runtime;
use tracing::debug;

use knigi_core::{BookId, DomainError, InventoryId, PublisherId, StoreId};
use knigi_inventory::{
    Book, Inventory, InventoryLine, InventoryRepository, Isbn, Publisher, RepositoryError,
    RepositoryResult, Store,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS publishers (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id           TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        isbn         TEXT NULL,
        publisher_id TEXT NOT NULL REFERENCES publishers (id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_books_name ON books (name)",
    r#"
    CREATE TABLE IF NOT EXISTS stores (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory (
        id       TEXT PRIMARY KEY,
        book_id  TEXT NOT NULL REFERENCES books (id),
        store_id TEXT NOT NULL REFERENCES stores (id),
        stock    INTEGER NOT NULL DEFAULT 0 CHECK (stock BETWEEN 0 AND 4294967295),
        sold     INTEGER NOT NULL DEFAULT 0 CHECK (sold >= 0)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_inventory_store ON inventory (store_id)",
];

/// Repository persisted in a SQLite database via `sqlx`.
///
/// Ids are stored as hyphenated UUID text; UUIDv7 text sorts in creation
/// order, so `ORDER BY id` means oldest first.
pub struct SqliteRepository {
    // Dropped before the runtime that drives it.
    pool: SqlitePool,
    runtime: Runtime,
}

impl core::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SqliteRepository").finish_non_exhaustive()
    }
}

impl SqliteRepository {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub fn connect(url: &str) -> RepositoryResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RepositoryError::storage)?;

        let options = SqliteConnectOptions::from_str(url)
            .map_err(RepositoryError::storage)?
            .create_if_missing(true)
            .foreign_keys(true);

        // One connection: keeps `sqlite::memory:` databases alive and shared,
        // and serialises writers.
        let pool = runtime
            .block_on(
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect_with(options),
            )
            .map_err(RepositoryError::storage)?;

        let repo = Self { runtime, pool };
        repo.ensure_schema()?;
        debug!(url, "sqlite repository ready");
        Ok(repo)
    }

    /// Fresh private in-memory database (tests/dev).
    pub fn in_memory() -> RepositoryResult<Self> {
        Self::connect("sqlite::memory:")
    }

    fn run<T>(&self, fut: impl Future<Output = RepositoryResult<T>>) -> RepositoryResult<T> {
        self.runtime.block_on(fut)
    }

    fn ensure_schema(&self) -> RepositoryResult<()> {
        self.run(async {
            for statement in SCHEMA {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(RepositoryError::storage)?;
            }
            Ok(())
        })
    }
}

fn parse_id<T>(row: &SqliteRow, column: &str) -> RepositoryResult<T>
where
    T: FromStr<Err = DomainError>,
{
    let raw: String = row.try_get(column).map_err(RepositoryError::storage)?;
    Ok(raw.parse()?)
}

fn counter(row: &SqliteRow, column: &str) -> RepositoryResult<u32> {
    let raw: i64 = row.try_get(column).map_err(RepositoryError::storage)?;
    u32::try_from(raw)
        .map_err(|_| RepositoryError::storage(format!("{column} out of range: {raw}")))
}

fn store_from_row(row: &SqliteRow) -> RepositoryResult<Store> {
    let name: String = row.try_get("name").map_err(RepositoryError::storage)?;
    Ok(Store::new(parse_id(row, "id")?, name)?)
}

fn publisher_from_row(row: &SqliteRow) -> RepositoryResult<Publisher> {
    let name: String = row.try_get("name").map_err(RepositoryError::storage)?;
    Ok(Publisher::new(parse_id(row, "id")?, name)?)
}

fn book_from_row(row: &SqliteRow) -> RepositoryResult<Book> {
    let name: String = row.try_get("name").map_err(RepositoryError::storage)?;
    let isbn: Option<String> = row.try_get("isbn").map_err(RepositoryError::storage)?;
    let isbn = isbn.map(Isbn::parse).transpose()?;
    Ok(Book::new(parse_id(row, "id")?, name, parse_id(row, "publisher_id")?)?.with_isbn(isbn))
}

fn inventory_from_row(row: &SqliteRow) -> RepositoryResult<Inventory> {
    Ok(Inventory {
        id: parse_id(row, "id")?,
        book_id: parse_id(row, "book_id")?,
        store_id: parse_id(row, "store_id")?,
        stock: counter(row, "stock")?,
        sold: counter(row, "sold")?,
    })
}

impl InventoryRepository for SqliteRepository {
    fn create_store(&self, name: &str) -> RepositoryResult<Store> {
        let store = Store::new(StoreId::new(), name)?;
        self.run(async {
            let existing = sqlx::query("SELECT 1 FROM stores WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::storage)?;
            if existing.is_some() {
                return Err(DomainError::conflict(format!("store '{name}' already exists")).into());
            }

            sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
                .bind(store.id_typed().to_string())
                .bind(store.name())
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::storage)?;
            Ok(store)
        })
    }

    fn find_store_by_name(&self, name: &str) -> RepositoryResult<Option<Store>> {
        self.run(async {
            let row = sqlx::query("SELECT id, name FROM stores WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::storage)?;
            row.as_ref().map(store_from_row).transpose()
        })
    }

    fn list_stores(&self) -> RepositoryResult<Vec<Store>> {
        self.run(async {
            let rows = sqlx::query("SELECT id, name FROM stores ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(RepositoryError::storage)?;
            rows.iter().map(store_from_row).collect()
        })
    }

    fn find_inventory(&self, store: StoreId, title: &str) -> RepositoryResult<Vec<Inventory>> {
        self.run(async {
            let rows = sqlx::query(
                r#"
                SELECT i.id, i.book_id, i.store_id, i.stock, i.sold
                FROM inventory i
                JOIN books b ON b.id = i.book_id
                WHERE i.store_id = ?1 AND b.name = ?2
                ORDER BY i.id
                "#,
            )
            .bind(store.to_string())
            .bind(title)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;
            rows.iter().map(inventory_from_row).collect()
        })
    }

    fn list_inventory(&self, store: StoreId) -> RepositoryResult<Vec<InventoryLine>> {
        self.run(async {
            let rows = sqlx::query(
                r#"
                SELECT i.id, s.name AS store, b.name AS title, i.stock, i.sold
                FROM inventory i
                JOIN books b ON b.id = i.book_id
                JOIN stores s ON s.id = i.store_id
                WHERE i.store_id = ?1
                ORDER BY i.id
                "#,
            )
            .bind(store.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;

            rows.iter()
                .map(|row| {
                    Ok(InventoryLine {
                        inventory_id: parse_id::<InventoryId>(row, "id")?,
                        store: row.try_get("store").map_err(RepositoryError::storage)?,
                        title: row.try_get("title").map_err(RepositoryError::storage)?,
                        stock: counter(row, "stock")?,
                        sold: counter(row, "sold")?,
                    })
                })
                .collect()
        })
    }

    fn find_book_by_name(&self, name: &str) -> RepositoryResult<Option<Book>> {
        self.run(async {
            let row = sqlx::query(
                r#"
                SELECT id, name, isbn, publisher_id
                FROM books
                WHERE name = ?1
                ORDER BY id
                LIMIT 1
                "#,
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;
            row.as_ref().map(book_from_row).transpose()
        })
    }

    fn get_or_create_publisher(&self, name: &str) -> RepositoryResult<Publisher> {
        self.run(async {
            let existing = sqlx::query(
                "SELECT id, name FROM publishers WHERE name = ?1 ORDER BY id LIMIT 1",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;
            if let Some(row) = existing {
                return publisher_from_row(&row);
            }

            let publisher = Publisher::new(PublisherId::new(), name)?;
            sqlx::query("INSERT INTO publishers (id, name) VALUES (?1, ?2)")
                .bind(publisher.id_typed().to_string())
                .bind(publisher.name())
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::storage)?;
            Ok(publisher)
        })
    }

    fn create_book(&self, name: &str, publisher: &Publisher) -> RepositoryResult<Book> {
        let book = Book::new(BookId::new(), name, publisher.id_typed())?;
        self.run(async {
            sqlx::query(
                "INSERT INTO books (id, name, isbn, publisher_id) VALUES (?1, ?2, NULL, ?3)",
            )
            .bind(book.id_typed().to_string())
            .bind(book.name())
            .bind(publisher.id_typed().to_string())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;
            Ok(book)
        })
    }

    fn create_inventory(
        &self,
        store: StoreId,
        book: &Book,
        stock: u32,
    ) -> RepositoryResult<Inventory> {
        let row = Inventory::new(InventoryId::new(), book.id_typed(), store, stock);
        self.run(async {
            sqlx::query(
                r#"
                INSERT INTO inventory (id, book_id, store_id, stock, sold)
                VALUES (?1, ?2, ?3, ?4, 0)
                "#,
            )
            .bind(row.id.to_string())
            .bind(row.book_id.to_string())
            .bind(row.store_id.to_string())
            .bind(i64::from(row.stock))
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;
            Ok(row)
        })
    }

    fn bulk_increment_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize> {
        // A row pushed past u32::MAX fails the CHECK and the whole statement
        // is rolled back.
        self.run(async {
            let result = sqlx::query(
                r#"
                UPDATE inventory
                SET stock = stock + ?1
                WHERE store_id = ?2
                  AND book_id IN (SELECT id FROM books WHERE name = ?3)
                "#,
            )
            .bind(i64::from(delta))
            .bind(store.to_string())
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(|err| match err.as_database_error() {
                Some(db) if db.is_check_violation() => RepositoryError::from(
                    DomainError::invariant(format!("stock of '{title}' would overflow")),
                ),
                _ => RepositoryError::storage(err),
            })?;
            Ok(result.rows_affected() as usize)
        })
    }

    fn bulk_decrement_stock(
        &self,
        store: StoreId,
        title: &str,
        delta: u32,
    ) -> RepositoryResult<usize> {
        self.run(async {
            let result = sqlx::query(
                r#"
                UPDATE inventory
                SET stock = stock - ?1
                WHERE store_id = ?2
                  AND stock >= ?1
                  AND book_id IN (SELECT id FROM books WHERE name = ?3)
                "#,
            )
            .bind(i64::from(delta))
            .bind(store.to_string())
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;
            Ok(result.rows_affected() as usize)
        })
    }

    fn set_isbn(&self, title: &str, isbn: Isbn) -> RepositoryResult<Book> {
        let book = self
            .find_book_by_name(title)?
            .ok_or_else(|| DomainError::not_found(format!("book '{title}'")))?;
        self.run(async {
            sqlx::query("UPDATE books SET isbn = ?1 WHERE id = ?2")
                .bind(isbn.as_str())
                .bind(book.id_typed().to_string())
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::storage)?;
            Ok(book.with_isbn(Some(isbn)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> SqliteRepository {
        SqliteRepository::in_memory().expect("in-memory sqlite")
    }

    #[test]
    fn stores_round_trip() {
        let repo = repo();
        let created = repo.create_store("Dom knigi").unwrap();

        let found = repo.find_store_by_name("Dom knigi").unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(repo.list_stores().unwrap(), vec![created]);
        assert!(repo.find_store_by_name("Biblio-Globus").unwrap().is_none());
    }

    #[test]
    fn duplicate_store_name_conflicts() {
        let repo = repo();
        repo.create_store("Dom knigi").unwrap();
        let err = repo.create_store("Dom knigi").unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn publisher_is_created_once() {
        let repo = repo();
        let first = repo.get_or_create_publisher("Ardis").unwrap();
        let second = repo.get_or_create_publisher("Ardis").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stock_updates_are_guarded_and_bulk() {
        let repo = repo();
        let store = repo.create_store("Dom knigi").unwrap();
        let publisher = repo.get_or_create_publisher("Molodaya gvardia").unwrap();
        let book = repo.create_book("Lolita", &publisher).unwrap();
        repo.create_inventory(store.id_typed(), &book, 10).unwrap();

        assert_eq!(repo.bulk_increment_stock(store.id_typed(), "Lolita", 5).unwrap(), 1);
        assert_eq!(repo.bulk_decrement_stock(store.id_typed(), "Lolita", 500).unwrap(), 0);
        assert_eq!(repo.bulk_decrement_stock(store.id_typed(), "Lolita", 15).unwrap(), 1);

        let rows = repo.find_inventory(store.id_typed(), "Lolita").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock, 0);
        assert_eq!(rows[0].sold, 0);
    }

    #[test]
    fn overflowing_increment_leaves_every_row_readable() {
        let repo = repo();
        let store = repo.create_store("Dom knigi").unwrap();
        let publisher = repo.get_or_create_publisher("Molodaya gvardia").unwrap();
        let book = repo.create_book("Pnin", &publisher).unwrap();
        repo.create_inventory(store.id_typed(), &book, 1).unwrap();
        repo.create_inventory(store.id_typed(), &book, u32::MAX).unwrap();

        let err = repo.bulk_increment_stock(store.id_typed(), "Pnin", 1).unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::InvariantViolation(_))));

        let stock: Vec<u32> = repo
            .list_inventory(store.id_typed())
            .unwrap()
            .iter()
            .map(|l| l.stock)
            .collect();
        assert_eq!(stock, [1, u32::MAX]);
    }

    #[test]
    fn list_inventory_joins_names() {
        let repo = repo();
        let store = repo.create_store("Dom knigi").unwrap();
        let publisher = repo.get_or_create_publisher("Molodaya gvardia").unwrap();
        let pnin = repo.create_book("Pnin", &publisher).unwrap();
        let lolita = repo.create_book("Lolita", &publisher).unwrap();
        repo.create_inventory(store.id_typed(), &pnin, 1).unwrap();
        repo.create_inventory(store.id_typed(), &lolita, 10).unwrap();

        let lines = repo.list_inventory(store.id_typed()).unwrap();
        let view: Vec<(&str, &str, u32)> = lines
            .iter()
            .map(|l| (l.store.as_str(), l.title.as_str(), l.stock))
            .collect();
        assert_eq!(view, [("Dom knigi", "Pnin", 1), ("Dom knigi", "Lolita", 10)]);
    }

    #[test]
    fn isbn_is_persisted() {
        let repo = repo();
        let publisher = repo.get_or_create_publisher("Ardis").unwrap();
        repo.create_book("Ada", &publisher).unwrap();

        repo.set_isbn("Ada", Isbn::parse("0070457247").unwrap()).unwrap();
        let book = repo.find_book_by_name("Ada").unwrap().unwrap();
        assert_eq!(book.isbn().map(Isbn::as_str), Some("0070457247"));
    }

    #[test]
    fn inventory_for_unknown_store_violates_foreign_key() {
        let repo = repo();
        let publisher = repo.get_or_create_publisher("Ardis").unwrap();
        let book = repo.create_book("Ada", &publisher).unwrap();

        let err = repo.create_inventory(StoreId::new(), &book, 1).unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(_)));
    }
}
