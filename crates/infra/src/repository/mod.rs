//! Storage adapters for the bookstore repository port.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
