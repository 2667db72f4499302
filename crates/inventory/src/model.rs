use serde::{Deserialize, Serialize};

use knigi_core::{
    BookId, DomainError, DomainResult, Entity, InventoryId, PublisherId, StoreId, ValueObject,
};

/// Upper bound on publisher, book and store names (in characters).
pub const NAME_MAX_LEN: usize = 250;

/// Upper bound on an ISBN (in characters).
pub const ISBN_MAX_LEN: usize = 13;

/// Validate a human-facing name: non-blank, at most [`NAME_MAX_LEN`] characters.
///
/// `field` only flavours the error message ("book name", "publisher name", ...).
pub fn validate_name(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// ISBN of a book. Free-form, bounded to [`ISBN_MAX_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("isbn cannot be empty"));
        }
        if trimmed.chars().count() > ISBN_MAX_LEN {
            return Err(DomainError::validation(format!(
                "isbn cannot exceed {ISBN_MAX_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Isbn {}

impl TryFrom<String> for Isbn {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Isbn> for String {
    fn from(value: Isbn) -> Self {
        value.0
    }
}

impl core::fmt::Display for Isbn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A publisher. Many books reference one publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    id: PublisherId,
    name: String,
}

impl Publisher {
    pub fn new(id: PublisherId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        validate_name("publisher name", &name)?;
        Ok(Self { id, name })
    }

    pub fn id_typed(&self) -> PublisherId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Publisher {
    type Id = PublisherId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A book in the shared catalog.
///
/// The name is the lookup key used by shipments and sales, but it is not
/// unique: two books may share a name, in which case lookups resolve to the
/// oldest one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    id: BookId,
    name: String,
    isbn: Option<Isbn>,
    publisher_id: PublisherId,
}

impl Book {
    pub fn new(
        id: BookId,
        name: impl Into<String>,
        publisher_id: PublisherId,
    ) -> DomainResult<Self> {
        let name = name.into();
        validate_name("book name", &name)?;
        Ok(Self {
            id,
            name,
            isbn: None,
            publisher_id,
        })
    }

    pub fn with_isbn(mut self, isbn: Option<Isbn>) -> Self {
        self.isbn = isbn;
        self
    }

    pub fn id_typed(&self) -> BookId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn isbn(&self) -> Option<&Isbn> {
        self.isbn.as_ref()
    }

    pub fn publisher_id(&self) -> PublisherId {
        self.publisher_id
    }
}

impl Entity for Book {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A bookstore. Holds inventory of books through [`Inventory`] rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    id: StoreId,
    name: String,
}

impl Store {
    pub fn new(id: StoreId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        validate_name("store name", &name)?;
        Ok(Self { id, name })
    }

    pub fn id_typed(&self) -> StoreId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Join row: one book held by one store.
///
/// `sold` is carried for completeness but no operation writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: InventoryId,
    pub book_id: BookId,
    pub store_id: StoreId,
    pub stock: u32,
    pub sold: u32,
}

impl Inventory {
    pub fn new(id: InventoryId, book_id: BookId, store_id: StoreId, stock: u32) -> Self {
        Self {
            id,
            book_id,
            store_id,
            stock,
            sold: 0,
        }
    }
}

impl Entity for Inventory {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Queryable view of an inventory row, joined with store and book names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLine {
    pub inventory_id: InventoryId,
    pub store: String,
    pub title: String,
    pub stock: u32,
    pub sold: u32,
}

impl core::fmt::Display for InventoryLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Store {}\nBook {}\nSold {}\nStock {}",
            self.store, self.title, self.sold, self.stock
        )
    }
}

/// Aggregate figures over a store's inventory.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    /// Number of distinct titles held (any stock, including zero).
    pub titles: usize,
    /// Sum of `stock` over all rows.
    pub total_stock: u64,
}

impl InventorySummary {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a InventoryLine>) -> Self {
        let mut titles = std::collections::HashSet::new();
        let mut total_stock = 0u64;
        for line in lines {
            titles.insert(line.title.as_str());
            total_stock += u64::from(line.stock);
        }
        Self {
            titles: titles.len(),
            total_stock,
        }
    }
}
