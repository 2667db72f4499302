//! Bookstore inventory domain.
//!
//! Publishers produce books, stores hold inventory of books, and two batch
//! operations on [`Store`] mutate that inventory: [`Store::receive_shipment`]
//! and [`Store::sell_books`]. Storage is reached through the
//! [`InventoryRepository`] port; per-line problems go to a [`DiagnosticSink`].
//!
//! Neither operation is safe against concurrent callers on the same store:
//! each line is a read followed by a separate write.

pub mod diagnostics;
pub mod model;
pub mod payload;
pub mod repository;
pub mod sale;
pub mod shipment;

pub use diagnostics::{DiagnosticSink, LineRejection, TracingSink};
pub use model::{
    Book, Inventory, InventoryLine, InventorySummary, Isbn, Publisher, Store, validate_name,
};
pub use payload::{PayloadError, SaleLine, ShipmentLine, parse_sale, parse_shipment};
pub use repository::{InventoryRepository, RepositoryError, RepositoryResult};
pub use sale::{SaleVerdict, StockSnapshot, plan_sale};
