//! Receiving shipments into a store.

use tracing::{debug, info};

use crate::diagnostics::{DiagnosticSink, LineRejection};
use crate::model::{Book, Store, validate_name};
use crate::payload::ShipmentLine;
use crate::repository::{InventoryRepository, RepositoryResult};

impl Store {
    /// Receive a shipment: add the copies of every line to this store's stock.
    ///
    /// Per line, in order:
    /// - title already held by the store: stock of every matching row grows by `quantity`
    /// - title in the catalog but not held: a new inventory row starts at `quantity`
    /// - title unknown, publisher given: publisher (get-or-create) and book are
    ///   created, then the inventory row
    /// - title unknown, no publisher: line skipped, [`LineRejection::MissingPublisher`]
    /// - restock past `u32::MAX`, or an invalid new name: line skipped,
    ///   [`LineRejection::InvalidLine`]
    ///
    /// Skipped lines never abort the batch. Only a storage failure does.
    /// Receiving is additive: the same payload applied twice doubles the stock.
    pub fn receive_shipment<R, S>(
        &self,
        repo: &R,
        lines: &[ShipmentLine],
        sink: &mut S,
    ) -> RepositoryResult<()>
    where
        R: InventoryRepository + ?Sized,
        S: DiagnosticSink + ?Sized,
    {
        let mut skipped = 0usize;
        for line in lines {
            if let Some(rejection) = self.receive_line(repo, line)? {
                skipped += 1;
                sink.report(rejection);
            }
        }

        info!(
            store = self.name(),
            lines = lines.len(),
            skipped,
            "shipment received"
        );
        Ok(())
    }

    fn receive_line<R>(
        &self,
        repo: &R,
        line: &ShipmentLine,
    ) -> RepositoryResult<Option<LineRejection>>
    where
        R: InventoryRepository + ?Sized,
    {
        let store_id = self.id_typed();

        let held = repo.find_inventory(store_id, &line.title)?;
        if !held.is_empty() {
            if held.iter().any(|row| row.stock.checked_add(line.quantity).is_none()) {
                return Ok(Some(LineRejection::InvalidLine {
                    title: line.title.clone(),
                    reason: "stock would overflow".to_string(),
                }));
            }
            let rows = repo.bulk_increment_stock(store_id, &line.title, line.quantity)?;
            debug!(title = %line.title, quantity = line.quantity, rows, "restocked");
            return Ok(None);
        }

        let book = match repo.find_book_by_name(&line.title)? {
            Some(book) => book,
            None => match self.catalog_new_title(repo, line)? {
                Ok(book) => book,
                Err(rejection) => return Ok(Some(rejection)),
            },
        };

        repo.create_inventory(store_id, &book, line.quantity)?;
        debug!(title = %line.title, quantity = line.quantity, "new title stocked");
        Ok(None)
    }

    /// Create publisher (if needed) and book for a title the catalog has never seen.
    fn catalog_new_title<R>(
        &self,
        repo: &R,
        line: &ShipmentLine,
    ) -> RepositoryResult<Result<Book, LineRejection>>
    where
        R: InventoryRepository + ?Sized,
    {
        let Some(publisher_name) = line.publisher.as_deref() else {
            return Ok(Err(LineRejection::MissingPublisher {
                title: line.title.clone(),
            }));
        };

        // Validate both names before writing anything, so a bad title never
        // leaves an orphan publisher behind.
        let valid = validate_name("book name", &line.title)
            .and_then(|_| validate_name("publisher name", publisher_name));
        if let Err(err) = valid {
            return Ok(Err(LineRejection::InvalidLine {
                title: line.title.clone(),
                reason: err.to_string(),
            }));
        }

        let publisher = repo.get_or_create_publisher(publisher_name)?;
        let book = repo.create_book(&line.title, &publisher)?;
        debug!(title = %line.title, publisher = publisher.name(), "book catalogued");
        Ok(Ok(book))
    }
}
