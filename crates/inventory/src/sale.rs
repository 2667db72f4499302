//! Selling books out of a store.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::diagnostics::{DiagnosticSink, LineRejection};
use crate::model::{InventoryLine, Store};
use crate::payload::SaleLine;
use crate::repository::{InventoryRepository, RepositoryResult};

/// Stock per title, taken once before a sale is evaluated.
///
/// If a title appears on several rows the last row wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    stock: HashMap<String, u32>,
}

impl StockSnapshot {
    pub fn from_lines(lines: impl IntoIterator<Item = InventoryLine>) -> Self {
        let stock = lines.into_iter().map(|l| (l.title, l.stock)).collect();
        Self { stock }
    }

    pub fn stock(&self, title: &str) -> Option<u32> {
        self.stock.get(title).copied()
    }
}

/// Outcome of checking one sale line against a [`StockSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleVerdict<'a> {
    Accepted { title: &'a str, quantity: u32 },
    Rejected(LineRejection),
}

/// Check every line against the same snapshot, without IO.
///
/// Lines are not applied to the snapshot as they are accepted: two lines for
/// the same title are each compared with the stock the store had before the
/// sale started.
pub fn plan_sale<'a>(snapshot: &StockSnapshot, lines: &'a [SaleLine]) -> Vec<SaleVerdict<'a>> {
    lines
        .iter()
        .map(|line| match snapshot.stock(&line.title) {
            None => SaleVerdict::Rejected(LineRejection::UnknownTitle {
                title: line.title.clone(),
            }),
            Some(in_stock) if line.quantity > in_stock => {
                SaleVerdict::Rejected(LineRejection::Oversell {
                    title: line.title.clone(),
                    requested: line.quantity,
                    in_stock,
                })
            }
            Some(_) => SaleVerdict::Accepted {
                title: &line.title,
                quantity: line.quantity,
            },
        })
        .collect()
}

impl Store {
    /// Sell books: take the copies of every accepted line out of stock.
    ///
    /// - title never held by this store: skipped, [`LineRejection::UnknownTitle`]
    /// - quantity above the pre-sale stock: skipped in full, [`LineRejection::Oversell`]
    /// - otherwise stock drops by `quantity`
    ///
    /// Selling never creates records and never touches `sold`. An accepted line
    /// that no longer fits the current stock (an earlier line for the same
    /// title already took the copies) is reported as an oversell and left
    /// unapplied.
    pub fn sell_books<R, S>(
        &self,
        repo: &R,
        lines: &[SaleLine],
        sink: &mut S,
    ) -> RepositoryResult<()>
    where
        R: InventoryRepository + ?Sized,
        S: DiagnosticSink + ?Sized,
    {
        let store_id = self.id_typed();
        let snapshot = StockSnapshot::from_lines(repo.list_inventory(store_id)?);

        let mut sold = 0usize;
        let mut skipped = 0usize;
        for verdict in plan_sale(&snapshot, lines) {
            match verdict {
                SaleVerdict::Accepted { title, quantity } => {
                    let rows = repo.bulk_decrement_stock(store_id, title, quantity)?;
                    if rows == 0 {
                        skipped += 1;
                        sink.report(LineRejection::Oversell {
                            title: title.to_string(),
                            requested: quantity,
                            in_stock: snapshot.stock(title).unwrap_or(0),
                        });
                    } else {
                        sold += 1;
                        debug!(title, quantity, rows, "sold");
                    }
                }
                SaleVerdict::Rejected(rejection) => {
                    skipped += 1;
                    sink.report(rejection);
                }
            }
        }

        info!(store = self.name(), sold, skipped, "sale processed");
        Ok(())
    }
}
