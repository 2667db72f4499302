//! Batch payloads accepted by the shipment and sale operations.
//!
//! Wire format is a JSON array of objects with capitalised keys:
//!
//! ```json
//! [{"Title": "Pnin", "Publisher": "Molodaya gvardia", "Quantity": 1}]
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line of an incoming shipment.
///
/// `publisher` is only needed when the title is not yet in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShipmentLine {
    pub title: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

impl ShipmentLine {
    pub fn new(title: impl Into<String>, quantity: u32) -> Self {
        Self {
            title: title.into(),
            quantity,
            publisher: None,
        }
    }

    pub fn published_by(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleLine {
    pub title: String,
    pub quantity: u32,
}

impl SaleLine {
    pub fn new(title: impl Into<String>, quantity: u32) -> Self {
        Self {
            title: title.into(),
            quantity,
        }
    }
}

/// A payload could not be decoded. Nothing has been applied when this is returned.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn parse_shipment(json: &str) -> Result<Vec<ShipmentLine>, PayloadError> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_sale(json: &str) -> Result<Vec<SaleLine>, PayloadError> {
    Ok(serde_json::from_str(json)?)
}
