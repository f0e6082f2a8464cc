//! Turning an uploaded file into rows ready for enrichment.
//!
//! [`tabular`] decodes the bytes of a CSV or spreadsheet upload into
//! [`RawRow`]s; [`normalize`] trims them and drops blank rows.

pub mod normalize;
pub mod tabular;

use serde_json::{Map, Value};
use thiserror::Error;

pub use normalize::{normalize, NormalizedRow};
pub use tabular::parse;

/// One decoded row: column header to primitive value, in file column order.
pub type RawRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file format '{filename}', expected .csv, .xlsx or .xls")]
    UnsupportedFormat { filename: String },
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),
}
