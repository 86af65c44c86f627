//! CSV reader
//!
//! Header row required. Quoting follows RFC 4180 via the `csv` crate:
//! quoted fields can hold commas, newlines and doubled quotes (`""`).
//! Rows may be shorter or longer than the header.

use super::table::{self, Row};
use super::{IngestOptions, Parsed};
use crate::error::IngestError;
use ::csv::ReaderBuilder;

pub(super) fn parse(content: &str, options: &IngestOptions) -> Result<Parsed, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::Parse {
            line: e.position().map(|p| p.line() as usize).unwrap_or(0),
            message: e.to_string(),
        })?;
        rows.push(Row {
            line: record.position().map(|p| p.line() as usize).unwrap_or(0),
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    table::parse_rows(rows, "CSV", options)
}
