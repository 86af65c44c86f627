//! Spreadsheet reader (xlsx, xlsm, xlsb, xls, ods)
//!
//! Reads the first worksheet as a header-row table. Numbers holding whole
//! values are written without a fractional part, so a title cell `1999`
//! stays "1999" rather than "1999.0".

use super::table::{self, Row};
use super::{IngestOptions, Parsed};
use crate::error::IngestError;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Largest float that still converts to an integer exactly
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

pub(super) fn parse(path: &Path, options: &IngestOptions) -> Result<Parsed, IngestError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::Empty(format!("{} has no worksheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| IngestError::Spreadsheet(format!("sheet {}: {}", sheet, e)))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let rows: Vec<Row> = range
        .rows()
        .enumerate()
        .map(|(i, cells)| Row {
            line: first_row + i + 1,
            cells: cells.iter().map(cell_text).collect(),
        })
        .collect();

    tracing::debug!(path = %path.display(), sheet = %sheet, rows = rows.len(), "Read worksheet");
    table::parse_rows(rows, &sheet, options)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
