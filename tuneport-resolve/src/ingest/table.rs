//! Header-row tables shared by the CSV and spreadsheet readers
//!
//! The first non-blank row names the columns; lookup is case-insensitive
//! and ignores surrounding whitespace. Blank rows are dropped before
//! `skip_rows` is applied.

use super::{expand_row, IngestOptions, Parsed};
use crate::error::IngestError;

/// One source row and the 1-based line (or sheet row) it came from
pub(super) struct Row {
    pub line: usize,
    pub cells: Vec<String>,
}

impl Row {
    fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

pub(super) fn parse_rows<I>(rows: I, source: &str, options: &IngestOptions) -> Result<Parsed, IngestError>
where
    I: IntoIterator<Item = Row>,
{
    let mut rows = rows.into_iter().filter(|r| !r.is_blank());

    let header = rows
        .next()
        .ok_or_else(|| IngestError::Empty(format!("{} has no header row", source)))?;
    let columns: Vec<String> = header.cells.iter().map(|h| h.trim().to_lowercase()).collect();
    let find = |name: &str| columns.iter().position(|c| *c == name.trim().to_lowercase());

    let title_idx = find(&options.title_column)
        .ok_or_else(|| IngestError::MissingColumn(options.title_column.clone()))?;
    let artist_idx = find(&options.artist_column)
        .ok_or_else(|| IngestError::MissingColumn(options.artist_column.clone()))?;
    let album_idx = options.album_column.as_deref().and_then(find);

    let requests = rows
        .skip(options.skip_rows)
        .flat_map(|r| {
            tracing::trace!(source, line = r.line, "Table row");
            expand_row(
                r.cell(title_idx),
                r.cell(artist_idx),
                album_idx.map(|i| r.cell(i)),
                options,
            )
        })
        .collect();

    Ok(Parsed {
        name: None,
        requests,
    })
}
