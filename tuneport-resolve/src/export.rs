//! Playlist export
//!
//! Writes a playlist's tracks in the CSV, spreadsheet and JSON shapes the
//! importer reads, so an exported playlist re-imports unchanged. Plain text
//! is import-only: its `Title - Artist` lines cannot carry a title that
//! itself contains " - ".

use crate::error::IngestError;
use crate::ingest::FileFormat;
use crate::types::CatalogCandidate;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};

const COLUMNS: [&str; 5] = ["song_name", "artist", "album", "duration_ms", "uri"];

/// Render and write `tracks` to `path`, format chosen by extension
pub fn write_playlist(path: &Path, name: &str, tracks: &[CatalogCandidate]) -> Result<(), IngestError> {
    match FileFormat::from_path(path)? {
        FileFormat::Csv => {
            let file = std::fs::File::create(path)?;
            write_csv(file, tracks)?;
        }
        FileFormat::Spreadsheet if is_xlsx(path) => {
            write_xlsx(path, tracks).map_err(|e| IngestError::Spreadsheet(e.to_string()))?
        }
        FileFormat::Json => std::fs::write(path, render_json(name, tracks))?,
        FileFormat::Spreadsheet | FileFormat::Text => {
            return Err(IngestError::UnsupportedFormat(format!(
                "{} (export writes .csv, .xlsx or .json)",
                path.display()
            )))
        }
    }

    tracing::info!(path = %path.display(), tracks = tracks.len(), "Exported playlist");
    Ok(())
}

/// `playlist_<name>.xlsx` in the working directory, with characters other
/// than letters, digits, space, `-` and `_` replaced by `_`
pub fn default_export_path(playlist_name: &str) -> PathBuf {
    let safe: String = playlist_name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    PathBuf::from(format!("playlist_{}.xlsx", safe))
}

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

pub fn write_csv<W: Write>(out: W, tracks: &[CatalogCandidate]) -> Result<(), IngestError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(COLUMNS).map_err(std::io::Error::from)?;
    for t in tracks {
        writer
            .write_record([
                t.title.as_str(),
                t.artist_line().as_str(),
                t.album.as_str(),
                t.duration_ms.to_string().as_str(),
                t.uri.as_str(),
            ])
            .map_err(std::io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, tracks: &[CatalogCandidate]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, heading) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *heading, &bold)?;
    }
    for (i, t) in tracks.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, t.title.as_str())?;
        sheet.write_string(row, 1, t.artist_line())?;
        sheet.write_string(row, 2, t.album.as_str())?;
        sheet.write_number(row, 3, t.duration_ms as f64)?;
        sheet.write_string(row, 4, t.uri.as_str())?;
    }

    workbook.save(path)
}

pub fn render_json(name: &str, tracks: &[CatalogCandidate]) -> String {
    let songs: Vec<_> = tracks
        .iter()
        .map(|t| {
            json!({
                "song_name": t.title,
                "artist": t.artist_line(),
                "album": t.album,
                "duration_ms": t.duration_ms,
                "id": t.id,
                "uri": t.uri,
            })
        })
        .collect();
    let doc = json!({ "name": name, "songs": songs });
    // Value serialization cannot fail
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}
