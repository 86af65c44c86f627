//! Playlist file ingestion
//!
//! Reads a playlist file into ordered [`SongRequest`]s plus a playlist name.
//! The format is picked by extension:
//! - `.csv`: header row, quoted fields
//! - `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods`: first worksheet, header row
//! - `.json`: array of song objects, or an object wrapping one
//! - `.txt` / `.text`: one `Title - Artist` per line
//!
//! CSV and spreadsheets share the same column mapping.

mod csv;
mod json;
mod spreadsheet;
mod table;
mod text;

use crate::error::IngestError;
use crate::types::SongRequest;
use std::path::Path;

/// Column mapping and row handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub title_column: String,
    pub artist_column: String,
    /// Optional column; absent columns are ignored
    pub album_column: Option<String>,
    /// Data rows to skip before reading songs
    pub skip_rows: usize,
    /// Splits one title cell into several songs sharing the row's artist
    pub song_separator: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            title_column: "song_name".to_string(),
            artist_column: "artist".to_string(),
            album_column: Some("album".to_string()),
            skip_rows: 0,
            song_separator: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
    Json,
    Text,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "txt" | "text" => Ok(FileFormat::Text),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileFormat::Spreadsheet),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Requests read from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedPlaylist {
    pub name: String,
    pub requests: Vec<SongRequest>,
}

/// What a format parser found before defaults are applied
#[derive(Debug)]
struct Parsed {
    name: Option<String>,
    requests: Vec<SongRequest>,
}

/// Read and parse a playlist file
pub fn read_playlist(path: &Path, options: &IngestOptions) -> Result<IngestedPlaylist, IngestError> {
    let format = FileFormat::from_path(path)?;

    let parsed = if format == FileFormat::Spreadsheet {
        spreadsheet::parse(path, options)?
    } else {
        let content = std::fs::read_to_string(path)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        match format {
            FileFormat::Csv => csv::parse(content, options)?,
            FileFormat::Json => json::parse(content, options)?,
            _ => text::parse(content, options),
        }
    };

    if parsed.requests.is_empty() {
        return Err(IngestError::Empty(path.display().to_string()));
    }

    let name = parsed
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| default_playlist_name(path));

    tracing::info!(
        path = %path.display(),
        format = ?format,
        songs = parsed.requests.len(),
        playlist = %name,
        "Read playlist file"
    );

    Ok(IngestedPlaylist {
        name,
        requests: parsed.requests,
    })
}

/// File stem, e.g. "road_trip" for `road_trip.csv`
pub fn default_playlist_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Imported playlist".to_string())
}

/// Turn one source row into requests, applying the song separator
///
/// An empty title still yields one request so the run reports it.
fn expand_row(title: &str, artist: &str, album: Option<&str>, options: &IngestOptions) -> Vec<SongRequest> {
    let artist = artist.trim();
    let album = album.map(str::trim).filter(|a| !a.is_empty());

    let titles: Vec<&str> = match options.song_separator.as_deref() {
        Some(sep) if !sep.is_empty() => title
            .split(sep)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect(),
        _ => vec![title.trim()],
    };
    let titles = if titles.is_empty() { vec![""] } else { titles };

    titles
        .into_iter()
        .map(|t| {
            let request = SongRequest::new(t, artist);
            match album {
                Some(album) => request.with_album(album),
                None => request,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_by_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("a.json")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a.text")).unwrap(), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("a.XLSX")).unwrap(), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_path(Path::new("a.ods")).unwrap(), FileFormat::Spreadsheet);
        assert!(FileFormat::from_path(Path::new("a.mp3")).is_err());
        assert!(FileFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_separator_splits_title_cell() {
        let options = IngestOptions {
            song_separator: Some("/".to_string()),
            ..IngestOptions::default()
        };
        let requests = expand_row("Perfect / Shape of You", "Ed Sheeran", None, &options);
        assert_eq!(
            requests,
            vec![
                SongRequest::new("Perfect", "Ed Sheeran"),
                SongRequest::new("Shape of You", "Ed Sheeran"),
            ]
        );
    }

    #[test]
    fn test_empty_title_still_emitted() {
        let requests = expand_row("  ", "Artist", Some(""), &IngestOptions::default());
        assert_eq!(requests, vec![SongRequest::new("", "Artist")]);
    }

    #[test]
    fn test_default_name_is_file_stem() {
        assert_eq!(default_playlist_name(&PathBuf::from("/x/road_trip.csv")), "road_trip");
    }
}
