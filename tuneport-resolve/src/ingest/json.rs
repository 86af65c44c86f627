//! JSON reader
//!
//! Accepted shapes:
//! - `[ {song}, ... ]`
//! - `{ "name": "...", "songs" | "tracks" | "playlist": [ {song}, ... ] }`
//!
//! A song is an object (title under `song_name`/`title`/`name` or the
//! configured title column, artist under `artist`/`artist_name`/`performer`
//! or the configured artist column) or a plain `"Title - Artist"` string.

use super::{expand_row, text, IngestOptions, Parsed};
use crate::error::IngestError;
use serde_json::{Map, Value};

const LIST_KEYS: [&str; 3] = ["songs", "tracks", "playlist"];
const NAME_KEYS: [&str; 3] = ["name", "playlist_name", "title"];
const TITLE_ALIASES: [&str; 3] = ["song_name", "title", "name"];
const ARTIST_ALIASES: [&str; 3] = ["artist", "artist_name", "performer"];

pub(super) fn parse(content: &str, options: &IngestOptions) -> Result<Parsed, IngestError> {
    let root: Value = serde_json::from_str(content).map_err(|e| IngestError::Parse {
        line: e.line(),
        message: e.to_string(),
    })?;

    let (name, entries) = match &root {
        Value::Array(entries) => (None, entries),
        Value::Object(map) => {
            let entries = LIST_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array))
                .ok_or_else(|| IngestError::Parse {
                    line: 1,
                    message: format!("expected an array under one of: {}", LIST_KEYS.join(", ")),
                })?;
            let name = NAME_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string());
            (name, entries)
        }
        _ => {
            return Err(IngestError::Parse {
                line: 1,
                message: "expected a JSON array or object".to_string(),
            })
        }
    };

    let mut requests = Vec::new();
    for (i, entry) in entries.iter().enumerate().skip(options.skip_rows) {
        match entry {
            Value::Object(song) => {
                let title = field(song, &options.title_column, &TITLE_ALIASES);
                let artist = field(song, &options.artist_column, &ARTIST_ALIASES);
                let album = options
                    .album_column
                    .as_deref()
                    .map(|col| field(song, col, &[]));
                requests.extend(expand_row(&title, &artist, album.as_deref(), options));
            }
            Value::String(line) => {
                let (title, artist) = text::split_line(line);
                requests.extend(expand_row(title, artist, None, options));
            }
            other => {
                return Err(IngestError::Parse {
                    line: i + 1,
                    message: format!("entry {} is neither an object nor a string: {}", i + 1, other),
                })
            }
        }
    }

    Ok(Parsed { name, requests })
}

/// First present value among the configured column and its aliases
///
/// Numbers are accepted (titles like "1999" are often unquoted).
fn field(song: &Map<String, Value>, configured: &str, aliases: &[&str]) -> String {
    std::iter::once(configured)
        .chain(aliases.iter().copied())
        .find_map(|key| match song.get(key) {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}
