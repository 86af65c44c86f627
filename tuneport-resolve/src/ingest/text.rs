//! Plain-text reader: one `Title - Artist` per line
//!
//! Blank lines and `#` comments are ignored. A first line of the form
//! `# Name` names the playlist.

use super::{expand_row, IngestOptions, Parsed};

pub(super) fn parse(content: &str, options: &IngestOptions) -> Parsed {
    let name = content
        .lines()
        .next()
        .and_then(|first| first.trim().strip_prefix("# "))
        .map(|n| n.trim().to_string());

    let requests = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .skip(options.skip_rows)
        .flat_map(|line| {
            let (title, artist) = split_line(line);
            expand_row(title, artist, None, options)
        })
        .collect();

    Parsed { name, requests }
}

/// "Title - Artist" -> ("Title", "Artist"); no separator -> (line, "")
pub(super) fn split_line(line: &str) -> (&str, &str) {
    match line.split_once(" - ") {
        Some((title, artist)) => (title.trim(), artist.trim()),
        None => (line.trim(), ""),
    }
}
