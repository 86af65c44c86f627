//! Query Normalizer
//!
//! Strips decoration from a raw (title, artist) pair. Rules, in order:
//! 1. Remove bracketed qualifiers: "(Live)", "[Remastered]", "{Demo}", and
//!    their full-width forms "（Live）", "【MV】", "［Remix］"
//! 2. Cut "feat." / "featuring" / "ft." clauses and everything after them
//! 3. Collapse whitespace and trim
//! 4. Lower-case and drop punctuation for the comparison key only
//!
//! Nothing here fails: a missing artist yields empty cleaned fields.

use crate::types::{NormalizedQuery, StrategyTag};
use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}|（[^（）]*）|【[^【】]*】|［[^［］]*］").unwrap()
});

/// Every opening and closing bracket character rule 1 understands
const BRACKET_CHARS: [char; 12] = [
    '(', ')', '[', ']', '{', '}', '（', '）', '【', '】', '［', '］',
];

static FEATURING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s)(?:featuring|feat\.?|ft\.?)(?:\s|$)").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a raw pair into its base form (tagged [`StrategyTag::Exact`])
pub fn normalize(raw_title: &str, raw_artist: &str) -> NormalizedQuery {
    let mut cleaned_title = clean_field(raw_title);
    if cleaned_title.is_empty() && !raw_title.trim().is_empty() {
        // Title was nothing but decoration, e.g. "(Intro)"
        cleaned_title = collapse_whitespace(&raw_title.replace(BRACKET_CHARS, " "));
    }
    let cleaned_artist = clean_field(raw_artist);

    NormalizedQuery {
        title_key: comparison_key(&cleaned_title),
        artist_key: comparison_key(&cleaned_artist),
        cleaned_title,
        cleaned_artist,
        strategy_tag: StrategyTag::Exact,
    }
}

/// Rules 1-3: display form with decoration removed
pub fn clean_field(raw: &str) -> String {
    let mut text = raw.to_string();

    // Nested brackets need several passes, innermost first
    loop {
        let stripped = BRACKETED.replace_all(&text, " ");
        if stripped == text {
            break;
        }
        text = stripped.into_owned();
    }

    if let Some(m) = FEATURING.find(&text) {
        text.truncate(m.start());
    }

    collapse_whitespace(&text)
}

/// Rule 4: lower-cased key with punctuation dropped
///
/// Apostrophes vanish ("Don't" == "Dont"); other punctuation separates words.
pub fn comparison_key(text: &str) -> String {
    let mapped: String = text
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '`'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&mapped).to_lowercase()
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}
