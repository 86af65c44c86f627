//! Data model shared by the engine, the batch driver and the collaborators

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One human-supplied song to resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRequest {
    pub title: String,
    /// May be empty
    pub artist: String,
    pub album: Option<String>,
}

impl SongRequest {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// A request without a usable title is never sent to the catalog
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

impl fmt::Display for SongRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artist.trim().is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} - {}", self.title, self.artist)
        }
    }
}

/// Query formulation, in the order the sequencer tries them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    Exact,
    TitleOnly,
    Keyword,
    TokenSwap,
    BroadFuzzy,
}

impl StrategyTag {
    /// All strategies in priority order
    pub const ALL: [StrategyTag; 5] = [
        StrategyTag::Exact,
        StrategyTag::TitleOnly,
        StrategyTag::Keyword,
        StrategyTag::TokenSwap,
        StrategyTag::BroadFuzzy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::Exact => "exact",
            StrategyTag::TitleOnly => "title-only",
            StrategyTag::Keyword => "keyword",
            StrategyTag::TokenSwap => "token-swap",
            StrategyTag::BroadFuzzy => "broad-fuzzy",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleaned (title, artist) pair
///
/// `cleaned_*` keep the original casing for display and query text;
/// `*_key` are the lower-cased, punctuation-free forms used for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub cleaned_title: String,
    pub cleaned_artist: String,
    pub title_key: String,
    pub artist_key: String,
    pub strategy_tag: StrategyTag,
}

impl NormalizedQuery {
    pub fn with_strategy(mut self, tag: StrategyTag) -> Self {
        self.strategy_tag = tag;
        self
    }

    pub fn has_artist(&self) -> bool {
        !self.cleaned_artist.is_empty()
    }

    /// False when nothing searchable is left of the title ("()", `""`)
    pub fn has_title(&self) -> bool {
        !self.cleaned_title.replace('"', "").trim().is_empty()
    }
}

/// One catalog search the engine will issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub strategy: StrategyTag,
    pub text: String,
    pub field_qualified: bool,
    pub limit: u32,
    /// Pair the scorer compares candidates against
    pub target: NormalizedQuery,
}

impl SearchQuery {
    pub fn key(&self) -> QueryKey {
        QueryKey {
            text: self.text.clone(),
            field_qualified: self.field_qualified,
            limit: self.limit,
        }
    }
}

/// Identity of a catalog search: two queries with the same key return the
/// same candidates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub text: String,
    pub field_qualified: bool,
    pub limit: u32,
}

/// Catalog track as returned by the search collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub duration_ms: u64,
    pub uri: String,
}

impl CatalogCandidate {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Candidate with its similarity to the requested pair, in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: CatalogCandidate,
    pub score: f64,
}

/// Why a request ended without a playlist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    UserSkip,
    Duplicate,
    Cancelled,
    InvalidInput,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UserSkip => "user-skip",
            SkipReason::Duplicate => "duplicate",
            SkipReason::Cancelled => "cancelled",
            SkipReason::InvalidInput => "invalid-input",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome for one request
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Matched {
        candidate: CatalogCandidate,
        strategy: StrategyTag,
        score: f64,
    },
    Skipped(SkipReason),
    Unresolved,
}

impl ResolutionResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, ResolutionResult::Matched { .. })
    }

    pub fn matched_candidate(&self) -> Option<&CatalogCandidate> {
        match self {
            ResolutionResult::Matched { candidate, .. } => Some(candidate),
            _ => None,
        }
    }

    /// Short label for logs and events: "matched", "skipped:<reason>", "unresolved"
    pub fn outcome_label(&self) -> String {
        match self {
            ResolutionResult::Matched { .. } => "matched".to_string(),
            ResolutionResult::Skipped(reason) => format!("skipped:{}", reason),
            ResolutionResult::Unresolved => "unresolved".to_string(),
        }
    }
}

/// Catalog ids already present in the target playlist
///
/// Supplied by the caller in append mode; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingTrackSet {
    ids: HashSet<String>,
}

impl ExistingTrackSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExistingTrackSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
