//! Strategy Sequencer
//!
//! Turns one normalized request into the ordered list of catalog searches
//! the engine will try. Order is fixed: exact, title-only, keyword,
//! token-swap, broad fuzzy. A query whose identity (text, field syntax,
//! limit) was already planned is dropped, so the catalog never sees the same
//! search twice for one request.

use super::normalizer;
use crate::types::{NormalizedQuery, QueryKey, SearchQuery, StrategyTag};
use std::collections::HashSet;
use tuneport_common::ResolverSettings;

/// Separators that suggest "Artist - Title" crammed into the title field,
/// in the order they are tried
const SWAP_SEPARATORS: [&str; 5] = [" - ", " \u{2013} ", " \u{2014} ", " | ", ": "];

#[derive(Debug, Clone)]
pub struct StrategySequencer {
    search_limit: u32,
    broad_limit: u32,
}

impl StrategySequencer {
    pub fn new(search_limit: u32, broad_limit: u32) -> Self {
        Self {
            search_limit,
            broad_limit,
        }
    }

    pub fn from_settings(settings: &ResolverSettings) -> Self {
        Self::new(settings.search_limit, settings.broad_limit)
    }

    /// Plan every applicable strategy for `base`, in priority order
    pub fn plan(&self, base: &NormalizedQuery) -> Vec<SearchQuery> {
        let mut seen: HashSet<QueryKey> = HashSet::new();
        let mut plan = Vec::with_capacity(StrategyTag::ALL.len());

        for tag in StrategyTag::ALL {
            let Some(query) = self.formulate(tag, base) else {
                tracing::trace!(strategy = %tag, "Strategy not applicable");
                continue;
            };
            if seen.insert(query.key()) {
                plan.push(query);
            } else {
                tracing::trace!(strategy = %tag, query = %query.text, "Duplicate query dropped");
            }
        }

        plan
    }

    fn formulate(&self, tag: StrategyTag, base: &NormalizedQuery) -> Option<SearchQuery> {
        let target = base.clone().with_strategy(tag);
        let query = match tag {
            StrategyTag::Exact => SearchQuery {
                strategy: tag,
                text: field_query(&base.cleaned_title, &base.cleaned_artist),
                field_qualified: true,
                limit: self.search_limit,
                target,
            },
            StrategyTag::TitleOnly => SearchQuery {
                strategy: tag,
                text: field_query(&base.cleaned_title, ""),
                field_qualified: true,
                limit: self.search_limit,
                target,
            },
            StrategyTag::Keyword => SearchQuery {
                strategy: tag,
                text: keywords(&[&base.cleaned_title, &base.cleaned_artist]),
                field_qualified: false,
                limit: self.search_limit,
                target,
            },
            StrategyTag::TokenSwap => {
                let (title, artist) = swap_pair(base)?;
                let swapped = normalizer::normalize(&title, &artist).with_strategy(tag);
                SearchQuery {
                    strategy: tag,
                    text: field_query(&swapped.cleaned_title, &swapped.cleaned_artist),
                    field_qualified: true,
                    limit: self.search_limit,
                    target: swapped,
                }
            }
            StrategyTag::BroadFuzzy => SearchQuery {
                strategy: tag,
                text: keywords(&[&base.cleaned_title]),
                field_qualified: false,
                limit: self.broad_limit,
                target,
            },
        };

        if query.text.is_empty() {
            return None;
        }
        Some(query)
    }
}

/// Halves for the token-swap strategy as (title, artist)
///
/// "Adele - Hello" in the title field becomes ("Hello", "Adele"). Without a
/// separator but with an artist, the two columns are swapped instead.
fn swap_pair(base: &NormalizedQuery) -> Option<(String, String)> {
    for sep in SWAP_SEPARATORS {
        if let Some((left, right)) = base.cleaned_title.split_once(sep) {
            let (left, right) = (left.trim(), right.trim());
            if !left.is_empty() && !right.is_empty() {
                return Some((right.to_string(), left.to_string()));
            }
        }
    }

    if base.has_artist() {
        return Some((base.cleaned_artist.clone(), base.cleaned_title.clone()));
    }

    None
}

/// `track:"…" artist:"…"` (artist clause omitted when empty)
fn field_query(title: &str, artist: &str) -> String {
    let title = strip_quotes(title);
    if title.is_empty() {
        return String::new();
    }
    let artist = strip_quotes(artist);
    if artist.is_empty() {
        format!("track:\"{}\"", title)
    } else {
        format!("track:\"{}\" artist:\"{}\"", title, artist)
    }
}

fn keywords(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| strip_quotes(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_quotes(text: &str) -> String {
    text.replace('"', "").trim().to_string()
}
