//! Similarity Scorer
//!
//! score = title_weight * title_similarity + artist_weight * artist_similarity
//!
//! Both similarities are normalized Levenshtein over comparison keys, so the
//! score stays in [0, 1]. An empty requested artist places no constraint and
//! scores 1.0; otherwise an exact match against any credited artist is 1.0,
//! falling back to the best pairwise similarity.

use super::normalizer;
use crate::types::{CatalogCandidate, NormalizedQuery, ScoredCandidate};
use strsim::normalized_levenshtein;
use tuneport_common::ResolverSettings;

#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    title_weight: f64,
    artist_weight: f64,
}

impl SimilarityScorer {
    pub fn new(title_weight: f64, artist_weight: f64) -> Self {
        Self {
            title_weight,
            artist_weight,
        }
    }

    pub fn from_settings(settings: &ResolverSettings) -> Self {
        Self::new(settings.title_weight, settings.artist_weight)
    }

    /// Final weighted score for one candidate
    pub fn score(&self, target: &NormalizedQuery, candidate: &CatalogCandidate) -> f64 {
        let title = title_similarity(target, candidate);
        let artist = artist_similarity(target, candidate);
        (self.title_weight * title + self.artist_weight * artist).clamp(0.0, 1.0)
    }

    /// Score and rank candidates, best first
    ///
    /// The sort is stable: equal scores keep the catalog's order.
    pub fn rank(
        &self,
        target: &NormalizedQuery,
        candidates: Vec<CatalogCandidate>,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| ScoredCandidate {
                score: self.score(target, &candidate),
                candidate,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }
}

pub fn title_similarity(target: &NormalizedQuery, candidate: &CatalogCandidate) -> f64 {
    let candidate_key = normalizer::comparison_key(&normalizer::clean_field(&candidate.title));
    normalized_levenshtein(&target.title_key, &candidate_key)
}

pub fn artist_similarity(target: &NormalizedQuery, candidate: &CatalogCandidate) -> f64 {
    if target.artist_key.is_empty() {
        return 1.0;
    }

    candidate
        .artists
        .iter()
        .map(|artist| normalizer::comparison_key(&normalizer::clean_field(artist)))
        .map(|key| {
            if key == target.artist_key {
                1.0
            } else {
                normalized_levenshtein(&target.artist_key, &key)
            }
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::normalizer::normalize;

    fn candidate(id: &str, title: &str, artists: &[&str]) -> CatalogCandidate {
        CatalogCandidate {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: String::new(),
            duration_ms: 0,
            uri: format!("spotify:track:{}", id),
        }
    }

    #[test]
    fn test_identical_pair_scores_one() {
        let scorer = SimilarityScorer::new(0.7, 0.3);
        let target = normalize("Shape of You", "Ed Sheeran");
        let score = scorer.score(&target, &candidate("1", "Shape Of You", &["Ed Sheeran"]));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decoration_on_candidate_ignored() {
        let target = normalize("Yesterday", "The Beatles");
        let c = candidate("1", "Yesterday (Remastered 2009)", &["The Beatles"]);
        assert!((title_similarity(&target, &c) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_artist_is_unconstrained() {
        let target = normalize("Perfect", "");
        let c = candidate("1", "Perfect", &["Someone Else"]);
        assert_eq!(artist_similarity(&target, &c), 1.0);
    }

    #[test]
    fn test_any_credited_artist_matches() {
        let target = normalize("Uptown Funk", "Bruno Mars");
        let c = candidate("1", "Uptown Funk", &["Mark Ronson", "Bruno Mars"]);
        assert_eq!(artist_similarity(&target, &c), 1.0);
    }

    #[test]
    fn test_best_pairwise_artist_similarity() {
        let target = normalize("Song", "Beyonce");
        let c = candidate("1", "Song", &["Jay-Z", "Beyoncé"]);
        let sim = artist_similarity(&target, &c);
        assert!(sim > 0.8 && sim < 1.0);
    }

    #[test]
    fn test_weights_shift_score() {
        let target = normalize("Hello", "Adele");
        let c = candidate("1", "Hello", &["Lionel Richie"]);
        let title_heavy = SimilarityScorer::new(0.9, 0.1).score(&target, &c);
        let artist_heavy = SimilarityScorer::new(0.1, 0.9).score(&target, &c);
        assert!(title_heavy > artist_heavy);
        assert!((0.0..=1.0).contains(&title_heavy));
        assert!((0.0..=1.0).contains(&artist_heavy));
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let scorer = SimilarityScorer::new(0.7, 0.3);
        let target = normalize("Shape of You", "Ed Sheeran");
        let ranked = scorer.rank(
            &target,
            vec![
                candidate("weak", "Shape", &["Nobody"]),
                candidate("deluxe", "Shape of You", &["Ed Sheeran"]),
                candidate("plain", "Shape of You", &["Ed Sheeran"]),
            ],
        );
        let ids: Vec<&str> = ranked.iter().map(|s| s.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["deluxe", "plain", "weak"]);
    }

    #[test]
    fn test_candidate_without_artists_scores_zero_artist() {
        let target = normalize("Song", "Artist");
        let c = candidate("1", "Song", &[]);
        assert_eq!(artist_similarity(&target, &c), 0.0);
    }
}
