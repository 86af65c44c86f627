//! Playlist mutation collaborator
//!
//! Creates playlists, appends resolved tracks and supplies the
//! [`ExistingTrackSet`] for append mode. Also covers the maintenance
//! commands (remove by position, export).

use crate::error::CatalogError;
use crate::types::{CatalogCandidate, ExistingTrackSet};
use async_trait::async_trait;

/// One playlist entry to remove: the track at a 0-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPosition {
    pub uri: String,
    pub position: usize,
}

/// A playlist owned or followed by the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub track_count: usize,
}

#[async_trait]
pub trait PlaylistWriter: Send + Sync {
    /// Create a playlist for the current user, returning its id
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError>;

    /// Append track uris in order
    async fn append_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError>;

    /// Ids already in the playlist
    async fn existing_track_ids(&self, playlist_id: &str) -> Result<ExistingTrackSet, CatalogError>;

    /// Remove the given entries; each names the track uri it expects at
    /// that position
    async fn remove_positions(
        &self,
        playlist_id: &str,
        entries: &[TrackPosition],
    ) -> Result<(), CatalogError>;

    /// Every track in playlist order
    async fn playlist_tracks(&self, playlist_id: &str)
        -> Result<Vec<CatalogCandidate>, CatalogError>;

    async fn playlist_name(&self, playlist_id: &str) -> Result<String, CatalogError>;

    /// The current user's playlists, in the order the catalog lists them
    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, CatalogError>;
}

/// Interpret a typed playlist choice: a 1-based number, or "q" to quit
/// (`Ok(None)`). Anything else comes back as the trimmed input.
pub fn pick_playlist<'a>(
    input: &str,
    playlists: &'a [PlaylistSummary],
) -> Result<Option<&'a PlaylistSummary>, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=playlists.len()).contains(&n) => Ok(Some(&playlists[n - 1])),
        _ => Err(input.to_string()),
    }
}

/// Pair 0-based positions with the uris currently at them
pub fn positions_to_remove(tracks: &[CatalogCandidate], positions: &[usize]) -> Vec<TrackPosition> {
    positions
        .iter()
        .filter_map(|&p| {
            tracks.get(p).map(|t| TrackPosition {
                uri: t.uri.clone(),
                position: p,
            })
        })
        .collect()
}

/// Convert 1-based positions typed by a user into sorted, unique 0-based ones
///
/// Positions outside `1..=len` are reported back rather than silently dropped.
pub fn to_zero_based(positions: &[usize], len: usize) -> Result<Vec<usize>, Vec<usize>> {
    let invalid: Vec<usize> = positions
        .iter()
        .copied()
        .filter(|p| *p == 0 || *p > len)
        .collect();
    if !invalid.is_empty() {
        return Err(invalid);
    }

    let mut zero_based: Vec<usize> = positions.iter().map(|p| p - 1).collect();
    zero_based.sort_unstable();
    zero_based.dedup();
    Ok(zero_based)
}
