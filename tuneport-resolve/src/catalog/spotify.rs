//! Spotify Web API client
//!
//! Implements [`CatalogSearch`] and [`PlaylistWriter`] over the Web API with a
//! bearer token obtained elsewhere. Every request waits on a client-side
//! token bucket first (`catalog.requests_per_second`).
//!
//! HTTP status mapping:
//! - 401/403 -> `Auth`
//! - 429 -> `RateLimited` (Retry-After seconds, default 1s)
//! - 400 -> `Rejected`
//! - 5xx, timeouts, connection failures -> `Transient`
//! - undecodable bodies -> `Parse`

use crate::catalog::CatalogSearch;
use crate::error::CatalogError;
use crate::playlist::{PlaylistSummary, PlaylistWriter, TrackPosition};
use crate::types::{CatalogCandidate, ExistingTrackSet};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::OnceCell;
use tuneport_common::config::{get_user_agent, CatalogConfig};

/// Spotify caps playlist item writes at 100 per request
const MAX_TRACKS_PER_REQUEST: usize = 100;

/// Spotify caps search and playlist page sizes at 50 / 100
const MAX_SEARCH_LIMIT: u32 = 50;
const PLAYLIST_PAGE_SIZE: u32 = 100;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Page<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    album: Option<AlbumObject>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    uri: String,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    /// Null for tracks that were removed from the catalog
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct PlaylistMeta {
    name: String,
    snapshot_id: String,
}

#[derive(Debug, Deserialize)]
struct SimplifiedPlaylist {
    id: String,
    name: String,
    tracks: Option<TrackCount>,
}

#[derive(Debug, Deserialize)]
struct TrackCount {
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

impl TrackObject {
    /// Local-only or relinked tracks may come back without an id
    fn into_candidate(self) -> Option<CatalogCandidate> {
        let id = self.id?;
        Some(CatalogCandidate {
            id,
            title: self.name,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
            album: self.album.map(|a| a.name).unwrap_or_default(),
            duration_ms: self.duration_ms,
            uri: self.uri,
        })
    }
}

pub struct SpotifyClient {
    http: Client,
    base_url: String,
    token: String,
    market: Option<String>,
    rate_limiter: DirectLimiter,
    user_id: OnceCell<String>,
}

impl SpotifyClient {
    /// Build a client from the `[catalog]` config section and a resolved token
    pub fn new(config: &CatalogConfig, token: String) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .user_agent(get_user_agent())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::Transient(format!("HTTP client init failed: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            market: config.market.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            user_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, CatalogError> {
        self.rate_limiter.until_ready().await;

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, retry_after.as_deref(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CatalogError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn current_user_id(&self) -> Result<String, CatalogError> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                let profile: UserProfile = self.send_json(self.http.get(self.url("/me"))).await?;
                tracing::debug!(user_id = %profile.id, "Resolved current catalog user");
                Ok::<_, CatalogError>(profile.id)
            })
            .await?;
        Ok(id.clone())
    }

    async fn playlist_meta(&self, playlist_id: &str) -> Result<PlaylistMeta, CatalogError> {
        let request = self
            .http
            .get(self.url(&format!("/playlists/{}", playlist_id)))
            .query(&[("fields", "name,snapshot_id")]);
        self.send_json(request).await
    }
}

#[async_trait]
impl CatalogSearch for SpotifyClient {
    async fn search(
        &self,
        query: &str,
        field_qualified: bool,
        limit: u32,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let mut params = vec![("q", query), ("type", "track"), ("limit", limit.as_str())];
        if let Some(market) = &self.market {
            params.push(("market", market.as_str()));
        }

        tracing::debug!(query = %query, field_qualified, limit = %limit, "Catalog search");

        let request = self.http.get(self.url("/search")).query(&params);
        let response: SearchResponse = self.send_json(request).await?;

        Ok(response
            .tracks
            .items
            .into_iter()
            .filter_map(TrackObject::into_candidate)
            .collect())
    }
}

#[async_trait]
impl PlaylistWriter for SpotifyClient {
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError> {
        let user_id = self.current_user_id().await?;
        let request = self
            .http
            .post(self.url(&format!("/users/{}/playlists", user_id)))
            .json(&json!({
                "name": name,
                "description": description,
                "public": public,
            }));
        let created: CreatedPlaylist = self.send_json(request).await?;

        tracing::info!(playlist_id = %created.id, name = %name, "Created playlist");
        Ok(created.id)
    }

    async fn append_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError> {
        for (i, chunk) in uris.chunks(MAX_TRACKS_PER_REQUEST).enumerate() {
            let request = self
                .http
                .post(self.url(&format!("/playlists/{}/tracks", playlist_id)))
                .json(&json!({ "uris": chunk }));
            self.send(request).await?;
            tracing::debug!(
                playlist_id = %playlist_id,
                chunk = i,
                tracks = chunk.len(),
                "Appended tracks"
            );
        }
        Ok(())
    }

    async fn existing_track_ids(&self, playlist_id: &str) -> Result<ExistingTrackSet, CatalogError> {
        let tracks = self.playlist_tracks(playlist_id).await?;
        Ok(tracks.into_iter().map(|t| t.id).collect())
    }

    async fn remove_positions(
        &self,
        playlist_id: &str,
        entries: &[TrackPosition],
    ) -> Result<(), CatalogError> {
        if entries.is_empty() {
            return Ok(());
        }
        let meta = self.playlist_meta(playlist_id).await?;
        let request = self
            .http
            .delete(self.url(&format!("/playlists/{}/tracks", playlist_id)))
            .json(&removal_body(entries, &meta.snapshot_id));
        self.send(request).await?;

        tracing::info!(playlist_id = %playlist_id, removed = entries.len(), "Removed tracks");
        Ok(())
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let mut tracks = Vec::new();
        let mut request = self
            .http
            .get(self.url(&format!("/playlists/{}/tracks", playlist_id)))
            .query(&[("limit", PLAYLIST_PAGE_SIZE.to_string())]);

        loop {
            let page: Page<PlaylistItem> = self.send_json(request).await?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track.and_then(TrackObject::into_candidate)),
            );
            match page.next {
                Some(next) => request = self.http.get(next),
                None => break,
            }
        }

        Ok(tracks)
    }

    async fn playlist_name(&self, playlist_id: &str) -> Result<String, CatalogError> {
        Ok(self.playlist_meta(playlist_id).await?.name)
    }

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, CatalogError> {
        let mut playlists = Vec::new();
        let mut request = self
            .http
            .get(self.url("/me/playlists"))
            .query(&[("limit", MAX_SEARCH_LIMIT.to_string())]);

        loop {
            let page: Page<Option<SimplifiedPlaylist>> = self.send_json(request).await?;
            playlists.extend(page.items.into_iter().flatten().map(SimplifiedPlaylist::into_summary));
            match page.next {
                Some(next) => request = self.http.get(next),
                None => break,
            }
        }

        tracing::debug!(count = playlists.len(), "Listed user playlists");
        Ok(playlists)
    }
}

impl SimplifiedPlaylist {
    fn into_summary(self) -> PlaylistSummary {
        PlaylistSummary {
            id: self.id,
            name: self.name,
            track_count: self.tracks.map(|t| t.total).unwrap_or(0),
        }
    }
}

/// `{"tracks": [{"uri", "positions": [p]}], "snapshot_id"}`
fn removal_body(entries: &[TrackPosition], snapshot_id: &str) -> serde_json::Value {
    let tracks: Vec<_> = entries
        .iter()
        .map(|e| json!({ "uri": e.uri, "positions": [e.position] }))
        .collect();
    json!({ "tracks": tracks, "snapshot_id": snapshot_id })
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Transient(format!("request timed out: {}", err))
    } else if err.is_connect() {
        CatalogError::Transient(format!("connection failed: {}", err))
    } else {
        CatalogError::Transient(err.to_string())
    }
}

/// Map a non-success status to the collaborator error kinds
fn status_error(status: StatusCode, retry_after: Option<&str>, body: &str) -> CatalogError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CatalogError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited {
            retry_after: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER),
        },
        StatusCode::BAD_REQUEST => CatalogError::Rejected(detail),
        _ => CatalogError::Transient(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses() {
        assert!(status_error(StatusCode::UNAUTHORIZED, None, "").is_auth());
        assert!(status_error(StatusCode::FORBIDDEN, None, "").is_auth());
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some("4"), ""),
            CatalogError::RateLimited {
                retry_after: Duration::from_secs(4)
            }
        );
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some("soon"), ""),
            CatalogError::RateLimited {
                retry_after: DEFAULT_RETRY_AFTER
            }
        );
    }

    #[test]
    fn test_bad_request_is_rejected_not_retried() {
        let err = status_error(StatusCode::BAD_REQUEST, None, "bad query");
        assert!(matches!(err, CatalogError::Rejected(ref m) if m.contains("bad query")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_transient() {
        for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE] {
            assert!(matches!(status_error(status, None, ""), CatalogError::Transient(_)));
        }
    }

    #[test]
    fn test_search_response_decodes_and_skips_idless_tracks() {
        let body = r#"{
            "tracks": {
                "items": [
                    {
                        "id": "7qiZfU4dY1lWllzX7mPBI3",
                        "name": "Shape of You",
                        "artists": [{"name": "Ed Sheeran"}],
                        "album": {"name": "÷ (Deluxe)"},
                        "duration_ms": 233712,
                        "uri": "spotify:track:7qiZfU4dY1lWllzX7mPBI3"
                    },
                    {"id": null, "name": "Local file", "artists": []}
                ],
                "next": null
            }
        }"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let candidates: Vec<CatalogCandidate> = response
            .tracks
            .items
            .into_iter()
            .filter_map(TrackObject::into_candidate)
            .collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].artists, vec!["Ed Sheeran".to_string()]);
        assert_eq!(candidates[0].album, "÷ (Deluxe)");
        assert_eq!(candidates[0].duration_ms, 233712);
    }

    #[test]
    fn test_playlist_page_tolerates_null_tracks() {
        let body = r#"{"items": [{"track": null}], "next": "https://api.example/next"}"#;
        let page: Page<PlaylistItem> = serde_json::from_str(body).unwrap();
        assert!(page.items[0].track.is_none());
        assert_eq!(page.next.as_deref(), Some("https://api.example/next"));
    }

    #[test]
    fn test_user_playlist_page_decodes() {
        let body = r#"{
            "items": [
                {"id": "p1", "name": "Road Trip", "tracks": {"href": "x", "total": 12}},
                null,
                {"id": "p2", "name": "Empty"}
            ],
            "next": null
        }"#;
        let page: Page<Option<SimplifiedPlaylist>> = serde_json::from_str(body).unwrap();
        let summaries: Vec<PlaylistSummary> = page
            .items
            .into_iter()
            .flatten()
            .map(SimplifiedPlaylist::into_summary)
            .collect();
        assert_eq!(
            summaries,
            vec![
                PlaylistSummary {
                    id: "p1".to_string(),
                    name: "Road Trip".to_string(),
                    track_count: 12
                },
                PlaylistSummary {
                    id: "p2".to_string(),
                    name: "Empty".to_string(),
                    track_count: 0
                },
            ]
        );
    }

    #[test]
    fn test_removal_body_names_each_track() {
        let body = removal_body(
            &[
                TrackPosition {
                    uri: "spotify:track:a".to_string(),
                    position: 0,
                },
                TrackPosition {
                    uri: "spotify:track:c".to_string(),
                    position: 2,
                },
            ],
            "snap1",
        );
        assert_eq!(
            body,
            json!({
                "tracks": [
                    {"uri": "spotify:track:a", "positions": [0]},
                    {"uri": "spotify:track:c", "positions": [2]}
                ],
                "snapshot_id": "snap1"
            })
        );
        assert!(body.get("positions").is_none());
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let client = SpotifyClient::new(&CatalogConfig::default(), "token".to_string());
        assert!(client.is_ok());
    }
}
