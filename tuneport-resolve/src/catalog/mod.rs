//! Catalog search collaborator
//!
//! The engine only ever asks one question of the catalog: "what tracks match
//! this query?". Anything that can answer it (the HTTP client, a scripted
//! mock) implements [`CatalogSearch`].

pub mod spotify;

pub use spotify::SpotifyClient;

use crate::error::CatalogError;
use crate::types::CatalogCandidate;
use async_trait::async_trait;

#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Search the catalog
    ///
    /// `field_qualified` tells the implementation `query` already carries
    /// field syntax (`track:"…" artist:"…"`) rather than bare keywords.
    /// At most `limit` candidates are returned, in catalog rank order.
    async fn search(
        &self,
        query: &str,
        field_qualified: bool,
        limit: u32,
    ) -> Result<Vec<CatalogCandidate>, CatalogError>;
}
