//! tuneport-resolve library interface
//!
//! Resolves human-supplied (title, artist) pairs into catalog tracks and
//! assembles them into playlists. The `tuneport` binary is a thin CLI over
//! this library; integration tests drive it through the same surface.

pub mod batch;
pub mod catalog;
pub mod disambiguation;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingest;
pub mod playlist;
pub mod types;

pub use crate::batch::{BatchResolver, ResolvedSong, RunReport, RunSummary};
pub use crate::catalog::CatalogSearch;
pub use crate::disambiguation::{AutoSkip, Choice, Disambiguator, TerminalPrompt};
pub use crate::engine::{QueryCache, ResolutionEngine, ResolveContext};
pub use crate::error::{CatalogError, IngestError, ResolveError};
pub use crate::playlist::PlaylistWriter;
pub use crate::types::{
    CatalogCandidate, ExistingTrackSet, NormalizedQuery, ResolutionResult, ScoredCandidate,
    SearchQuery, SkipReason, SongRequest, StrategyTag,
};
