//! Test doubles for the catalog and disambiguation collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tuneport_common::ResolverSettings;
use tuneport_resolve::{
    AutoSkip, CatalogCandidate, CatalogError, CatalogSearch, Choice, Disambiguator,
    ResolutionEngine, ScoredCandidate, SongRequest,
};

pub fn candidate(id: &str, title: &str, artists: &[&str], album: &str) -> CatalogCandidate {
    CatalogCandidate {
        id: id.to_string(),
        title: title.to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        album: album.to_string(),
        duration_ms: 233_000,
        uri: format!("spotify:track:{}", id),
    }
}

/// Default settings with a retry backoff short enough for tests
pub fn fast_settings() -> ResolverSettings {
    ResolverSettings {
        retry_backoff_ms: 5,
        ..ResolverSettings::default()
    }
}

/// Catalog keyed by exact query text
///
/// Queries with no entry return `default` (empty unless set). Scripted
/// errors for a query are consumed first, one per call.
#[derive(Default)]
pub struct MockCatalog {
    results: HashMap<String, Vec<CatalogCandidate>>,
    default: Vec<CatalogCandidate>,
    errors: Mutex<HashMap<String, VecDeque<CatalogError>>>,
    default_error: Option<CatalogError>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, candidates: Vec<CatalogCandidate>) -> Self {
        self.results.insert(query.to_string(), candidates);
        self
    }

    pub fn with_default(mut self, candidates: Vec<CatalogCandidate>) -> Self {
        self.default = candidates;
        self
    }

    pub fn with_errors(self, query: &str, errors: Vec<CatalogError>) -> Self {
        self.errors
            .lock()
            .unwrap()
            .insert(query.to_string(), errors.into());
        self
    }

    /// Every query without results or scripted errors fails with `error`
    pub fn failing_with(mut self, error: CatalogError) -> Self {
        self.default_error = Some(error);
        self
    }

    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, query: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|q| *q == query).count()
    }

    pub fn queries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSearch for MockCatalog {
    async fn search(
        &self,
        query: &str,
        _field_qualified: bool,
        _limit: u32,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(query.to_string());

        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }

        let scripted = self
            .errors
            .lock()
            .unwrap()
            .get_mut(query)
            .and_then(VecDeque::pop_front);
        if let Some(err) = scripted {
            return Err(err);
        }

        if let Some(found) = self.results.get(query) {
            return Ok(found.clone());
        }
        if let Some(err) = &self.default_error {
            return Err(err.clone());
        }
        Ok(self.default.clone())
    }
}

/// Returns a fixed choice and records what it was shown
pub struct ScriptedDisambiguator {
    choice: Choice,
    shown: Mutex<Vec<(SongRequest, Vec<ScoredCandidate>)>>,
}

impl ScriptedDisambiguator {
    pub fn new(choice: Choice) -> Self {
        Self {
            choice,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(SongRequest, Vec<ScoredCandidate>)> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl Disambiguator for ScriptedDisambiguator {
    async fn present_choices(&self, request: &SongRequest, ranked: &[ScoredCandidate]) -> Choice {
        self.shown
            .lock()
            .unwrap()
            .push((request.clone(), ranked.to_vec()));
        self.choice
    }
}

/// Never answers; only cancellation ends the wait
pub struct StalledDisambiguator;

#[async_trait]
impl Disambiguator for StalledDisambiguator {
    async fn present_choices(&self, _request: &SongRequest, _ranked: &[ScoredCandidate]) -> Choice {
        std::future::pending::<()>().await;
        Choice::Skip
    }
}

pub fn engine(catalog: Arc<MockCatalog>) -> ResolutionEngine {
    ResolutionEngine::new(catalog, Arc::new(AutoSkip), fast_settings()).unwrap()
}

pub fn engine_with(
    catalog: Arc<MockCatalog>,
    disambiguator: Arc<dyn Disambiguator>,
    settings: ResolverSettings,
) -> ResolutionEngine {
    ResolutionEngine::new(catalog, disambiguator, settings).unwrap()
}
