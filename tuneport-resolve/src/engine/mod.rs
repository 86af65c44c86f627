//! Track-resolution engine
//!
//! Normalizer -> Sequencer -> catalog search -> Scorer -> Selector, one
//! request at a time. The engine holds no mutable state of its own; the
//! per-run query cache, cancellation token and event bus arrive through
//! [`ResolveContext`], so independent requests can resolve concurrently.

pub mod cache;
pub mod dedup;
pub mod normalizer;
pub mod retry;
pub mod scorer;
pub mod selector;
pub mod sequencer;

pub use cache::QueryCache;
pub use scorer::SimilarityScorer;
pub use selector::{CandidateSelector, SelectionState};
pub use sequencer::StrategySequencer;

use crate::catalog::CatalogSearch;
use crate::disambiguation::{Choice, Disambiguator};
use crate::error::{CatalogError, ResolveError};
use crate::types::{
    CatalogCandidate, ExistingTrackSet, ResolutionResult, ScoredCandidate, SearchQuery,
    SkipReason, SongRequest,
};
use retry::Attempt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tuneport_common::{EventBus, ResolveEvent, ResolverSettings};

/// Everything one resolution borrows from its caller
#[derive(Clone)]
pub struct ResolveContext<'a> {
    pub existing: &'a ExistingTrackSet,
    pub interactive: bool,
    pub cache: Option<&'a QueryCache>,
    pub cancel: CancellationToken,
    pub events: Option<&'a EventBus>,
    /// Position of the request in its batch (for events)
    pub request_index: usize,
}

impl<'a> ResolveContext<'a> {
    pub fn new(existing: &'a ExistingTrackSet) -> Self {
        Self {
            existing,
            interactive: false,
            cache: None,
            cancel: CancellationToken::new(),
            events: None,
            request_index: 0,
        }
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_cache(mut self, cache: &'a QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: &'a EventBus, request_index: usize) -> Self {
        self.events = Some(events);
        self.request_index = request_index;
        self
    }
}

/// What one strategy attempt saw (for `tuneport search --verbose`)
#[derive(Debug, Clone)]
pub struct StrategyTrace {
    pub query: SearchQuery,
    pub ranked: Vec<ScoredCandidate>,
    pub from_cache: bool,
    /// Set when the search itself failed and the strategy was abandoned
    pub failure: Option<String>,
}

enum Fetch {
    Candidates {
        candidates: Vec<CatalogCandidate>,
        from_cache: bool,
    },
    Abandoned(String),
    Cancelled,
}

pub struct ResolutionEngine {
    catalog: Arc<dyn CatalogSearch>,
    disambiguator: Arc<dyn Disambiguator>,
    settings: ResolverSettings,
    sequencer: StrategySequencer,
    scorer: SimilarityScorer,
    selector: CandidateSelector,
}

impl ResolutionEngine {
    /// Build an engine; rejects inconsistent settings
    pub fn new(
        catalog: Arc<dyn CatalogSearch>,
        disambiguator: Arc<dyn Disambiguator>,
        settings: ResolverSettings,
    ) -> tuneport_common::Result<Self> {
        settings.validate()?;
        Ok(Self {
            catalog,
            disambiguator,
            sequencer: StrategySequencer::from_settings(&settings),
            scorer: SimilarityScorer::from_settings(&settings),
            selector: CandidateSelector::from_settings(&settings),
            settings,
        })
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve one request with a fresh (uncached, uncancelled) context
    pub async fn resolve(
        &self,
        request: &SongRequest,
        existing: &ExistingTrackSet,
        interactive: bool,
    ) -> Result<ResolutionResult, ResolveError> {
        let ctx = ResolveContext::new(existing).interactive(interactive);
        self.resolve_with(request, &ctx).await
    }

    /// Resolve one request within a caller-supplied context
    ///
    /// # Errors
    /// Only [`ResolveError::Auth`]; every other outcome is a
    /// [`ResolutionResult`].
    pub async fn resolve_with(
        &self,
        request: &SongRequest,
        ctx: &ResolveContext<'_>,
    ) -> Result<ResolutionResult, ResolveError> {
        let (result, _) = self.resolve_traced(request, ctx).await?;
        Ok(result)
    }

    /// Like [`resolve_with`](Self::resolve_with), also returning what each
    /// attempted strategy saw
    pub async fn resolve_traced(
        &self,
        request: &SongRequest,
        ctx: &ResolveContext<'_>,
    ) -> Result<(ResolutionResult, Vec<StrategyTrace>), ResolveError> {
        let mut trace = Vec::new();

        if !request.is_valid() {
            info!(
                request_index = ctx.request_index,
                "Skipping request with empty title"
            );
            return Ok((ResolutionResult::Skipped(SkipReason::InvalidInput), trace));
        }

        let base = normalizer::normalize(&request.title, &request.artist);
        if !base.has_title() {
            info!(
                request_index = ctx.request_index,
                title = %request.title,
                "Skipping request whose title is only decoration"
            );
            return Ok((ResolutionResult::Skipped(SkipReason::InvalidInput), trace));
        }
        let plan = self.sequencer.plan(&base);
        debug!(
            request_index = ctx.request_index,
            title = %base.cleaned_title,
            artist = %base.cleaned_artist,
            strategies = plan.len(),
            "Resolving request"
        );

        for query in &plan {
            if ctx.cancel.is_cancelled() {
                return Ok((ResolutionResult::Skipped(SkipReason::Cancelled), trace));
            }

            let mut state = SelectionState::Searching(query.strategy);
            loop {
                state = match state {
                    SelectionState::Searching(strategy) => {
                        if let Some(events) = ctx.events {
                            events.emit_lossy(ResolveEvent::StrategyAttempted {
                                request_index: ctx.request_index,
                                strategy: strategy.to_string(),
                                query: query.text.clone(),
                            });
                        }

                        match self.fetch(query, ctx).await? {
                            Fetch::Cancelled => {
                                return Ok((ResolutionResult::Skipped(SkipReason::Cancelled), trace));
                            }
                            Fetch::Abandoned(reason) => {
                                trace.push(StrategyTrace {
                                    query: query.clone(),
                                    ranked: Vec::new(),
                                    from_cache: false,
                                    failure: Some(reason),
                                });
                                SelectionState::StrategyExhausted
                            }
                            Fetch::Candidates {
                                candidates,
                                from_cache,
                            } => {
                                let ranked = self.scorer.rank(&query.target, candidates);
                                trace.push(StrategyTrace {
                                    query: query.clone(),
                                    ranked: ranked.clone(),
                                    from_cache,
                                    failure: None,
                                });
                                SelectionState::Scored(ranked)
                            }
                        }
                    }
                    SelectionState::Scored(ranked) => {
                        self.selector.decide(ranked, ctx.interactive)
                    }
                    SelectionState::AutoAccepted(chosen) => {
                        debug!(
                            strategy = %query.strategy,
                            score = chosen.score,
                            track_id = %chosen.candidate.id,
                            "Candidate auto-accepted"
                        );
                        let result = self.matched(chosen, query, ctx);
                        return Ok((result, trace));
                    }
                    SelectionState::AmbiguousPending(choices) => {
                        let result = self.disambiguate(request, choices, query, ctx).await;
                        return Ok((result, trace));
                    }
                    SelectionState::StrategyExhausted => {
                        debug!(
                            request_index = ctx.request_index,
                            strategy = %query.strategy,
                            "Strategy exhausted"
                        );
                        break;
                    }
                };
            }
        }

        info!(
            request_index = ctx.request_index,
            title = %request.title,
            artist = %request.artist,
            "No strategy produced a match"
        );
        Ok((ResolutionResult::Unresolved, trace))
    }

    async fn fetch(
        &self,
        query: &SearchQuery,
        ctx: &ResolveContext<'_>,
    ) -> Result<Fetch, ResolveError> {
        let key = query.key();
        if let Some(cache) = ctx.cache {
            if let Some(candidates) = cache.get(&key).await {
                debug!(query = %query.text, "Query served from cache");
                return Ok(Fetch::Candidates {
                    candidates,
                    from_cache: true,
                });
            }
        }

        let backoff = Duration::from_millis(self.settings.retry_backoff_ms);
        let outcome = retry::retry_once("catalog search", backoff, &ctx.cancel, || {
            self.catalog
                .search(&query.text, query.field_qualified, query.limit)
        })
        .await;

        match outcome {
            Ok(Attempt::Done(candidates)) => {
                if let Some(cache) = ctx.cache {
                    cache.insert(key, candidates.clone()).await;
                }
                Ok(Fetch::Candidates {
                    candidates,
                    from_cache: false,
                })
            }
            Ok(Attempt::Cancelled) => Ok(Fetch::Cancelled),
            Err(CatalogError::Auth(message)) => {
                error!(query = %query.text, "Catalog rejected credentials: {}", message);
                Err(ResolveError::Auth(message))
            }
            Err(err) => {
                warn!(
                    strategy = %query.strategy,
                    query = %query.text,
                    error = %err,
                    "Abandoning strategy"
                );
                Ok(Fetch::Abandoned(err.to_string()))
            }
        }
    }

    async fn disambiguate(
        &self,
        request: &SongRequest,
        choices: Vec<ScoredCandidate>,
        query: &SearchQuery,
        ctx: &ResolveContext<'_>,
    ) -> ResolutionResult {
        debug!(
            request_index = ctx.request_index,
            strategy = %query.strategy,
            candidates = choices.len(),
            "Awaiting disambiguation"
        );

        let choice = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return ResolutionResult::Skipped(SkipReason::Cancelled);
            }
            choice = self.disambiguator.present_choices(request, &choices) => choice,
        };

        match choice {
            Choice::Select(position) if (1..=choices.len()).contains(&position) => {
                let chosen = choices.into_iter().nth(position - 1);
                match chosen {
                    Some(chosen) => self.matched(chosen, query, ctx),
                    None => ResolutionResult::Skipped(SkipReason::UserSkip),
                }
            }
            Choice::Select(position) => {
                warn!(
                    position,
                    available = choices.len(),
                    "Disambiguation choice out of range, treating as skip"
                );
                ResolutionResult::Skipped(SkipReason::UserSkip)
            }
            Choice::Skip => ResolutionResult::Skipped(SkipReason::UserSkip),
        }
    }

    fn matched(
        &self,
        chosen: ScoredCandidate,
        query: &SearchQuery,
        ctx: &ResolveContext<'_>,
    ) -> ResolutionResult {
        let result = ResolutionResult::Matched {
            candidate: chosen.candidate,
            strategy: query.strategy,
            score: chosen.score,
        };
        dedup::apply(result, ctx.existing)
    }
}
