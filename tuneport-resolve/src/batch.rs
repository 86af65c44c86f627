//! Batch driver
//!
//! Fans a list of requests out over the engine with bounded concurrency and
//! yields results lazily, in input order. Owns the per-run state the engine
//! borrows: query cache, cancellation token, event bus.
//!
//! Failure isolation: each request ends in its own [`ResolutionResult`].
//! The exception is an authentication failure, which cancels the run, is
//! yielded once, and ends the stream.

use crate::engine::{QueryCache, ResolutionEngine, ResolveContext};
use crate::error::ResolveError;
use crate::types::{ExistingTrackSet, ResolutionResult, SkipReason, SongRequest};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tuneport_common::{EventBus, ResolveEvent};
use uuid::Uuid;

/// One request's terminal result, tagged with its input position
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSong {
    pub index: usize,
    pub request: SongRequest,
    pub result: ResolutionResult,
}

/// End-of-run counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub matched: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub unresolved: usize,
}

impl RunSummary {
    pub fn record(&mut self, result: &ResolutionResult) {
        self.total += 1;
        match result {
            ResolutionResult::Matched { .. } => self.matched += 1,
            ResolutionResult::Skipped(reason) => *self.skipped.entry(*reason).or_insert(0) += 1,
            ResolutionResult::Unresolved => self.unresolved += 1,
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} songs: {} matched, {} skipped, {} unresolved",
            self.total,
            self.matched,
            self.skipped_total(),
            self.unresolved
        )?;
        if !self.skipped.is_empty() {
            let reasons: Vec<String> = self
                .skipped
                .iter()
                .map(|(reason, count)| format!("{} {}", count, reason))
                .collect();
            write!(f, " ({})", reasons.join(", "))?;
        }
        Ok(())
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub songs: Vec<ResolvedSong>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Matched candidate ids in input order
    pub fn accepted_ids(&self) -> Vec<String> {
        self.matched().map(|c| c.id.clone()).collect()
    }

    /// Matched candidate uris in input order (what the playlist API takes)
    pub fn accepted_uris(&self) -> Vec<String> {
        self.matched().map(|c| c.uri.clone()).collect()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedSong> {
        self.songs
            .iter()
            .filter(|s| s.result == ResolutionResult::Unresolved)
    }

    fn matched(&self) -> impl Iterator<Item = &crate::types::CatalogCandidate> {
        self.songs.iter().filter_map(|s| s.result.matched_candidate())
    }
}

pub struct BatchResolver {
    engine: Arc<ResolutionEngine>,
    existing: Arc<ExistingTrackSet>,
    interactive: bool,
    concurrency: usize,
    cache: QueryCache,
    cancel: CancellationToken,
    events: EventBus,
    run_id: Uuid,
}

impl BatchResolver {
    pub fn new(engine: Arc<ResolutionEngine>, events: EventBus) -> Self {
        Self {
            engine,
            existing: Arc::new(ExistingTrackSet::empty()),
            interactive: false,
            concurrency: 4,
            cache: QueryCache::new(),
            cancel: CancellationToken::new(),
            events,
            run_id: Uuid::new_v4(),
        }
    }

    /// Tracks already in the target playlist (append mode)
    pub fn with_existing(mut self, existing: ExistingTrackSet) -> Self {
        self.existing = Arc::new(existing);
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Maximum requests in flight; clamped to at least 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Resolve (or re-resolve) one request with this run's cache and token
    pub async fn resolve_one(
        &self,
        index: usize,
        request: &SongRequest,
    ) -> Result<ResolutionResult, ResolveError> {
        let ctx = ResolveContext::new(&self.existing)
            .interactive(self.interactive)
            .with_cache(&self.cache)
            .with_cancel(self.cancel.clone())
            .with_events(&self.events, index);

        let outcome = self.engine.resolve_with(request, &ctx).await;
        match &outcome {
            Ok(result) => {
                self.events.emit_lossy(ResolveEvent::SongResolved {
                    request_index: index,
                    title: request.title.clone(),
                    outcome: result.outcome_label(),
                });
            }
            Err(ResolveError::Auth(message)) => {
                error!(request_index = index, "Authentication failed, aborting run: {}", message);
                self.cancel.cancel();
            }
        }
        outcome
    }

    /// Lazy, ordered stream of results with at most `concurrency` in flight
    ///
    /// Ends right after the first authentication failure.
    pub fn stream(
        &self,
        requests: Vec<SongRequest>,
    ) -> impl Stream<Item = Result<ResolvedSong, ResolveError>> + '_ {
        self.events.emit_lossy(ResolveEvent::BatchStarted {
            run_id: self.run_id,
            total: requests.len(),
            timestamp: Utc::now(),
        });

        stream::iter(requests.into_iter().enumerate())
            .map(move |(index, request)| async move {
                let result = self.resolve_one(index, &request).await?;
                Ok::<_, ResolveError>(ResolvedSong {
                    index,
                    request,
                    result,
                })
            })
            .buffered(self.concurrency)
            .scan(false, |aborted, item| {
                if *aborted {
                    return futures::future::ready(None);
                }
                if item.is_err() {
                    *aborted = true;
                }
                futures::future::ready(Some(item))
            })
    }

    /// Drive the whole stream and summarize it
    ///
    /// # Errors
    /// [`ResolveError::Auth`] when the catalog rejects the credentials; the
    /// run is aborted and partial results are discarded.
    pub async fn run(&self, requests: Vec<SongRequest>) -> Result<RunReport, ResolveError> {
        let mut songs = Vec::with_capacity(requests.len());
        let mut summary = RunSummary::default();

        let mut results = Box::pin(self.stream(requests));
        while let Some(item) = results.next().await {
            match item {
                Ok(song) => {
                    summary.record(&song.result);
                    songs.push(song);
                }
                Err(err) => {
                    self.events.emit_lossy(ResolveEvent::BatchAborted {
                        run_id: self.run_id,
                        reason: err.to_string(),
                    });
                    return Err(err);
                }
            }
        }

        if self.cancel.is_cancelled() {
            self.events.emit_lossy(ResolveEvent::BatchAborted {
                run_id: self.run_id,
                reason: "cancelled".to_string(),
            });
        }

        self.events.emit_lossy(ResolveEvent::BatchCompleted {
            run_id: self.run_id,
            matched: summary.matched,
            skipped: summary.skipped_total(),
            unresolved: summary.unresolved,
            timestamp: Utc::now(),
        });
        info!(run_id = %self.run_id, "{}", summary);

        Ok(RunReport {
            run_id: self.run_id,
            songs,
            summary,
        })
    }
}
