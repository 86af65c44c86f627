//! Batch driver tests: ordering, isolation, abort, cache, events

mod helpers;

use futures::StreamExt;
use helpers::{candidate, engine, MockCatalog};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tuneport_common::{EventBus, ResolveEvent};
use tuneport_resolve::ingest::{read_playlist, IngestOptions};
use tuneport_resolve::{
    BatchResolver, CatalogError, ExistingTrackSet, ResolutionResult, ResolveError, SkipReason,
    SongRequest,
};

fn exact(title: &str, artist: &str) -> String {
    format!("track:\"{}\" artist:\"{}\"", title, artist)
}

fn batch(catalog: Arc<MockCatalog>) -> (BatchResolver, EventBus) {
    let events = EventBus::new(1024);
    let resolver = BatchResolver::new(Arc::new(engine(catalog)), events.clone());
    (resolver, events)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ResolveEvent>) -> Vec<ResolveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_results_keep_input_order() {
    // The first song is slowest; it must still come out first
    let catalog = Arc::new(
        MockCatalog::new()
            .with_results(&exact("Hello", "Adele"), vec![candidate("a", "Hello", &["Adele"], "")])
            .with_delay(&exact("Hello", "Adele"), Duration::from_millis(60))
            .with_results(&exact("Perfect", "Ed Sheeran"), vec![candidate("b", "Perfect", &["Ed Sheeran"], "")])
            .with_results(&exact("Yellow", "Coldplay"), vec![candidate("c", "Yellow", &["Coldplay"], "")]),
    );
    let (resolver, _events) = batch(catalog);
    let resolver = resolver.with_concurrency(3);

    let report = resolver
        .run(vec![
            SongRequest::new("Hello", "Adele"),
            SongRequest::new("Perfect", "Ed Sheeran"),
            SongRequest::new("Yellow", "Coldplay"),
        ])
        .await
        .unwrap();

    let indexes: Vec<usize> = report.songs.iter().map(|s| s.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert_eq!(report.accepted_ids(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_multi_song_cell_resolves_independently() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "song_name,artist").unwrap();
    writeln!(file, "Perfect / Shape of You,").unwrap();
    file.flush().unwrap();

    let options = IngestOptions {
        song_separator: Some("/".to_string()),
        ..IngestOptions::default()
    };
    let playlist = read_playlist(file.path(), &options).unwrap();
    assert_eq!(
        playlist.requests,
        vec![SongRequest::new("Perfect", ""), SongRequest::new("Shape of You", "")]
    );

    // "Perfect" fails at every strategy; "Shape of You" matches
    let catalog = Arc::new(
        MockCatalog::new()
            .with_results(
                "track:\"Shape of You\"",
                vec![candidate("shape", "Shape of You", &["Ed Sheeran"], "÷")],
            )
            .failing_with(CatalogError::Transient("unavailable".to_string())),
    );
    let (resolver, _events) = batch(catalog);
    let report = resolver.run(playlist.requests).await.unwrap();

    assert_eq!(report.songs[0].result, ResolutionResult::Unresolved);
    assert!(report.songs[1].result.is_matched());
    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.summary.unresolved, 1);
}

#[tokio::test]
async fn test_invalid_and_duplicate_counted_separately() {
    let catalog = Arc::new(MockCatalog::new().with_results(
        &exact("Hello", "Adele"),
        vec![candidate("hello", "Hello", &["Adele"], "")],
    ));
    let (resolver, _events) = batch(catalog.clone());
    let existing: ExistingTrackSet = ["hello"].into_iter().collect();
    let resolver = resolver.with_existing(existing);

    let report = resolver
        .run(vec![
            SongRequest::new("Hello", "Adele"),
            SongRequest::new("", "Nobody"),
            SongRequest::new("Missing", "Nobody"),
        ])
        .await
        .unwrap();

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.skipped[&SkipReason::Duplicate], 1);
    assert_eq!(report.summary.skipped[&SkipReason::InvalidInput], 1);
    assert_eq!(report.summary.unresolved, 1);
    assert!(report.accepted_uris().is_empty());
}

#[tokio::test]
async fn test_auth_failure_ends_the_stream() {
    let catalog = Arc::new(
        MockCatalog::new()
            .with_results(&exact("Hello", "Adele"), vec![candidate("a", "Hello", &["Adele"], "")])
            .failing_with(CatalogError::Auth("token revoked".to_string())),
    );
    let (resolver, _events) = batch(catalog);
    let resolver = resolver.with_concurrency(1);
    let token = resolver.cancel_token();

    let items: Vec<_> = resolver
        .stream(vec![
            SongRequest::new("Hello", "Adele"),
            SongRequest::new("Other", "Someone"),
            SongRequest::new("Third", "Someone"),
        ])
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].as_ref().unwrap().result.is_matched());
    assert_eq!(
        items[1].as_ref().unwrap_err(),
        &ResolveError::Auth("token revoked".to_string())
    );
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_auth_failure_aborts_run() {
    let catalog = Arc::new(
        MockCatalog::new().failing_with(CatalogError::Auth("token revoked".to_string())),
    );
    let (resolver, events) = batch(catalog);
    let mut rx = events.subscribe();

    let err = resolver
        .run(vec![SongRequest::new("Hello", "Adele")])
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Auth(_)));

    let seen = drain(&mut rx);
    assert!(seen
        .iter()
        .any(|e| matches!(e, ResolveEvent::BatchAborted { .. })));
    assert!(!seen
        .iter()
        .any(|e| matches!(e, ResolveEvent::BatchCompleted { .. })));
}

#[tokio::test]
async fn test_cancelled_run_skips_remaining_songs() {
    let catalog = Arc::new(MockCatalog::new());
    let (resolver, events) = batch(catalog.clone());
    let mut rx = events.subscribe();
    resolver.cancel_token().cancel();

    let report = resolver
        .run(vec![
            SongRequest::new("Hello", "Adele"),
            SongRequest::new("Yellow", "Coldplay"),
        ])
        .await
        .unwrap();

    assert_eq!(report.summary.skipped[&SkipReason::Cancelled], 2);
    assert_eq!(catalog.call_count(), 0);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, ResolveEvent::BatchAborted { reason, .. } if reason == "cancelled")));
}

#[tokio::test]
async fn test_shared_cache_avoids_repeat_searches() {
    let query = exact("Hello", "Adele");
    let catalog = Arc::new(
        MockCatalog::new().with_results(&query, vec![candidate("a", "Hello", &["Adele"], "")]),
    );
    let (resolver, _events) = batch(catalog.clone());
    let resolver = resolver.with_concurrency(1);

    let report = resolver
        .run(vec![
            SongRequest::new("Hello", "Adele"),
            SongRequest::new("Hello (Live)", "Adele"),
        ])
        .await
        .unwrap();

    assert_eq!(report.summary.matched, 2);
    assert_eq!(catalog.calls_for(&query), 1);
    assert_eq!(resolver.cache().stats().0, 1);
}

#[tokio::test]
async fn test_event_sequence() {
    let catalog = Arc::new(MockCatalog::new().with_results(
        &exact("Hello", "Adele"),
        vec![candidate("a", "Hello", &["Adele"], "")],
    ));
    let (resolver, events) = batch(catalog);
    let mut rx = events.subscribe();
    let run_id = resolver.run_id();

    let report = resolver
        .run(vec![SongRequest::new("Hello", "Adele"), SongRequest::new("", "")])
        .await
        .unwrap();
    assert_eq!(report.run_id, run_id);

    let seen = drain(&mut rx);
    assert!(matches!(
        seen.first(),
        Some(ResolveEvent::BatchStarted { total: 2, .. })
    ));
    assert!(matches!(
        seen.last(),
        Some(ResolveEvent::BatchCompleted {
            matched: 1,
            skipped: 1,
            unresolved: 0,
            ..
        })
    ));

    let resolved: Vec<(usize, String)> = seen
        .iter()
        .filter_map(|e| match e {
            ResolveEvent::SongResolved {
                request_index,
                outcome,
                ..
            } => Some((*request_index, outcome.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(resolved.len(), 2);
    assert!(resolved.contains(&(0, "matched".to_string())));
    assert!(resolved.contains(&(1, "skipped:invalid-input".to_string())));

    assert!(seen.iter().any(|e| matches!(
        e,
        ResolveEvent::StrategyAttempted { request_index: 0, strategy, .. } if strategy == "exact"
    )));
}

#[tokio::test]
async fn test_zero_concurrency_clamped() {
    let catalog = Arc::new(MockCatalog::new());
    let (resolver, _events) = batch(catalog);
    let resolver = resolver.with_concurrency(0);

    let report = resolver
        .run(vec![SongRequest::new("Hello", "Adele")])
        .await
        .unwrap();
    assert_eq!(report.summary.unresolved, 1);
}
