//! Disambiguation surfaces
//!
//! When several candidates are plausible and interactive mode is on, the
//! engine hands the ranked list to a [`Disambiguator`] and waits. The
//! terminal prompt reads stdin on a blocking thread; batch runs use
//! [`AutoSkip`].

use crate::types::{ScoredCandidate, SongRequest};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Answer to a disambiguation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// 1-based position in the presented list
    Select(usize),
    Skip,
}

#[async_trait]
pub trait Disambiguator: Send + Sync {
    async fn present_choices(&self, request: &SongRequest, ranked: &[ScoredCandidate]) -> Choice;
}

/// Non-interactive policy: never pick
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSkip;

#[async_trait]
impl Disambiguator for AutoSkip {
    async fn present_choices(&self, request: &SongRequest, ranked: &[ScoredCandidate]) -> Choice {
        tracing::debug!(
            request = %request,
            candidates = ranked.len(),
            "Auto-skipping ambiguous request"
        );
        Choice::Skip
    }
}

/// Console prompt on stdin/stderr
///
/// Concurrent requests queue on the internal mutex so only one prompt is on
/// screen at a time.
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompt {
    lock: Arc<Mutex<()>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Disambiguator for TerminalPrompt {
    async fn present_choices(&self, request: &SongRequest, ranked: &[ScoredCandidate]) -> Choice {
        let _guard = self.lock.lock().await;

        let menu = render_choices(request, ranked);
        let count = ranked.len();

        let answer = tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{}", menu);

            loop {
                let _ = write!(stderr, "Choose 1-{} (n to skip): ", count);
                let _ = stderr.flush();

                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    // EOF: nobody left to answer
                    Ok(0) | Err(_) => return Choice::Skip,
                    Ok(_) => {}
                }

                match parse_choice(&line, count) {
                    Some(choice) => return choice,
                    None => {
                        let _ = writeln!(stderr, "Invalid choice: {}", line.trim());
                    }
                }
            }
        })
        .await;

        answer.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Prompt task failed, skipping");
            Choice::Skip
        })
    }
}

/// Parse one line of prompt input; `None` means ask again
pub fn parse_choice(input: &str, count: usize) -> Option<Choice> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("n") || input.eq_ignore_ascii_case("s") {
        return Some(Choice::Skip);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(Choice::Select(n)),
        _ => None,
    }
}

pub fn render_choices(request: &SongRequest, ranked: &[ScoredCandidate]) -> String {
    let mut out = format!("\nSeveral matches for \"{}\":\n", request);
    for (i, scored) in ranked.iter().enumerate() {
        let c = &scored.candidate;
        out.push_str(&format!(
            "  {}. {} - {} [{}] ({}) score {:.2}\n     {}\n",
            i + 1,
            c.title,
            c.artist_line(),
            c.album,
            format_duration(c.duration_ms),
            scored.score,
            c.uri
        ));
    }
    out
}

/// m:ss
pub fn format_duration(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
