//! tuneport - playlist import CLI
//!
//! Reads a playlist file, resolves every song against the catalog and
//! creates (or appends to) a playlist. Also: single-song search with a
//! per-strategy trace, removal by position, export, config management.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tuneport_common::config::{
    load_toml_config, resolve_access_token, resolve_config_path, write_toml_config, TomlConfig,
};
use tuneport_common::{EventBus, ResolveEvent};
use tuneport_resolve::catalog::SpotifyClient;
use tuneport_resolve::disambiguation::format_duration;
use tuneport_resolve::ingest::{read_playlist, IngestOptions};
use tuneport_resolve::export::{default_export_path, write_playlist};
use tuneport_resolve::playlist::{
    pick_playlist, positions_to_remove, to_zero_based, PlaylistSummary,
};
use tuneport_resolve::{
    AutoSkip, BatchResolver, Disambiguator, ExistingTrackSet, PlaylistWriter, ResolutionEngine,
    ResolutionResult, ResolveContext, SkipReason, SongRequest, TerminalPrompt,
};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "tuneport")]
#[command(about = "Resolve song lists into catalog playlists")]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: TUNEPORT_CONFIG or <config dir>/tuneport/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog access token (overrides TUNEPORT_ACCESS_TOKEN and the config file)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a CSV, spreadsheet, JSON or text file into a playlist
    Import(ImportArgs),

    /// Resolve a single song and show what each strategy found
    Search {
        title: String,
        #[arg(short, long, default_value = "")]
        artist: String,
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove tracks from a playlist by 1-based position
    Remove {
        playlist_id: String,
        #[arg(long, value_delimiter = ',', required = true)]
        positions: Vec<usize>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Export a playlist to xlsx, CSV or JSON
    Export {
        /// Playlist to export (default: choose from your playlists)
        playlist_id: Option<String>,
        /// Output file (default: playlist_<name>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct ImportArgs {
    file: PathBuf,

    /// Playlist name (default: from the file, else the file name)
    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value = "Imported by tuneport")]
    description: String,

    #[arg(long)]
    private: bool,

    /// Append to an existing playlist instead of creating one
    #[arg(long, value_name = "PLAYLIST_ID")]
    append: Option<String>,

    /// Ask when several candidates are plausible
    #[arg(short, long)]
    interactive: bool,

    /// Resolve and report without touching any playlist
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long, default_value = "song_name")]
    title_column: String,

    #[arg(long, default_value = "artist")]
    artist_column: String,

    #[arg(long, default_value_t = 0)]
    skip_rows: usize,

    /// Split one title cell into several songs, e.g. "/"
    #[arg(long)]
    separator: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a config file with default values
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration (token redacted)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref())?;

    // Warnings raised while loading need a subscriber before the real one exists
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || load_toml_config(&config_path))
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&config.logging.level);
    info!(version = VERSION, config = %config_path.display(), "tuneport starting");

    match cli.command {
        Command::Config { action } => run_config(action, &config_path, &config),
        Command::Import(args) => run_import(args, &config, cli.token.as_deref()).await,
        Command::Search {
            title,
            artist,
            verbose,
        } => run_search(title, artist, verbose, &config, cli.token.as_deref()).await,
        Command::Remove {
            playlist_id,
            positions,
            yes,
        } => run_remove(&playlist_id, &positions, yes, &config, cli.token.as_deref()).await,
        Command::Export {
            playlist_id,
            output,
        } => run_export(playlist_id, output, &config, cli.token.as_deref()).await,
    }
}

/// RUST_LOG wins; otherwise the config file's level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn connect(config: &TomlConfig, cli_token: Option<&str>) -> Result<Arc<SpotifyClient>> {
    let token = resolve_access_token(cli_token, config)?;
    let client = SpotifyClient::new(&config.catalog, token).context("Failed to build catalog client")?;
    Ok(Arc::new(client))
}

async fn run_import(args: ImportArgs, config: &TomlConfig, cli_token: Option<&str>) -> Result<()> {
    let options = IngestOptions {
        title_column: args.title_column.clone(),
        artist_column: args.artist_column.clone(),
        skip_rows: args.skip_rows,
        song_separator: args.separator.clone(),
        ..IngestOptions::default()
    };
    let playlist = read_playlist(&args.file, &options)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let name = args.name.clone().unwrap_or(playlist.name);

    let client = connect(config, cli_token)?;

    let existing = match &args.append {
        Some(playlist_id) => {
            let existing = client
                .existing_track_ids(playlist_id)
                .await
                .context("Failed to read target playlist")?;
            info!(playlist_id = %playlist_id, tracks = existing.len(), "Appending to playlist");
            existing
        }
        None => ExistingTrackSet::empty(),
    };

    let disambiguator: Arc<dyn Disambiguator> = if args.interactive {
        Arc::new(TerminalPrompt::new())
    } else {
        Arc::new(AutoSkip)
    };
    let engine = ResolutionEngine::new(client.clone(), disambiguator, config.resolver.clone())?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let events = EventBus::new(256);
    let progress = spawn_progress_printer(&events);

    let batch = BatchResolver::new(Arc::new(engine), events)
        .with_existing(existing)
        .interactive(args.interactive)
        .with_concurrency(args.concurrency.unwrap_or(config.batch.concurrency))
        .with_cancel(cancel.clone());

    let outcome = batch.run(playlist.requests).await;
    drop(batch);
    let _ = progress.await;

    let report = outcome.context("Import aborted")?;

    println!("\n{}", report.summary);
    for song in report.unresolved() {
        println!("  unresolved: {}", song.request);
    }
    for song in &report.songs {
        if song.result == ResolutionResult::Skipped(SkipReason::InvalidInput) {
            println!("  invalid input at row {}", song.index + 1);
        }
    }

    if cancel.is_cancelled() {
        warn!("Import interrupted; no playlist changes made");
        // A pending terminal prompt may still hold stdin
        std::process::exit(EXIT_INTERRUPTED);
    }

    let uris = report.accepted_uris();
    if args.dry_run {
        for song in &report.songs {
            if let Some(track) = song.result.matched_candidate() {
                println!("  {} -> {} ({})", song.request, track.title, track.uri);
            }
        }
        println!("Dry run: {} tracks would be added to \"{}\"", uris.len(), name);
        return Ok(());
    }

    if uris.is_empty() {
        warn!("Nothing matched; playlist left unchanged");
        return Ok(());
    }

    let playlist_id = match &args.append {
        Some(id) => id.clone(),
        None => client
            .create_playlist(&name, &args.description, !args.private)
            .await
            .context("Failed to create playlist")?,
    };
    client
        .append_tracks(&playlist_id, &uris)
        .await
        .context("Failed to add tracks")?;

    println!("Added {} tracks to \"{}\" ({})", uris.len(), name, playlist_id);
    Ok(())
}

async fn run_search(
    title: String,
    artist: String,
    verbose: bool,
    config: &TomlConfig,
    cli_token: Option<&str>,
) -> Result<()> {
    let client = connect(config, cli_token)?;
    let engine = ResolutionEngine::new(client, Arc::new(AutoSkip), config.resolver.clone())?;

    let request = SongRequest::new(title, artist);
    let existing = ExistingTrackSet::empty();
    let ctx = ResolveContext::new(&existing);
    let (result, trace) = engine
        .resolve_traced(&request, &ctx)
        .await
        .context("Search aborted")?;

    if verbose {
        for step in &trace {
            println!("[{}] {}", step.query.strategy, step.query.text);
            if let Some(failure) = &step.failure {
                println!("    failed: {}", failure);
                continue;
            }
            if step.ranked.is_empty() {
                println!("    no candidates");
            }
            for scored in &step.ranked {
                let c = &scored.candidate;
                println!(
                    "    {:.3}  {} - {} [{}] {}",
                    scored.score,
                    c.title,
                    c.artist_line(),
                    c.album,
                    format_duration(c.duration_ms)
                );
            }
        }
    }

    match result {
        ResolutionResult::Matched {
            candidate,
            strategy,
            score,
        } => println!(
            "Matched via {} ({:.3}): {} - {} [{}]\n  {}",
            strategy,
            score,
            candidate.title,
            candidate.artist_line(),
            candidate.album,
            candidate.uri
        ),
        ResolutionResult::Skipped(reason) => println!("Skipped: {}", reason),
        ResolutionResult::Unresolved => println!("No confident match for {}", request),
    }
    Ok(())
}

async fn run_remove(
    playlist_id: &str,
    positions: &[usize],
    yes: bool,
    config: &TomlConfig,
    cli_token: Option<&str>,
) -> Result<()> {
    let client = connect(config, cli_token)?;
    let tracks = client
        .playlist_tracks(playlist_id)
        .await
        .context("Failed to read playlist")?;

    let zero_based = match to_zero_based(positions, tracks.len()) {
        Ok(p) => p,
        Err(invalid) => bail!(
            "Positions out of range (playlist has {} tracks): {:?}",
            tracks.len(),
            invalid
        ),
    };

    println!("Tracks to remove:");
    for &p in &zero_based {
        let t = &tracks[p];
        println!("  {}. {} - {}", p + 1, t.title, t.artist_line());
    }
    let entries = positions_to_remove(&tracks, &zero_based);

    if !yes && !confirm("Remove these tracks? [y/N] ").await? {
        println!("Cancelled");
        return Ok(());
    }

    client
        .remove_positions(playlist_id, &entries)
        .await
        .context("Failed to remove tracks")?;
    println!("Removed {} tracks", entries.len());
    Ok(())
}

async fn run_export(
    playlist_id: Option<String>,
    output: Option<PathBuf>,
    config: &TomlConfig,
    cli_token: Option<&str>,
) -> Result<()> {
    let client = connect(config, cli_token)?;

    let (playlist_id, name) = match playlist_id {
        Some(id) => {
            let name = client
                .playlist_name(&id)
                .await
                .with_context(|| format!("Failed to read playlist {}", id))?;
            (id, name)
        }
        None => {
            let playlists = client
                .user_playlists()
                .await
                .context("Failed to list playlists")?;
            match choose_playlist(&playlists).await? {
                Some(chosen) => (chosen.id.clone(), chosen.name.clone()),
                None => {
                    println!("Export cancelled");
                    return Ok(());
                }
            }
        }
    };

    let tracks = client
        .playlist_tracks(&playlist_id)
        .await
        .context("Failed to read playlist tracks")?;

    let output = output.unwrap_or_else(|| default_export_path(&name));
    write_playlist(&output, &name, &tracks)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Exported {} tracks from \"{}\" to {}", tracks.len(), name, output.display());
    Ok(())
}

/// List the user's playlists and read a 1-based choice; `None` on "q"
async fn choose_playlist(playlists: &[PlaylistSummary]) -> Result<Option<&PlaylistSummary>> {
    if playlists.is_empty() {
        bail!("No playlists found for this account");
    }

    println!("Found {} playlists:", playlists.len());
    for (i, p) in playlists.iter().enumerate() {
        println!("{:3}. {} ({} tracks)", i + 1, p.name, p.track_count);
    }

    let answer = read_line(format!("Choose a playlist to export (1-{}), or q to quit: ", playlists.len())).await?;
    match pick_playlist(&answer, playlists) {
        Ok(chosen) => Ok(chosen),
        Err(invalid) => bail!("Invalid choice: {}", invalid),
    }
}

fn run_config(action: ConfigAction, path: &Path, config: &TomlConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_toml_config(&TomlConfig::default(), path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}

/// Print one line per finished song until the bus closes
fn spawn_progress_printer(events: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        let mut total = 0;
        let mut done = 0;
        loop {
            match rx.recv().await {
                Ok(ResolveEvent::BatchStarted { total: t, .. }) => total = t,
                Ok(ResolveEvent::SongResolved { title, outcome, .. }) => {
                    done += 1;
                    eprintln!("[{}/{}] {}: {}", done, total, title, outcome);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "Progress output fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn confirm(prompt: &str) -> Result<bool> {
    let answer = read_line(prompt.to_string()).await?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Prompt on stderr and read one stdin line off the async runtime
async fn read_line(prompt: String) -> Result<String> {
    let line = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        use std::io::Write;
        eprint!("{}", prompt);
        std::io::stderr().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await??;
    Ok(line)
}
