use clap::{CommandFactory, Parser};
use lastfm_playcount_sync::library::music_app::DEFAULT_APP_NAME;
use lastfm_playcount_sync::{
    run_sync, AggregateCache, CancellationState, JsonFileLibrary, LastFmApiClientImpl,
    MediaLibrary, MusicAppLibrary, Period, PlaycountAggregator, ReconcilePolicy, SyncConfig,
    SyncError, SyncReport,
};
use std::env;
use std::path::PathBuf;

/// Update local play counts from your Last.fm listening history
#[derive(Parser, Debug)]
#[command(
    name = "lastfm-playcount-sync",
    version,
    about = "Update local play counts from your Last.fm listening history",
    long_about = None
)]
struct Cli {
    /// Last.fm username (falls back to LASTFM_USERNAME)
    #[arg(short, long)]
    username: Option<String>,

    /// Only count plays from the last N weeks
    #[arg(short, long, conflicts_with = "days", value_parser = clap::value_parser!(u32).range(1..))]
    weeks: Option<u32>,

    /// Only count plays from the last N days
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Never set a play count above this value
    #[arg(short, long = "max-playcount")]
    max_playcount: Option<u64>,

    /// Add Last.fm plays to the local count instead of replacing it
    #[arg(short = 'a', long = "addpc")]
    add_mode: bool,

    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Also report skipped tracks and request details
    #[arg(short, long)]
    verbose: bool,

    /// Also report tracks with no Last.fm match
    #[arg(short, long)]
    extra_verbose: bool,

    /// Last.fm API key (falls back to LASTFM_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Ignore cached Last.fm data and fetch it again
    #[arg(long)]
    refresh: bool,

    /// Directory for cached Last.fm data
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Use a JSON library file instead of the Music app
    #[arg(long)]
    library_file: Option<PathBuf>,

    /// Scripting name of the music application
    #[arg(long, default_value = DEFAULT_APP_NAME)]
    app_name: String,
}

impl Cli {
    fn period(&self) -> Period {
        match (self.weeks, self.days) {
            (Some(weeks), _) => Period::weeks(weeks),
            (None, Some(days)) => Period::Days(days),
            (None, None) => Period::Overall,
        }
    }

    fn log_level(&self) -> log::LevelFilter {
        if self.extra_verbose {
            log::LevelFilter::Trace
        } else if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

/// Read a setting from a flag, then from the environment, ignoring blanks.
fn flag_or_env(flag: Option<&str>, var: &str) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| env::var(var).ok())
        .filter(|value| !value.trim().is_empty())
}

fn print_report(report: &SyncReport) {
    println!(
        "📊 Last.fm: {} plays of {} tracks by {} artists",
        report.remote_plays, report.remote_tracks, report.remote_artists
    );
    println!(
        "🎵 Library: {} tracks ({} unreadable)",
        report.library_tracks, report.unreadable_tracks
    );
    println!(
        "🔍 Matched: {} to update, {} already up to date, {} over the maximum, {} unmatched",
        report.decisions.apply,
        report.decisions.would_decrease,
        report.decisions.exceeds_max,
        report.decisions.no_match + report.decisions.no_count_for_track
    );

    if report.apply.dry_run {
        println!(
            "🧪 Dry run: {} play counts would be updated",
            report.apply.planned
        );
    } else {
        println!("✅ Updated {} play counts", report.apply.applied);
        if report.apply.failed > 0 {
            println!("⚠️  {} updates failed", report.apply.failed);
        }
    }
}

async fn run(
    cli: Cli,
    username: String,
    cancel: CancellationState,
) -> Result<SyncReport, SyncError> {
    let api_key = flag_or_env(cli.api_key.as_deref(), "LASTFM_API_KEY").ok_or_else(|| {
        SyncError::Config("set --api-key or the LASTFM_API_KEY environment variable".to_string())
    })?;

    let config = SyncConfig::new(username)
        .with_period(cli.period())
        .with_policy(ReconcilePolicy {
            add_mode: cli.add_mode,
            max_play_count: cli.max_playcount,
        })
        .with_dry_run(cli.dry_run)
        .with_refresh(cli.refresh);
    config.validate()?;

    let cache = match cli.cache_dir {
        Some(dir) => AggregateCache::new(dir),
        None => AggregateCache::default_location()?,
    };

    let http_client = http_client::native::NativeClient::new();
    let source = LastFmApiClientImpl::new(Box::new(http_client), api_key);
    let aggregator = PlaycountAggregator::new(source, cache)
        .with_config(&config)
        .with_cancellation(cancel.clone());

    let mut library: Box<dyn MediaLibrary> = match cli.library_file {
        Some(path) => Box::new(JsonFileLibrary::open(path)?),
        None => Box::new(MusicAppLibrary::new(cli.app_name)),
    };

    if config.dry_run {
        println!("🧪 Dry run, no play counts will be changed");
    }
    println!("🎧 Syncing play counts for {} ({})", config.username, config.period);

    run_sync(&config, &aggregator, library.as_mut(), &cancel).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("lastfm_playcount_sync", cli.log_level())
        .parse_default_env()
        .init();

    let Some(username) = flag_or_env(cli.username.as_deref(), "LASTFM_USERNAME") else {
        let _ = Cli::command().print_help();
        std::process::exit(1);
    };

    let cancel = CancellationState::new();
    if let Err(e) = cancel.cancel_on_ctrl_c() {
        log::warn!("Ctrl-C handling unavailable: {e}");
    }

    match run(cli, username, cancel).await {
        Ok(report) => print_report(&report),
        Err(e) if e.is_interrupt() => {
            eprintln!("⏹️  Interrupted");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    }
}
