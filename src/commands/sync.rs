use crate::aggregate::PlaycountAggregator;
use crate::api::ChartSource;
use crate::cancel::CancellationState;
use crate::library::MediaLibrary;
use crate::reconcile::{apply_decisions, ApplySummary, DecisionCounts, ReconciliationEngine};
use crate::{Result, SyncConfig};

/// What a sync run found and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Distinct artists in the Last.fm aggregate
    pub remote_artists: usize,
    /// Distinct tracks in the Last.fm aggregate
    pub remote_tracks: usize,
    /// Total plays in the Last.fm aggregate
    pub remote_plays: u64,
    /// Tracks listed by the local library, readable or not
    pub library_tracks: usize,
    /// Library tracks that could not be read
    pub unreadable_tracks: usize,
    pub decisions: DecisionCounts,
    pub apply: ApplySummary,
}

/// Run one full sync: aggregate remote play counts, reconcile them against
/// the library and write the results back (or only report them under dry
/// run).
///
/// Fatal errors are configuration problems, a failed chart list, an
/// unreadable library and interruption. Everything per window or per track
/// is logged and counted in the report instead.
pub async fn run_sync<S: ChartSource>(
    config: &SyncConfig,
    aggregator: &PlaycountAggregator<S>,
    library: &mut dyn MediaLibrary,
    cancel: &CancellationState,
) -> Result<SyncReport> {
    config.validate()?;
    log::info!("Starting sync: {config}");

    let aggregate = aggregator.obtain(&config.username, config.period).await?;
    log::info!(
        "Last.fm reports {} plays of {} tracks by {} artists",
        aggregate.total_playcount(),
        aggregate.track_count(),
        aggregate.artist_count()
    );
    cancel.check()?;

    let tracks = library.list_tracks()?;
    cancel.check()?;
    let library_tracks = tracks.len();
    let unreadable_tracks = tracks.iter().filter(|track| track.is_err()).count();
    log::info!("Processing {library_tracks} library tracks");

    let engine = ReconciliationEngine::new(config.policy);
    let reconciliations = engine.reconcile(&aggregate, tracks)?;
    let decisions = DecisionCounts::from_reconciliations(&reconciliations);

    let apply = apply_decisions(library, &reconciliations, config.dry_run, cancel)?;

    Ok(SyncReport {
        remote_artists: aggregate.artist_count(),
        remote_tracks: aggregate.track_count(),
        remote_plays: aggregate.total_playcount(),
        library_tracks,
        unreadable_tracks,
        decisions,
        apply,
    })
}
