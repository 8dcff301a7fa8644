//! Decide, track by track, what play count the local library should hold.

use crate::aggregate::PlaycountAggregate;
use crate::cancel::CancellationState;
use crate::library::{LibraryTrack, MediaLibrary};
use crate::normalize::normalize;
use crate::{ReconcilePolicy, Result};
use std::fmt;

/// Outcome of reconciling one library track against the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// The track's artist never appears in the aggregate.
    NoMatch,
    /// The artist is known but this track has no plays.
    NoCountForTrack,
    /// Replacing the local count would lower it.
    WouldDecrease { remote: u64 },
    /// The new count is above the configured ceiling.
    ExceedsMax { candidate: u64, max: u64 },
    /// Set the local count to this value.
    Apply(u64),
}

impl UpdateDecision {
    /// The count to write, if any.
    pub fn new_play_count(&self) -> Option<u64> {
        match self {
            UpdateDecision::Apply(count) => Some(*count),
            _ => None,
        }
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, UpdateDecision::Apply(_))
    }

    /// Level at which reconciliation reports this decision.
    ///
    /// A track that has plays but is left alone shows at the default `info`
    /// level; its reason is logged separately at `debug`.
    pub fn log_level(&self) -> log::Level {
        match self {
            UpdateDecision::NoMatch | UpdateDecision::NoCountForTrack => log::Level::Trace,
            UpdateDecision::WouldDecrease { .. } | UpdateDecision::ExceedsMax { .. } => {
                log::Level::Info
            }
            UpdateDecision::Apply(_) => log::Level::Debug,
        }
    }
}

impl fmt::Display for UpdateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateDecision::NoMatch => write!(f, "no matching artist"),
            UpdateDecision::NoCountForTrack => write!(f, "no plays for track"),
            UpdateDecision::WouldDecrease { remote } => {
                write!(f, "Last.fm count {remote} is not higher")
            }
            UpdateDecision::ExceedsMax { candidate, max } => {
                write!(f, "new count {candidate} exceeds maximum {max}")
            }
            UpdateDecision::Apply(count) => write!(f, "set to {count}"),
        }
    }
}

/// A library track paired with the decision made for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub track: LibraryTrack,
    pub decision: UpdateDecision,
}

/// How many tracks ended up with each decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub no_match: usize,
    pub no_count_for_track: usize,
    pub would_decrease: usize,
    pub exceeds_max: usize,
    pub apply: usize,
}

impl DecisionCounts {
    pub fn record(&mut self, decision: &UpdateDecision) {
        match decision {
            UpdateDecision::NoMatch => self.no_match += 1,
            UpdateDecision::NoCountForTrack => self.no_count_for_track += 1,
            UpdateDecision::WouldDecrease { .. } => self.would_decrease += 1,
            UpdateDecision::ExceedsMax { .. } => self.exceeds_max += 1,
            UpdateDecision::Apply(_) => self.apply += 1,
        }
    }

    pub fn from_reconciliations(reconciliations: &[Reconciliation]) -> Self {
        let mut counts = Self::default();
        for reconciliation in reconciliations {
            counts.record(&reconciliation.decision);
        }
        counts
    }

    /// Tracks that were read and matched against the aggregate.
    pub fn total(&self) -> usize {
        self.no_match
            + self.no_count_for_track
            + self.would_decrease
            + self.exceeds_max
            + self.apply
    }
}

/// Pure decision logic over an aggregate and a sequence of library tracks.
///
/// The engine never writes; see [`apply_decisions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine {
    policy: ReconcilePolicy,
}

impl ReconciliationEngine {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Decide what to do with a single track.
    ///
    /// Outside add mode the result never lowers the local count.
    pub fn decide(&self, aggregate: &PlaycountAggregate, track: &LibraryTrack) -> UpdateDecision {
        let Some(tracks) = aggregate.artist(&track.artist) else {
            return UpdateDecision::NoMatch;
        };
        let Some(&remote) = tracks.get(&normalize(&track.name)) else {
            return UpdateDecision::NoCountForTrack;
        };

        let candidate = if self.policy.add_mode {
            remote.saturating_add(track.play_count)
        } else if remote > track.play_count {
            remote
        } else {
            return UpdateDecision::WouldDecrease { remote };
        };

        match self.policy.max_play_count {
            Some(max) if candidate > max => UpdateDecision::ExceedsMax { candidate, max },
            _ => UpdateDecision::Apply(candidate),
        }
    }

    /// Decide every track, keeping the input order.
    ///
    /// Tracks the library failed to read are logged and left out. An
    /// interruption stops reconciliation and is returned.
    pub fn reconcile<I>(
        &self,
        aggregate: &PlaycountAggregate,
        tracks: I,
    ) -> Result<Vec<Reconciliation>>
    where
        I: IntoIterator<Item = Result<LibraryTrack>>,
    {
        let mut reconciliations = Vec::new();

        for track in tracks {
            let track = match track {
                Ok(track) => track,
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    log::warn!("Skipping unreadable track: {e}");
                    continue;
                }
            };

            let decision = self.decide(aggregate, &track);
            let level = decision.log_level();
            match decision {
                UpdateDecision::NoMatch | UpdateDecision::NoCountForTrack => {
                    log::log!(level, "{track}: {decision}");
                }
                UpdateDecision::WouldDecrease { .. } | UpdateDecision::ExceedsMax { .. } => {
                    log::log!(level, "Skipping {track}");
                    log::debug!("{track} ({}): {decision}", track.play_count);
                }
                UpdateDecision::Apply(count) => {
                    log::log!(level, "{track}: {} -> {count}", track.play_count);
                }
            }

            reconciliations.push(Reconciliation { track, decision });
        }

        Ok(reconciliations)
    }
}

/// Result of writing decisions back to the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Tracks with an [`UpdateDecision::Apply`]
    pub planned: usize,
    /// Writes that succeeded
    pub applied: usize,
    /// Writes the library rejected
    pub failed: usize,
    pub dry_run: bool,
}

/// Write every [`UpdateDecision::Apply`] to `library`.
///
/// Under `dry_run` nothing is written and each change is only reported.
/// Cancellation is checked before every write, so a track is either fully
/// updated or untouched. A failed write is logged and counted.
pub fn apply_decisions(
    library: &mut dyn MediaLibrary,
    reconciliations: &[Reconciliation],
    dry_run: bool,
    cancel: &CancellationState,
) -> Result<ApplySummary> {
    let mut summary = ApplySummary {
        dry_run,
        ..ApplySummary::default()
    };

    for Reconciliation { track, decision } in reconciliations {
        let Some(new_count) = decision.new_play_count() else {
            continue;
        };
        summary.planned += 1;

        if dry_run {
            log::info!(
                "Would set {track} playcount from {} -> {new_count}",
                track.play_count
            );
            continue;
        }

        cancel.check()?;
        log::info!(
            "Setting {track} playcount from {} -> {new_count}",
            track.play_count
        );
        match library.set_play_count(track, new_count) {
            Ok(()) => summary.applied += 1,
            Err(e) if e.is_interrupt() => return Err(e),
            Err(e) => {
                summary.failed += 1;
                log::warn!("Failed to update {track}: {e}");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MockMediaLibrary;
    use crate::SyncError;
    use mockall::predicate::eq;

    fn aggregate_with(artist: &str, track: &str, count: u64) -> PlaycountAggregate {
        let mut aggregate = PlaycountAggregate::new();
        aggregate.record(artist, track, count);
        aggregate
    }

    fn track(play_count: u64) -> LibraryTrack {
        LibraryTrack::new("1", "The Beatles", "Hey Jude", play_count)
    }

    fn policy(add_mode: bool, max_play_count: Option<u64>) -> ReconcilePolicy {
        ReconcilePolicy {
            add_mode,
            max_play_count,
        }
    }

    #[test]
    fn test_never_decreases_outside_add_mode() {
        let engine = ReconciliationEngine::default();

        let lower = aggregate_with("Beatles", "Hey Jude", 30);
        assert_eq!(
            engine.decide(&lower, &track(50)),
            UpdateDecision::WouldDecrease { remote: 30 }
        );

        let equal = aggregate_with("Beatles", "Hey Jude", 50);
        assert_eq!(
            engine.decide(&equal, &track(50)),
            UpdateDecision::WouldDecrease { remote: 50 }
        );

        let higher = aggregate_with("Beatles", "Hey Jude", 80);
        assert_eq!(engine.decide(&higher, &track(50)), UpdateDecision::Apply(80));
    }

    #[test]
    fn test_add_mode_sums_counts() {
        let engine = ReconciliationEngine::new(policy(true, None));
        let aggregate = aggregate_with("Beatles", "Hey Jude", 30);
        assert_eq!(engine.decide(&aggregate, &track(50)), UpdateDecision::Apply(80));
    }

    #[test]
    fn test_max_play_count_is_inclusive() {
        let engine = ReconciliationEngine::new(policy(false, Some(100)));

        let at_max = aggregate_with("Beatles", "Hey Jude", 100);
        assert_eq!(engine.decide(&at_max, &track(0)), UpdateDecision::Apply(100));

        let over_max = aggregate_with("Beatles", "Hey Jude", 101);
        assert_eq!(
            engine.decide(&over_max, &track(0)),
            UpdateDecision::ExceedsMax {
                candidate: 101,
                max: 100
            }
        );
    }

    #[test]
    fn test_max_applies_to_add_mode_sum() {
        let engine = ReconciliationEngine::new(policy(true, Some(100)));
        let aggregate = aggregate_with("Beatles", "Hey Jude", 60);
        assert_eq!(
            engine.decide(&aggregate, &track(50)),
            UpdateDecision::ExceedsMax {
                candidate: 110,
                max: 100
            }
        );
    }

    #[test]
    fn test_unmatched_artist_and_track() {
        let engine = ReconciliationEngine::default();
        let aggregate = aggregate_with("Beatles", "Hey Jude", 120);

        let stranger = LibraryTrack::new("2", "Radiohead", "Creep", 5);
        assert_eq!(engine.decide(&aggregate, &stranger), UpdateDecision::NoMatch);

        let unplayed = LibraryTrack::new("3", "The Beatles", "Help!", 5);
        assert_eq!(
            engine.decide(&aggregate, &unplayed),
            UpdateDecision::NoCountForTrack
        );
    }

    #[test]
    fn test_reconcile_end_to_end() {
        let engine = ReconciliationEngine::default();
        let aggregate = aggregate_with("beatles", "hey jude", 120);

        let decisions = engine
            .reconcile(&aggregate, vec![Ok(track(100))])
            .unwrap();

        assert_eq!(
            decisions,
            vec![Reconciliation {
                track: track(100),
                decision: UpdateDecision::Apply(120),
            }]
        );
    }

    #[test]
    fn test_reconcile_keeps_order_and_skips_unreadable_tracks() {
        let engine = ReconciliationEngine::default();
        let aggregate = aggregate_with("Björk", "Jóga", 12);

        let tracks = vec![
            Ok(LibraryTrack::new("a", "Radiohead", "Creep", 1)),
            Err(SyncError::Library("bad track".to_string())),
            Ok(LibraryTrack::new("b", "BJORK", "Joga", 3)),
        ];
        let decisions = engine.reconcile(&aggregate, tracks).unwrap();

        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].decision, UpdateDecision::NoMatch);
        assert_eq!(decisions[1].decision, UpdateDecision::Apply(12));

        let counts = DecisionCounts::from_reconciliations(&decisions);
        assert_eq!(counts.no_match, 1);
        assert_eq!(counts.apply, 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_skipped_tracks_show_at_default_verbosity() {
        let skips = [
            UpdateDecision::WouldDecrease { remote: 90 },
            UpdateDecision::ExceedsMax {
                candidate: 600,
                max: 500,
            },
        ];
        for skip in skips {
            assert_eq!(skip.log_level(), log::Level::Info, "{skip}");
            assert!(skip.log_level() <= log::LevelFilter::Info);
        }

        // Detail stays behind -v and -e.
        assert_eq!(UpdateDecision::Apply(7).log_level(), log::Level::Debug);
        assert_eq!(UpdateDecision::NoMatch.log_level(), log::Level::Trace);
        assert_eq!(UpdateDecision::NoCountForTrack.log_level(), log::Level::Trace);
    }

    #[test]
    fn test_reconcile_stops_on_interrupt() {
        let engine = ReconciliationEngine::default();
        let tracks = vec![Err(SyncError::Interrupted), Ok(track(1))];
        let result = engine.reconcile(&PlaycountAggregate::new(), tracks);
        assert!(matches!(result, Err(SyncError::Interrupted)));
    }

    fn decisions() -> Vec<Reconciliation> {
        vec![
            Reconciliation {
                track: LibraryTrack::new("1", "The Beatles", "Hey Jude", 100),
                decision: UpdateDecision::Apply(120),
            },
            Reconciliation {
                track: LibraryTrack::new("2", "Radiohead", "Creep", 3),
                decision: UpdateDecision::NoMatch,
            },
            Reconciliation {
                track: LibraryTrack::new("3", "Björk", "Jóga", 1),
                decision: UpdateDecision::Apply(7),
            },
        ]
    }

    #[test]
    fn test_apply_writes_only_apply_decisions() {
        let mut library = MockMediaLibrary::new();
        library
            .expect_set_play_count()
            .withf(|track, count| track.id == "1" && *count == 120)
            .times(1)
            .returning(|_, _| Ok(()));
        library
            .expect_set_play_count()
            .withf(|track, count| track.id == "3" && *count == 7)
            .times(1)
            .returning(|_, _| Ok(()));

        let summary =
            apply_decisions(&mut library, &decisions(), false, &CancellationState::new()).unwrap();
        assert_eq!(summary.planned, 2);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_dry_run_never_writes() {
        let mut library = MockMediaLibrary::new();
        library.expect_set_play_count().never();

        let summary =
            apply_decisions(&mut library, &decisions(), true, &CancellationState::new()).unwrap();
        assert_eq!(summary.planned, 2);
        assert_eq!(summary.applied, 0);
        assert!(summary.dry_run);
    }

    #[test]
    fn test_failed_write_does_not_stop_the_run() {
        let mut library = MockMediaLibrary::new();
        library
            .expect_set_play_count()
            .with(eq(track(100)), eq(120))
            .times(1)
            .returning(|_, _| Err(SyncError::Library("locked".to_string())));
        library
            .expect_set_play_count()
            .withf(|track, _| track.id == "3")
            .times(1)
            .returning(|_, _| Ok(()));

        let summary =
            apply_decisions(&mut library, &decisions(), false, &CancellationState::new()).unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let mut library = MockMediaLibrary::new();
        library.expect_set_play_count().never();

        let cancel = CancellationState::new();
        cancel.cancel();
        let result = apply_decisions(&mut library, &decisions(), false, &cancel);
        assert!(matches!(result, Err(SyncError::Interrupted)));
    }
}
