//! Cumulative play counts built from Last.fm chart windows.
//!
//! [`PlaycountAggregator::obtain`] is the entry point: it serves a cached
//! aggregate when one exists and otherwise walks every chart window for the
//! requested period, folding each window's track chart into a
//! [`PlaycountAggregate`].

use crate::api::ChartSource;
use crate::cache::AggregateCache;
use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::normalize::{normalize, NormalizedKey};
use crate::retry::retry_operation;
use crate::types::{RetryConfig, SECONDS_PER_DAY};
use crate::{ChartFragment, ChartWindow, Period, Result, SyncConfig, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Length of the fallback window used when a user has no chart history yet.
pub const CURRENT_WINDOW_FALLBACK: u64 = 7 * SECONDS_PER_DAY;

/// Play counts for a single artist, keyed by normalized track name.
pub type TrackCounts = BTreeMap<NormalizedKey, u64>;

/// `artist key → track key → cumulative playcount`.
///
/// Every insertion normalizes its keys, so display names can be passed
/// straight through. Counts only ever grow while the aggregate is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaycountAggregate {
    artists: BTreeMap<NormalizedKey, TrackCounts>,
}

impl PlaycountAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `playcount` plays of `track` by `artist`.
    pub fn record(&mut self, artist: &str, track: &str, playcount: u64) {
        let count = self
            .artists
            .entry(normalize(artist))
            .or_default()
            .entry(normalize(track))
            .or_insert(0);
        *count = count.saturating_add(playcount);
    }

    /// Fold every entry of a chart fragment into the aggregate.
    pub fn add_fragment(&mut self, fragment: &ChartFragment) {
        for entry in &fragment.entries {
            self.record(&entry.artist, &entry.name, entry.playcount);
        }
    }

    /// Sum another aggregate into this one.
    pub fn merge(&mut self, other: &PlaycountAggregate) {
        for (artist, tracks) in &other.artists {
            let target = self.artists.entry(artist.clone()).or_default();
            for (track, playcount) in tracks {
                let count = target.entry(track.clone()).or_insert(0);
                *count = count.saturating_add(*playcount);
            }
        }
    }

    /// Track counts for an artist display name.
    pub fn artist(&self, artist: &str) -> Option<&TrackCounts> {
        self.artists.get(&normalize(artist))
    }

    /// Cumulative playcount for an artist and track display name.
    pub fn playcount(&self, artist: &str, track: &str) -> Option<u64> {
        self.artist(artist)?.get(&normalize(track)).copied()
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    pub fn track_count(&self) -> usize {
        self.artists.values().map(BTreeMap::len).sum()
    }

    pub fn total_playcount(&self) -> u64 {
        self.artists
            .values()
            .flat_map(BTreeMap::values)
            .fold(0u64, |total, count| total.saturating_add(*count))
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedKey, &TrackCounts)> {
        self.artists.iter()
    }
}

impl From<BTreeMap<NormalizedKey, TrackCounts>> for PlaycountAggregate {
    /// Wrap a mapping whose keys are already normalized.
    fn from(artists: BTreeMap<NormalizedKey, TrackCounts>) -> Self {
        Self { artists }
    }
}

/// Current time as a Unix timestamp.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The still-open window from the end of the last closed chart up to `now`.
///
/// Returns `None` when the history already reaches `now`.
pub fn current_window(history: &[ChartWindow], now: u64) -> Option<ChartWindow> {
    let from = history
        .iter()
        .map(|window| window.to)
        .max()
        .unwrap_or_else(|| now.saturating_sub(CURRENT_WINDOW_FALLBACK));
    let window = ChartWindow::new(from, now);
    (!window.is_empty()).then_some(window)
}

/// Decide which chart windows to query for `period`.
///
/// `history` is the service's list of closed windows and is only consulted
/// for [`Period::Overall`].
pub fn plan_windows(period: Period, history: Vec<ChartWindow>, now: u64) -> Vec<ChartWindow> {
    match period {
        Period::Overall => {
            let current = current_window(&history, now);
            let mut windows = history;
            windows.extend(current);
            windows
        }
        Period::Days(days) => {
            let from = now.saturating_sub(u64::from(days).saturating_mul(SECONDS_PER_DAY));
            vec![ChartWindow::new(from, now)]
        }
    }
}

/// Builds or loads the [`PlaycountAggregate`] for a user and period.
pub struct PlaycountAggregator<S: ChartSource> {
    source: S,
    cache: AggregateCache,
    request_delay: Duration,
    retry: RetryConfig,
    refresh: bool,
    cancel: CancellationState,
}

impl<S: ChartSource> PlaycountAggregator<S> {
    pub fn new(source: S, cache: AggregateCache) -> Self {
        Self {
            source,
            cache,
            request_delay: crate::types::DEFAULT_REQUEST_DELAY,
            retry: RetryConfig::default(),
            refresh: false,
            cancel: CancellationState::new(),
        }
    }

    /// Take request pacing, retry and refresh settings from a run config.
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.request_delay = config.request_delay;
        self.retry = config.retry.clone();
        self.refresh = config.refresh;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationState) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &AggregateCache {
        &self.cache
    }

    /// Return the aggregate for `username` over `period`.
    ///
    /// A cached aggregate is returned without touching the network unless
    /// refresh was requested. Otherwise every planned window is fetched in
    /// order with a pause between requests; a window that fails is logged
    /// and left out. The finished aggregate is written back to the cache.
    pub async fn obtain(&self, username: &str, period: Period) -> Result<PlaycountAggregate> {
        if username.trim().is_empty() {
            return Err(SyncError::Config(
                "a Last.fm username is required".to_string(),
            ));
        }

        if self.refresh {
            log::info!("Ignoring cached playcount data, grabbing fresh data from Last.fm");
        } else {
            match self.cache.load(username, period) {
                Ok(Some(aggregate)) => {
                    log::info!("Reading cached playcount data from disk");
                    return Ok(aggregate);
                }
                Ok(None) => {
                    log::info!("No cached playcount data, grabbing fresh data from Last.fm");
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable playcount cache: {e}");
                }
            }
        }

        let history = match period {
            Period::Overall => {
                retry_operation(&self.retry, &self.cancel, "chart list", || {
                    self.source.weekly_chart_list(username)
                })
                .await?
                .result
            }
            Period::Days(_) => Vec::new(),
        };
        let windows = plan_windows(period, history, unix_now());
        log::info!("Fetching {} chart windows ({period})", windows.len());

        let mut aggregate = PlaycountAggregate::new();
        let mut failed = 0usize;

        for (index, window) in windows.iter().enumerate() {
            if index > 0 {
                sleep_with_cancel(self.cancel.subscribe(), self.request_delay).await?;
            }
            self.cancel.check()?;

            log::info!("Getting listening data for {}", window.label());
            let fetched = retry_operation(&self.retry, &self.cancel, "track chart", || {
                self.source.weekly_track_chart(username, window)
            })
            .await;

            match fetched {
                Ok(fetched) => aggregate.add_fragment(&fetched.result),
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    failed += 1;
                    log::warn!("Error getting listening data for {}: {e}", window.label());
                }
            }
        }

        if !windows.is_empty() && failed == windows.len() {
            log::warn!("Every chart window failed; not caching an empty result");
            return Ok(aggregate);
        }
        if failed > 0 {
            log::warn!("{failed} of {} chart windows could not be fetched", windows.len());
        }

        log::info!("Saving playcount data");
        if let Err(e) = self.cache.store(username, period, &aggregate) {
            log::warn!("Failed to save playcount data: {e}");
        }

        Ok(aggregate)
    }
}
