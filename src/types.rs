//! Data types shared across the crate.
//!
//! This module contains the chart data reported by Last.fm, the period and
//! policy types that drive a sync run, the error type, and the run
//! configuration.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Seconds in one day, used when turning day counts into chart windows.
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// ================================================================================================
// CHART DATA
// ================================================================================================

/// A time range for which Last.fm reports track-level play counts.
///
/// Boundaries are Unix timestamps in seconds. Last.fm publishes a list of
/// closed weekly windows per user; the window covering the current week is
/// synthesized locally since the service has not closed it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartWindow {
    /// Start of the window (inclusive)
    pub from: u64,
    /// End of the window
    pub to: u64,
}

impl ChartWindow {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Human-readable label used in progress logs, e.g. `week of 2024-03-01`.
    pub fn label(&self) -> String {
        match DateTime::from_timestamp(self.from as i64, 0) {
            Some(start) => format!("week of {}", start.format("%Y-%m-%d")),
            None => format!("window starting at {}", self.from),
        }
    }

    /// Whether the window covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }
}

impl fmt::Display for ChartWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// One line of a weekly track chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartEntry {
    /// Artist name as displayed by Last.fm
    pub artist: String,
    /// Track name as displayed by Last.fm
    pub name: String,
    /// Number of scrobbles inside the window
    pub playcount: u64,
}

impl ChartEntry {
    pub fn new(artist: impl Into<String>, name: impl Into<String>, playcount: u64) -> Self {
        Self {
            artist: artist.into(),
            name: name.into(),
            playcount,
        }
    }
}

/// The track chart reported for a single window.
///
/// Fragments are consumed into a [`PlaycountAggregate`](crate::PlaycountAggregate)
/// as soon as they are fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartFragment {
    pub window: ChartWindow,
    pub entries: Vec<ChartEntry>,
}

// ================================================================================================
// PERIOD AND POLICY
// ================================================================================================

/// How much listening history to reconcile against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    /// The user's full history, plus the current in-progress week
    #[default]
    Overall,
    /// The trailing number of days, ending now
    Days(u32),
}

impl Period {
    /// Period covering the trailing `weeks` weeks.
    pub fn weeks(weeks: u32) -> Self {
        Period::Days(weeks.saturating_mul(7))
    }

    /// Stable string used to name the cache entry for this period.
    pub fn cache_key(&self) -> String {
        match self {
            Period::Overall => "overall".to_string(),
            Period::Days(days) => format!("days-{days}"),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Overall => write!(f, "overall"),
            Period::Days(1) => write!(f, "last day"),
            Period::Days(days) => write!(f, "last {days} days"),
        }
    }
}

/// Decision policy applied when reconciling a single library track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePolicy {
    /// Add the remote count to the local count instead of replacing it
    pub add_mode: bool,
    /// Never write a play count larger than this
    pub max_play_count: Option<u64>,
}

// ================================================================================================
// ERROR TYPES
// ================================================================================================

/// Error types for a sync run.
///
/// Most variants are recovered close to where they happen: a failed chart
/// window is skipped, a corrupt cache entry triggers a fresh fetch, a broken
/// library track is logged and passed over. [`SyncError::Config`] and
/// [`SyncError::Interrupted`] always stop the run.
///
/// ```rust
/// use lastfm_playcount_sync::SyncError;
///
/// let err = SyncError::Api { code: 6, message: "User not found".to_string() };
/// assert_eq!(err.to_string(), "Last.fm API error 6: User not found");
/// assert!(!err.is_interrupt());
/// ```
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or invalid required input, such as an empty username.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network related errors.
    ///
    /// This includes connection failures, timeouts, DNS errors and
    /// unexpected HTTP status codes.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error reported by the Last.fm API in the response body.
    ///
    /// # Common Codes
    /// - 6: user not found
    /// - 10: invalid API key
    /// - 17: the user's listening data is private
    #[error("Last.fm API error {code}: {message}")]
    Api {
        /// Last.fm error code
        code: u32,
        /// Message supplied by Last.fm
        message: String,
    },

    /// Rate limiting from Last.fm.
    ///
    /// The `retry_after` field indicates how many seconds to wait before
    /// the next request attempt.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// Failed to parse Last.fm's response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The playcount cache could not be read, decoded or written.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The media library failed to list or update a track.
    #[error("Library error: {0}")]
    Library(String),

    /// The run was interrupted by the user.
    #[error("Interrupted")]
    Interrupted,

    /// File system I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Whether this error means the whole run must stop now.
    ///
    /// Only a user stop counts. An I/O call cut short by a signal (`EINTR`)
    /// is an ordinary error of that one item. Per-item recovery (skipping a
    /// window or a track) must never swallow an interrupt.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, SyncError::Interrupted)
    }
}

// ================================================================================================
// CONFIGURATION
// ================================================================================================

/// Default pause between consecutive chart window requests.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (set to 0 to disable retries)
    pub max_retries: u32,
    /// Base delay for exponential backoff (in seconds)
    pub base_delay: u64,
    /// Maximum delay cap (in seconds)
    pub max_delay: u64,
    /// Whether retries are enabled at all
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 5,
            max_delay: 300, // 5 minutes
            enabled: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with retries disabled
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            enabled: false,
            ..Default::default()
        }
    }

    /// Create a config with custom retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            enabled: max_retries > 0,
            ..Default::default()
        }
    }

    /// Create a config with custom delays
    pub fn with_delays(base_delay: u64, max_delay: u64) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Default::default()
        }
    }
}

/// Fully resolved settings for one sync run.
///
/// Built once by the caller (the binary resolves it from flags and the
/// environment) and handed to the aggregator and reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Last.fm username whose history is read
    pub username: String,
    /// Amount of history to reconcile against
    pub period: Period,
    /// Per-track decision policy
    pub policy: ReconcilePolicy,
    /// Compute and report decisions without writing to the library
    pub dry_run: bool,
    /// Ignore any cached aggregate and fetch fresh data
    pub refresh: bool,
    /// Pause between chart window requests
    pub request_delay: Duration,
    /// Retry behavior for rate-limited requests
    pub retry: RetryConfig,
}

impl SyncConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            period: Period::Overall,
            policy: ReconcilePolicy::default(),
            dry_run: false,
            refresh: false,
            request_delay: DEFAULT_REQUEST_DELAY,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fail fast when required input is missing.
    pub fn validate(&self) -> crate::Result<()> {
        if self.username.trim().is_empty() {
            return Err(SyncError::Config("a Last.fm username is required".to_string()));
        }
        if self.period == Period::Days(0) {
            return Err(SyncError::Config(
                "the period must cover at least one day".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user={} period={}", self.username, self.period)?;
        if self.policy.add_mode {
            write!(f, " add-mode")?;
        }
        if let Some(max) = self.policy.max_play_count {
            write!(f, " max-playcount={max}")?;
        }
        if self.dry_run {
            write!(f, " dry-run")?;
        }
        if self.refresh {
            write!(f, " refresh")?;
        }
        Ok(())
    }
}

// ================================================================================================
// TESTS
// ================================================================================================
