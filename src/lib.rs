//! Bring local play counts in line with Last.fm.
//!
//! A run aggregates a user's Last.fm listening history into per-track play
//! counts ([`PlaycountAggregator`]), compares them against a local media
//! library ([`ReconciliationEngine`]) and writes back counts that Last.fm
//! shows to be higher ([`apply_decisions`]).

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod cancel;
pub mod commands;
pub mod headers;
pub mod library;
pub mod normalize;
pub mod parsing;
pub mod reconcile;
pub mod retry;
pub mod types;

pub use aggregate::{PlaycountAggregate, PlaycountAggregator, TrackCounts};
pub use api::{ChartSource, LastFmApiClientImpl};
pub use cache::AggregateCache;
pub use cancel::CancellationState;
pub use commands::{run_sync, SyncReport};
pub use library::{JsonFileLibrary, LibraryTrack, MediaLibrary, MusicAppLibrary};
pub use normalize::{normalize, NormalizedKey};
pub use reconcile::{
    apply_decisions, ApplySummary, DecisionCounts, Reconciliation, ReconciliationEngine,
    UpdateDecision,
};
pub use types::{
    ChartEntry, ChartFragment, ChartWindow, Period, ReconcilePolicy, RetryConfig, SyncConfig,
    SyncError,
};

#[cfg(feature = "mock")]
pub use api::MockChartSource;
#[cfg(feature = "mock")]
pub use library::MockMediaLibrary;

pub type Result<T> = std::result::Result<T, SyncError>;
