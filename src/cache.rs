use crate::aggregate::PlaycountAggregate;
use crate::{Period, Result, SyncError};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory name under the user's cache directory.
const APP_DIR: &str = "lastfm-playcount-sync";

/// On-disk cache of playcount aggregates.
///
/// One JSON file per user and period, stored as
/// `{root}/users/{username}/playcounts.{period}.json`. The default root is
/// the XDG cache directory, e.g. `~/.cache/lastfm-playcount-sync`.
///
/// The cache does no locking; two runs against the same entry race and the
/// last writer wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCache {
    root: PathBuf,
}

impl AggregateCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted in the platform cache directory.
    pub fn default_location() -> Result<Self> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            SyncError::Config("Cannot determine the user cache directory".to_string())
        })?;
        Ok(Self::new(cache_dir.join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the cache file path for a username and period.
    pub fn path_for(&self, username: &str, period: Period) -> PathBuf {
        self.root
            .join("users")
            .join(urlencoding::encode(username).into_owned())
            .join(format!("playcounts.{}.json", period.cache_key()))
    }

    /// Check if an entry exists for the username and period.
    pub fn exists(&self, username: &str, period: Period) -> bool {
        self.path_for(username, period).exists()
    }

    /// Load a cached aggregate.
    ///
    /// Returns `Ok(None)` when nothing is cached, and [`SyncError::Cache`]
    /// when an entry exists but cannot be read or decoded.
    pub fn load(&self, username: &str, period: Period) -> Result<Option<PlaycountAggregate>> {
        let path = self.path_for(username, period);

        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(|e| {
            SyncError::Cache(format!("Failed to read {}: {e}", path.display()))
        })?;

        let aggregate = serde_json::from_str(&json).map_err(|e| {
            SyncError::Cache(format!("Failed to parse {}: {e}", path.display()))
        })?;

        log::debug!("Playcount cache loaded from: {}", path.display());
        Ok(Some(aggregate))
    }

    /// Store an aggregate, replacing any previous entry.
    ///
    /// The file is written next to its final location and renamed into
    /// place so a crash never leaves a truncated entry behind.
    pub fn store(
        &self,
        username: &str,
        period: Period,
        aggregate: &PlaycountAggregate,
    ) -> Result<()> {
        let path = self.path_for(username, period);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Cache(format!("Failed to create cache directory: {e}"))
            })?;
        }

        let json = serde_json::to_string(aggregate)
            .map_err(|e| SyncError::Cache(format!("Failed to serialize playcounts: {e}")))?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)
            .map_err(|e| SyncError::Cache(format!("Failed to write cache file: {e}")))?;
        fs::rename(&staging, &path)
            .map_err(|e| SyncError::Cache(format!("Failed to replace cache file: {e}")))?;

        log::debug!("Playcount cache saved to: {}", path.display());
        Ok(())
    }

    /// Remove a cached entry, if present.
    pub fn remove(&self, username: &str, period: Period) -> Result<()> {
        let path = self.path_for(username, period);

        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                SyncError::Cache(format!("Failed to remove cache file: {e}"))
            })?;
            log::debug!("Playcount cache removed from: {}", path.display());
        }

        Ok(())
    }
}
