//! Local media library collaborators.
//!
//! The reconciliation code only needs to enumerate tracks and set a play
//! count; everything platform-specific lives behind [`MediaLibrary`].

pub mod json_file;
pub mod music_app;

pub use json_file::JsonFileLibrary;
pub use music_app::MusicAppLibrary;

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A track as seen in the local library.
///
/// `id` is an opaque handle understood only by the library that produced
/// it. Tracks are snapshots: updating the library does not change an
/// existing `LibraryTrack`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryTrack {
    /// Backend handle used to address the track when writing
    pub id: String,
    /// Artist name as shown in the library
    pub artist: String,
    /// Track title as shown in the library
    pub name: String,
    /// Play count currently stored in the library
    pub play_count: u64,
}

impl LibraryTrack {
    pub fn new(
        id: impl Into<String>,
        artist: impl Into<String>,
        name: impl Into<String>,
        play_count: u64,
    ) -> Self {
        Self {
            id: id.into(),
            artist: artist.into(),
            name: name.into(),
            play_count,
        }
    }
}

impl fmt::Display for LibraryTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)
    }
}

/// Read/write access to a local media library.
///
/// Implementations are driven from a single thread, one call at a time.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait MediaLibrary {
    /// Enumerate every track.
    ///
    /// The outer error means the library could not be read at all. An inner
    /// error describes a single track that could not be read; callers skip
    /// it and carry on.
    fn list_tracks(&self) -> Result<Vec<Result<LibraryTrack>>>;

    /// Set the play count of `track` to `play_count`.
    fn set_play_count(&mut self, track: &LibraryTrack, play_count: u64) -> Result<()>;
}
