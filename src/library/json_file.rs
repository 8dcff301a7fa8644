use super::{LibraryTrack, MediaLibrary};
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One track in a JSON library file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonTrack {
    pub artist: String,
    pub name: String,
    #[serde(default)]
    pub play_count: u64,
}

/// A media library stored as a JSON array of tracks.
///
/// ```json
/// [
///   {"artist": "The Beatles", "name": "Hey Jude", "play_count": 100}
/// ]
/// ```
///
/// Track handles are positions in the array. Rows are kept as written, so
/// a malformed row is reported per track and survives a rewrite untouched.
/// The file is rewritten after every successful update.
#[derive(Debug)]
pub struct JsonFileLibrary {
    path: PathBuf,
    rows: Vec<Value>,
}

impl JsonFileLibrary {
    /// Load a library file.
    ///
    /// Fails only when the file cannot be read or is not a JSON array.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let json = fs::read_to_string(&path).map_err(|e| {
            SyncError::Library(format!("Failed to read {}: {e}", path.display()))
        })?;
        let rows = serde_json::from_str(&json).map_err(|e| {
            SyncError::Library(format!("Failed to parse {}: {e}", path.display()))
        })?;

        log::debug!("Loaded library file: {}", path.display());
        Ok(Self { path, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows, readable or not.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decode the row at `index`.
    pub fn track(&self, index: usize) -> Result<JsonTrack> {
        let row = self
            .rows
            .get(index)
            .ok_or_else(|| SyncError::Library(format!("No track at position {index}")))?;
        JsonTrack::deserialize(row).map_err(|e| {
            SyncError::Library(format!("Unreadable track at position {index}: {e}"))
        })
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.rows)
            .map_err(|e| SyncError::Library(format!("Failed to serialize library: {e}")))?;
        fs::write(&self.path, json).map_err(|e| {
            SyncError::Library(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

impl MediaLibrary for JsonFileLibrary {
    fn list_tracks(&self) -> Result<Vec<Result<LibraryTrack>>> {
        Ok((0..self.rows.len())
            .map(|index| {
                let track = self.track(index)?;
                Ok(LibraryTrack::new(
                    index.to_string(),
                    track.artist,
                    track.name,
                    track.play_count,
                ))
            })
            .collect())
    }

    fn set_play_count(&mut self, track: &LibraryTrack, play_count: u64) -> Result<()> {
        let index: usize = track
            .id
            .parse()
            .map_err(|_| SyncError::Library(format!("Invalid track handle '{}'", track.id)))?;
        let row = self
            .rows
            .get_mut(index)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| SyncError::Library(format!("No track at position {index}")))?;

        let previous = row.insert("play_count".to_string(), Value::from(play_count));
        if let Err(e) = self.save() {
            // Keep memory consistent with what is on disk.
            if let Some(row) = self.rows[index].as_object_mut() {
                match previous {
                    Some(previous) => row.insert("play_count".to_string(), previous),
                    None => row.remove("play_count"),
                };
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_library(dir: &Path) -> PathBuf {
        let path = dir.join("library.json");
        fs::write(
            &path,
            r#"[
                {"artist": "The Beatles", "name": "Hey Jude", "play_count": 100},
                {"artist": "Björk", "name": "Jóga"}
            ]"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_list_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let library = JsonFileLibrary::open(write_library(dir.path())).unwrap();

        let tracks: Vec<LibraryTrack> = library
            .list_tracks()
            .unwrap()
            .into_iter()
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(
            tracks,
            vec![
                LibraryTrack::new("0", "The Beatles", "Hey Jude", 100),
                LibraryTrack::new("1", "Björk", "Jóga", 0),
            ]
        );
    }

    #[test]
    fn test_bad_rows_are_per_track_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        fs::write(
            &path,
            r#"[
                {"artist": "The Beatles", "name": "Hey Jude", "play_count": 100},
                {"name": "No Artist", "play_count": 3},
                {"artist": "Kino", "name": "Kukushka", "play_count": -1},
                {"artist": "Björk", "name": "Jóga", "play_count": 4, "rating": 5}
            ]"#,
        )
        .unwrap();
        let mut library = JsonFileLibrary::open(&path).unwrap();

        let tracks = library.list_tracks().unwrap();
        assert_eq!(tracks.len(), 4);
        assert!(tracks[0].is_ok());
        assert!(matches!(tracks[1], Err(SyncError::Library(_))));
        assert!(matches!(tracks[2], Err(SyncError::Library(_))));
        assert_eq!(tracks[3].as_ref().unwrap().play_count, 4);

        // Rewriting keeps bad rows and unknown fields as they were.
        let bjork = tracks[3].as_ref().unwrap().clone();
        library.set_play_count(&bjork, 9).unwrap();

        let written: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written[1],
            serde_json::json!({"name": "No Artist", "play_count": 3})
        );
        assert_eq!(written[2]["play_count"], serde_json::json!(-1));
        assert_eq!(written[3]["play_count"], serde_json::json!(9));
        assert_eq!(written[3]["rating"], serde_json::json!(5));
    }

    #[test]
    fn test_set_play_count_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_library(dir.path());
        let mut library = JsonFileLibrary::open(&path).unwrap();

        let track = LibraryTrack::new("1", "Björk", "Jóga", 0);
        library.set_play_count(&track, 42).unwrap();

        let reopened = JsonFileLibrary::open(&path).unwrap();
        assert_eq!(reopened.track(1).unwrap().play_count, 42);
        assert_eq!(reopened.track(0).unwrap().play_count, 100);
    }

    #[test]
    fn test_set_play_count_rejects_unknown_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = JsonFileLibrary::open(write_library(dir.path())).unwrap();

        let missing = LibraryTrack::new("7", "Nobody", "Nothing", 0);
        assert!(matches!(
            library.set_play_count(&missing, 1),
            Err(SyncError::Library(_))
        ));

        let garbage = LibraryTrack::new("abc", "Nobody", "Nothing", 0);
        assert!(matches!(
            library.set_play_count(&garbage, 1),
            Err(SyncError::Library(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = JsonFileLibrary::open(dir.path().join("missing.json"));
        assert!(matches!(result, Err(SyncError::Library(_))));
    }
}
