use super::{LibraryTrack, MediaLibrary};
use crate::{Result, SyncError};
use serde::Deserialize;
use std::process::{Command, ExitStatus, Stdio};

/// Signal number of SIGINT on every Unix.
#[cfg(unix)]
const SIGINT: i32 = 2;

/// Default scripting name of the macOS music application.
pub const DEFAULT_APP_NAME: &str = "Music";

/// The macOS Music (formerly iTunes) library, driven through `osascript`.
///
/// Tracks are addressed by their persistent ID. Every call spawns one
/// JavaScript for Automation script; reads fetch all tracks in bulk.
#[derive(Debug, Clone)]
pub struct MusicAppLibrary {
    app_name: String,
}

/// Track record as emitted by the listing script.
#[derive(Debug, Deserialize)]
struct ScriptTrack {
    id: Option<String>,
    artist: Option<String>,
    name: Option<String>,
    play_count: Option<u64>,
}

impl Default for MusicAppLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_APP_NAME)
    }
}

impl MusicAppLibrary {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Script that prints every track as a JSON array.
    pub fn list_script(&self) -> String {
        format!(
            r#"const app = Application({app});
const tracks = app.tracks;
const ids = tracks.persistentID();
const artists = tracks.artist();
const names = tracks.name();
const counts = tracks.playedCount();
JSON.stringify(ids.map((id, i) => ({{
  id: id,
  artist: artists[i],
  name: names[i],
  play_count: counts[i]
}})));"#,
            app = js_string(&self.app_name)
        )
    }

    /// Script that sets the play count of the track with persistent ID `id`.
    pub fn set_script(&self, id: &str, play_count: u64) -> String {
        format!(
            r#"const app = Application({app});
const matches = app.tracks.whose({{persistentID: {id}}})();
if (matches.length === 0) {{
  throw new Error("No track with persistent ID " + {id});
}}
matches[0].playedCount = {play_count};
"ok";"#,
            app = js_string(&self.app_name),
            id = js_string(id),
        )
    }

    fn run_script(&self, script: &str) -> Result<String> {
        let output = Command::new("osascript")
            .args(["-l", "JavaScript", "-e", script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| SyncError::Library(format!("Failed to run osascript: {e}")))?;

        if !output.status.success() {
            return Err(script_failure(output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl MediaLibrary for MusicAppLibrary {
    fn list_tracks(&self) -> Result<Vec<Result<LibraryTrack>>> {
        log::debug!("Reading tracks from {}", self.app_name);
        let output = self.run_script(&self.list_script())?;
        parse_track_listing(&output)
    }

    fn set_play_count(&mut self, track: &LibraryTrack, play_count: u64) -> Result<()> {
        self.run_script(&self.set_script(&track.id, play_count))?;
        Ok(())
    }
}

/// Map a failed `osascript` run to an error.
///
/// Ctrl-C reaches the child as well as this process, so a script killed by
/// SIGINT is an interruption of the run, not a failure of one track.
fn script_failure(status: ExitStatus, stderr: &[u8]) -> SyncError {
    if killed_by_interrupt(&status) {
        return SyncError::Interrupted;
    }
    let stderr = String::from_utf8_lossy(stderr);
    SyncError::Library(format!("osascript failed ({status}): {}", stderr.trim()))
}

#[cfg(unix)]
fn killed_by_interrupt(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(SIGINT)
}

#[cfg(not(unix))]
fn killed_by_interrupt(_status: &ExitStatus) -> bool {
    false
}

/// Quote a value as a JavaScript string literal.
fn js_string(value: &str) -> String {
    // A JSON string is a valid JavaScript string literal.
    serde_json::Value::String(value.to_string()).to_string()
}

/// Parse the listing script output.
///
/// The whole output must be a JSON array. Each element is decoded on its
/// own; one that is missing a field or carries a bad play count becomes a
/// per-track error.
pub(crate) fn parse_track_listing(output: &str) -> Result<Vec<Result<LibraryTrack>>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(output.trim())
        .map_err(|e| SyncError::Library(format!("Unexpected track listing: {e}")))?;

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, value)| match serde_json::from_value::<ScriptTrack>(value) {
            Ok(ScriptTrack {
                id: Some(id),
                artist: Some(artist),
                name: Some(name),
                play_count,
            }) => Ok(LibraryTrack::new(id, artist, name, play_count.unwrap_or(0))),
            Ok(ScriptTrack { id, .. }) => Err(SyncError::Library(format!(
                "Incomplete track at position {index} (id {})",
                id.as_deref().unwrap_or("unknown")
            ))),
            Err(e) => Err(SyncError::Library(format!(
                "Unreadable track at position {index}: {e}"
            ))),
        })
        .collect())
}
